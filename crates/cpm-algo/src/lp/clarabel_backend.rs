//! Direct Clarabel backend.
//!
//! Clarabel solves the conic program
//!
//! ```text
//! minimize    (1/2)x'Px + q'x
//! subject to  Ax + s = b,  s ∈ K
//! ```
//!
//! An LP is the special case P = 0 with K a product of a zero cone
//! (equalities) and a non-negative cone (inequalities and finite variable
//! bounds). Fixed variables (`lower == upper`) go into the zero cone so the
//! interior-point method never sees an empty interior.

use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use tracing::debug;
use web_time::Instant;

use super::{LpBackend, LpError, LpModel, LpSolution, LpStatus, Relation, Sense, SolverSettings};

const BACKEND_NAME: &str = "clarabel";

/// Interior-point LP backend driving Clarabel's native API.
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    settings: SolverSettings,
}

impl ClarabelBackend {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }
}

/// Conic form of an [`LpModel`]: rows split into the zero-cone block
/// followed by the non-negative block.
struct ConicForm {
    /// Per-column (row, value) entries of A
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    n_eq: usize,
    n_ineq: usize,
}

impl ConicForm {
    fn build(model: &LpModel) -> Self {
        let n_var = model.num_variables();
        let mut eq_rows: Vec<(Vec<(usize, f64)>, f64)> = Vec::new();
        let mut ineq_rows: Vec<(Vec<(usize, f64)>, f64)> = Vec::new();

        for constraint in model.constraints() {
            let terms: Vec<(usize, f64)> = constraint
                .terms
                .iter()
                .map(|(var, coeff)| (var.index(), *coeff))
                .collect();
            match constraint.relation {
                Relation::Equal => eq_rows.push((terms, constraint.rhs)),
                Relation::LessEq => ineq_rows.push((terms, constraint.rhs)),
                Relation::GreaterEq => ineq_rows.push((
                    terms.into_iter().map(|(j, c)| (j, -c)).collect(),
                    -constraint.rhs,
                )),
            }
        }

        for (j, bounds) in model.variables().iter().enumerate() {
            if bounds.lower == bounds.upper {
                eq_rows.push((vec![(j, 1.0)], bounds.lower));
                continue;
            }
            if bounds.upper.is_finite() {
                ineq_rows.push((vec![(j, 1.0)], bounds.upper));
            }
            if bounds.lower.is_finite() {
                ineq_rows.push((vec![(j, -1.0)], -bounds.lower));
            }
        }

        let n_eq = eq_rows.len();
        let n_ineq = ineq_rows.len();
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
        let mut rhs = Vec::with_capacity(n_eq + n_ineq);

        for (row, (terms, b)) in eq_rows.into_iter().chain(ineq_rows).enumerate() {
            for (j, coeff) in terms {
                if coeff != 0.0 {
                    columns[j].push((row, coeff));
                }
            }
            rhs.push(b);
        }

        Self {
            columns,
            rhs,
            n_eq,
            n_ineq,
        }
    }

    fn a_matrix(&mut self) -> CscMatrix<f64> {
        let n_var = self.columns.len();
        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        let mut nnz = 0;

        for column in self.columns.iter_mut() {
            col_ptr.push(nnz);
            // CSC requires row indices sorted within each column
            column.sort_by_key(|(r, _)| *r);
            for &(r, v) in column.iter() {
                row_idx.push(r);
                values.push(v);
                nnz += 1;
            }
        }
        col_ptr.push(nnz);

        CscMatrix::new(self.rhs.len(), n_var, col_ptr, row_idx, values)
    }

    fn cones(&self) -> Vec<SupportedConeT<f64>> {
        let mut cones = Vec::with_capacity(2);
        if self.n_eq > 0 {
            cones.push(SupportedConeT::ZeroConeT(self.n_eq));
        }
        if self.n_ineq > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(self.n_ineq));
        }
        cones
    }
}

fn map_status(status: SolverStatus) -> LpStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => LpStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            LpStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => LpStatus::Unbounded,
        SolverStatus::MaxTime => LpStatus::TimeLimit,
        other => LpStatus::Other(format!("clarabel status {:?}", other)),
    }
}

impl LpBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn solve(&self, model: &LpModel) -> Result<LpSolution, LpError> {
        model.validate()?;
        let start = Instant::now();
        let n_var = model.num_variables();

        let mut form = ConicForm::build(model);
        let a_mat = form.a_matrix();
        let cones = form.cones();
        let p_mat = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], Vec::new(), Vec::new());

        let sign = match model.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        let mut q = vec![0.0; n_var];
        for (var, coeff) in model.objective() {
            q[var.index()] += sign * coeff;
        }

        debug!(
            variables = n_var,
            equalities = form.n_eq,
            inequalities = form.n_ineq,
            "solving LP with clarabel"
        );

        let mut builder = DefaultSettingsBuilder::default();
        builder.verbose(false).max_iter(self.settings.max_iterations);
        if let Some(limit) = self.settings.time_limit {
            builder.time_limit(limit.as_secs_f64());
        }
        let settings = builder.build().map_err(|e| LpError::Setup {
            backend: BACKEND_NAME,
            detail: format!("invalid settings: {:?}", e),
        })?;

        let mut solver = DefaultSolver::new(&p_mat, &q, &a_mat, &form.rhs, &cones, settings)
            .map_err(|e| LpError::Setup {
                backend: BACKEND_NAME,
                detail: format!("initialization failed: {:?}", e),
            })?;

        solver.solve();

        let sol = solver.solution;
        let status = map_status(sol.status);
        if !status.is_optimal() {
            return Ok(LpSolution::failed(status, start.elapsed()));
        }

        let values = sol.x.clone();
        let objective = model.evaluate_objective(&values);
        Ok(LpSolution {
            status,
            values,
            objective,
            iterations: sol.iterations,
            solve_time: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::Relation;

    #[test]
    fn test_small_maximisation() {
        // max 3x + 2y  s.t.  x + y <= 4,  0 <= x <= 3,  0 <= y
        let mut model = LpModel::new();
        let x = model.add_variable(0.0, 3.0);
        let y = model.add_variable(0.0, f64::INFINITY);
        model.add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::LessEq, 4.0);
        model.set_objective(vec![(x, 3.0), (y, 2.0)], Sense::Maximize);

        let solution = ClarabelBackend::default().solve(&model).unwrap();
        assert!(solution.status.is_optimal());
        assert!((solution.value(x) - 3.0).abs() < 1e-5);
        assert!((solution.value(y) - 1.0).abs() < 1e-5);
        assert!((solution.objective - 11.0).abs() < 1e-4);
    }

    #[test]
    fn test_infeasible_equality() {
        // x in [0, 1] but x = 5
        let mut model = LpModel::new();
        let x = model.add_variable(0.0, 1.0);
        model.add_constraint(vec![(x, 1.0)], Relation::Equal, 5.0);
        model.set_objective(vec![(x, 1.0)], Sense::Minimize);

        let solution = ClarabelBackend::default().solve(&model).unwrap();
        assert_eq!(solution.status, LpStatus::Infeasible);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_unbounded_objective() {
        let mut model = LpModel::new();
        let x = model.add_variable(0.0, f64::INFINITY);
        model.set_objective(vec![(x, 1.0)], Sense::Maximize);

        let solution = ClarabelBackend::default().solve(&model).unwrap();
        assert_eq!(solution.status, LpStatus::Unbounded);
    }

    #[test]
    fn test_fixed_variable_goes_to_zero_cone() {
        let mut model = LpModel::new();
        let x = model.add_variable(2.0, 2.0);
        let y = model.add_variable(0.0, 10.0);
        model.add_constraint(vec![(x, 1.0), (y, -1.0)], Relation::Equal, 0.0);
        model.set_objective(vec![(y, 1.0)], Sense::Minimize);

        let form = ConicForm::build(&model);
        assert_eq!(form.n_eq, 2);
        assert_eq!(form.n_ineq, 2);

        let solution = ClarabelBackend::default().solve(&model).unwrap();
        assert!((solution.value(y) - 2.0).abs() < 1e-6);
    }
}
