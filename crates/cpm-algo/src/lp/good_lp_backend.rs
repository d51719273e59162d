//! LP backend built on the `good_lp` modelling layer.

use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolutionStatus, Solver, SolverModel, Variable,
};
use tracing::debug;
use web_time::Instant;

use super::{LpBackend, LpError, LpModel, LpSolution, LpStatus, Relation, Sense, SolverSettings};

/// Solver used underneath good_lp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoodLpSolver {
    #[cfg(feature = "solver-clarabel")]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

/// Solves through good_lp, forwarding the time and iteration limits to the
/// underlying solver.
#[derive(Debug, Clone)]
pub struct GoodLpBackend {
    solver: GoodLpSolver,
    settings: SolverSettings,
}

impl GoodLpBackend {
    pub fn new(solver: GoodLpSolver, settings: SolverSettings) -> Self {
        Self { solver, settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    #[cfg(feature = "solver-clarabel")]
    fn configure_clarabel(
        &self,
        mut problem: good_lp::solvers::clarabel::ClarabelProblem,
    ) -> Result<good_lp::solvers::clarabel::ClarabelProblem, LpError> {
        problem.settings().max_iter(self.settings.max_iterations);
        if let Some(limit) = self.settings.time_limit {
            problem.settings().time_limit(limit.as_secs_f64());
        }
        Ok(problem)
    }

    #[cfg(feature = "solver-highs")]
    fn configure_highs(
        &self,
        problem: good_lp::solvers::highs::HighsProblem,
    ) -> Result<good_lp::solvers::highs::HighsProblem, LpError> {
        let iterations = i32::try_from(self.settings.max_iterations).map_err(|_| LpError::Setup {
            backend: self.name(),
            detail: format!(
                "iteration limit {} exceeds what HiGHS accepts",
                self.settings.max_iterations
            ),
        })?;
        let mut problem = problem
            .set_option("simplex_iteration_limit", iterations)
            .set_option("ipm_iteration_limit", iterations);
        if let Some(limit) = self.settings.time_limit {
            problem = problem.set_time_limit(limit.as_secs_f64());
        }
        Ok(problem)
    }
}

fn linear_expression(terms: &[(super::VarId, f64)], vars: &[Variable]) -> Expression {
    let mut expr = Expression::from(0.0);
    for (var, coeff) in terms {
        expr += *coeff * vars[var.index()];
    }
    expr
}

fn map_resolution_error(err: ResolutionError) -> LpStatus {
    match err {
        ResolutionError::Infeasible => LpStatus::Infeasible,
        ResolutionError::Unbounded => LpStatus::Unbounded,
        ResolutionError::Other("Time limit reached") => LpStatus::TimeLimit,
        other => LpStatus::Other(format!("good_lp: {}", other)),
    }
}

fn solve_with<S, F>(model: &LpModel, solver: S, configure: F) -> Result<LpSolution, LpError>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
    F: FnOnce(S::Model) -> Result<S::Model, LpError>,
{
    let start = Instant::now();

    let mut problem_vars = ProblemVariables::new();
    let vars: Vec<Variable> = model
        .variables()
        .iter()
        .map(|bounds| {
            let mut def = variable();
            if bounds.lower.is_finite() {
                def = def.min(bounds.lower);
            }
            if bounds.upper.is_finite() {
                def = def.max(bounds.upper);
            }
            problem_vars.add(def)
        })
        .collect();

    let objective = linear_expression(model.objective(), &vars);
    let unsolved = match model.sense() {
        Sense::Maximize => problem_vars.maximise(objective),
        Sense::Minimize => problem_vars.minimise(objective),
    };

    let mut problem = configure(unsolved.using(solver))?;
    for c in model.constraints() {
        let lhs = linear_expression(&c.terms, &vars);
        let rhs = c.rhs;
        problem = match c.relation {
            Relation::Equal => problem.with(constraint!(lhs == rhs)),
            Relation::LessEq => problem.with(constraint!(lhs <= rhs)),
            Relation::GreaterEq => problem.with(constraint!(lhs >= rhs)),
        };
    }

    let solution = match problem.solve() {
        Ok(solution) => solution,
        Err(err) => return Ok(LpSolution::failed(map_resolution_error(err), start.elapsed())),
    };
    // HiGHS hands back its incumbent when a limit stops it.
    match solution.status() {
        SolutionStatus::Optimal => {}
        SolutionStatus::TimeLimit => {
            return Ok(LpSolution::failed(LpStatus::TimeLimit, start.elapsed()));
        }
        SolutionStatus::GapLimit => {
            return Ok(LpSolution::failed(
                LpStatus::Other("good_lp: stopped at gap limit".to_string()),
                start.elapsed(),
            ));
        }
    }
    let values: Vec<f64> = vars.iter().map(|v| solution.value(*v)).collect();
    let objective = model.evaluate_objective(&values);
    Ok(LpSolution {
        status: LpStatus::Optimal,
        values,
        objective,
        iterations: 0,
        solve_time: start.elapsed(),
    })
}

impl LpBackend for GoodLpBackend {
    fn name(&self) -> &'static str {
        match self.solver {
            #[cfg(feature = "solver-clarabel")]
            GoodLpSolver::Clarabel => "good_lp/clarabel",
            #[cfg(feature = "solver-highs")]
            GoodLpSolver::Highs => "good_lp/highs",
        }
    }

    fn solve(&self, model: &LpModel) -> Result<LpSolution, LpError> {
        model.validate()?;
        debug!(
            variables = model.num_variables(),
            constraints = model.constraints().len(),
            backend = self.name(),
            "solving LP through good_lp"
        );
        match self.solver {
            #[cfg(feature = "solver-clarabel")]
            GoodLpSolver::Clarabel => solve_with(model, good_lp::solvers::clarabel::clarabel, |p| {
                self.configure_clarabel(p)
            }),
            #[cfg(feature = "solver-highs")]
            GoodLpSolver::Highs => solve_with(model, good_lp::solvers::highs::highs, |p| {
                self.configure_highs(p)
            }),
        }
    }
}

#[cfg(all(test, feature = "solver-clarabel"))]
mod tests {
    use super::*;

    #[test]
    fn test_matches_direct_backend_on_small_lp() {
        let mut model = LpModel::new();
        let x = model.add_variable(0.0, 3.0);
        let y = model.add_variable(0.0, 10.0);
        model.add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::LessEq, 4.0);
        model.set_objective(vec![(x, 3.0), (y, 2.0)], Sense::Maximize);

        let backend = GoodLpBackend::new(GoodLpSolver::Clarabel, SolverSettings::default());
        let solution = backend.solve(&model).unwrap();
        assert!(solution.status.is_optimal());
        assert!((solution.objective - 11.0).abs() < 1e-4);
        assert_eq!(backend.name(), "good_lp/clarabel");
    }

    #[test]
    fn test_infeasible_reported_as_status() {
        let mut model = LpModel::new();
        let x = model.add_variable(0.0, 1.0);
        model.add_constraint(vec![(x, 1.0)], Relation::GreaterEq, 2.0);
        model.set_objective(vec![(x, 1.0)], Sense::Minimize);

        let solution = GoodLpBackend::new(GoodLpSolver::Clarabel, SolverSettings::default())
            .solve(&model)
            .unwrap();
        assert!(!solution.status.is_optimal());
    }

    #[test]
    fn test_iteration_limit_reaches_clarabel() {
        let mut model = LpModel::new();
        let x = model.add_variable(0.0, 3.0);
        let y = model.add_variable(0.0, 10.0);
        model.add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::LessEq, 4.0);
        model.set_objective(vec![(x, 3.0), (y, 2.0)], Sense::Maximize);

        let settings = SolverSettings {
            time_limit: None,
            max_iterations: 1,
        };
        let backend = GoodLpBackend::new(GoodLpSolver::Clarabel, settings.clone());
        assert_eq!(backend.settings(), &settings);
        let solution = backend.solve(&model).unwrap();
        assert!(!solution.status.is_optimal());
    }
}
