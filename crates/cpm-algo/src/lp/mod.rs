//! Minimal linear-programming layer.
//!
//! The dispatch engine only needs a handful of capabilities from a solver:
//! continuous variables with bounds, linear constraints, a linear objective
//! with a sense, a solve, and a status/values/objective query. [`LpModel`]
//! captures exactly that, and [`LpBackend`] is the seam where concrete
//! solvers plug in:
//!
//! | Backend | Solver | Notes |
//! |---------|--------|-------|
//! | [`ClarabelBackend`] | Clarabel (interior point) | Direct API, status codes, time limit |
//! | `GoodLpBackend` | good_lp → Clarabel / HiGHS | Modelling-layer route, time and iteration limits |
//!
//! Any solver satisfying the same capability set can be substituted by
//! implementing [`LpBackend`].

mod clarabel_backend;
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
mod good_lp_backend;

pub use clarabel_backend::ClarabelBackend;
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
pub use good_lp_backend::{GoodLpBackend, GoodLpSolver};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;

/// Handle to a variable inside one [`LpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Continuous variable domain. Infinite bounds mean "unbounded on that side".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBounds {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    LessEq,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// `Σ coeff · var  (relation)  rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// A linear program: bounded continuous variables, linear constraints and a
/// linear objective.
#[derive(Debug, Clone, Default)]
pub struct LpModel {
    variables: Vec<VariableBounds>,
    constraints: Vec<LinearConstraint>,
    objective: Vec<(VarId, f64)>,
    sense: Sense,
}

impl LpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, lower: f64, upper: f64) -> VarId {
        self.variables.push(VariableBounds { lower, upper });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, terms: Vec<(VarId, f64)>, relation: Relation, rhs: f64) {
        self.constraints.push(LinearConstraint {
            terms,
            relation,
            rhs,
        });
    }

    pub fn set_objective(&mut self, terms: Vec<(VarId, f64)>, sense: Sense) {
        self.objective = terms;
        self.sense = sense;
    }

    pub fn variables(&self) -> &[VariableBounds] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &[(VarId, f64)] {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Objective value at `values`, in the model's own sense.
    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .map(|(var, coeff)| coeff * values.get(var.0).copied().unwrap_or(0.0))
            .sum()
    }

    /// Check model consistency before handing it to a backend.
    pub fn validate(&self) -> Result<(), LpError> {
        let n = self.variables.len();
        for (i, bounds) in self.variables.iter().enumerate() {
            if bounds.lower.is_nan() || bounds.upper.is_nan() || bounds.lower > bounds.upper {
                return Err(LpError::InvalidModel(format!(
                    "variable {i} has empty domain [{}, {}]",
                    bounds.lower, bounds.upper
                )));
            }
        }
        let terms = self
            .constraints
            .iter()
            .flat_map(|c| c.terms.iter())
            .chain(self.objective.iter());
        for (var, coeff) in terms {
            if var.0 >= n {
                return Err(LpError::InvalidModel(format!(
                    "reference to unknown variable {}",
                    var.0
                )));
            }
            if !coeff.is_finite() {
                return Err(LpError::InvalidModel(format!(
                    "non-finite coefficient {coeff} on variable {}",
                    var.0
                )));
            }
        }
        Ok(())
    }
}

/// Termination status reported by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
    Other(String),
}

impl LpStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, LpStatus::Optimal)
    }
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LpStatus::Optimal => write!(f, "optimal"),
            LpStatus::Infeasible => write!(f, "infeasible"),
            LpStatus::Unbounded => write!(f, "unbounded"),
            LpStatus::TimeLimit => write!(f, "time limit reached"),
            LpStatus::Other(detail) => write!(f, "{detail}"),
        }
    }
}

/// Result of one solve. `values` and `objective` are only meaningful when
/// `status` is [`LpStatus::Optimal`].
#[derive(Debug, Clone)]
pub struct LpSolution {
    pub status: LpStatus,
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: u32,
    pub solve_time: Duration,
}

impl LpSolution {
    /// A non-optimal outcome with no usable primal values.
    pub fn failed(status: LpStatus, solve_time: Duration) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: f64::NAN,
            iterations: 0,
            solve_time,
        }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }
}

/// Failures to build or run a solve (as opposed to a solve that finished
/// with a non-optimal status).
#[derive(Debug, Clone, Error)]
pub enum LpError {
    #[error("invalid LP model: {0}")]
    InvalidModel(String),

    #[error("{backend} setup failed: {detail}")]
    Setup { backend: &'static str, detail: String },
}

/// A linear-program solver.
pub trait LpBackend: Send + Sync {
    /// Short identifier used in logs and reports
    fn name(&self) -> &'static str;

    fn solve(&self, model: &LpModel) -> Result<LpSolution, LpError>;
}

/// Solver limits shared by all backends.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// Wall-clock limit; `None` means unlimited
    pub time_limit: Option<Duration>,
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_iterations: 200,
        }
    }
}

/// Selectable LP backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LpSolverKind {
    #[default]
    Clarabel,
    #[cfg(feature = "solver-clarabel")]
    GoodLp,
    #[cfg(feature = "solver-highs")]
    Highs,
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "clarabel",
    #[cfg(feature = "solver-clarabel")]
    "good_lp",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::GoodLp => "good_lp",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }

    pub fn build_backend(&self, settings: &SolverSettings) -> Box<dyn LpBackend> {
        match self {
            LpSolverKind::Clarabel => Box::new(ClarabelBackend::new(settings.clone())),
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::GoodLp => {
                Box::new(GoodLpBackend::new(GoodLpSolver::Clarabel, settings.clone()))
            }
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => {
                Box::new(GoodLpBackend::new(GoodLpSolver::Highs, settings.clone()))
            }
        }
    }
}

impl fmt::Display for LpSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_solver_error(label: &str) -> anyhow::Error {
    anyhow!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    )
}

impl FromStr for LpSolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "clarabel" => Ok(LpSolverKind::Clarabel),
            "good_lp" | "goodlp" => {
                #[cfg(feature = "solver-clarabel")]
                {
                    Ok(LpSolverKind::GoodLp)
                }
                #[cfg(not(feature = "solver-clarabel"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            _ => Err(unknown_solver_error(&normalized)),
        }
    }
}
