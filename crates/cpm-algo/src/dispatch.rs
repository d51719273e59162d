//! Welfare-maximising copper-plate dispatch.
//!
//! One hour, one node, no network:
//!
//! ```text
//! maximize    Σ_j offer_j · d_j  −  Σ_i bid_i · g_i
//! subject to  Σ_i g_i = Σ_j d_j
//!             0 ≤ g_i ≤ capacity_i
//!             0 ≤ d_j ≤ load_j
//! ```
//!
//! Bounds are variable domains, so the LP has a single explicit constraint.
//! Its optimum reproduces merit-order dispatch, but solving it as an LP keeps
//! the welfare accounting exact and stays correct with ties and zero bids.
//!
//! Interior-point solvers land anywhere on a degenerate optimal face and stop
//! a hair short of bounds, so the raw solution is polished before it is
//! returned:
//!
//! 1. values within tolerance of a bound snap to the bound;
//! 2. with [`TieBreak::MeritOrder`], equal-priced units are refilled in table
//!    order and welfare-neutral volume (offer == bid) is traded, giving the
//!    maximum-volume vertex;
//! 3. any leftover balance residual is absorbed by a marginal unit.
//!
//! With [`TieBreak::Solver`] the solver's split among tied units is kept and
//! is not guaranteed reproducible across solvers or versions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use cpm_core::{ClearingError, DemandTable, DispatchResult, GeneratorTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::lp::{LpBackend, LpModel, LpSolverKind, Relation, Sense, SolverSettings, VarId};

/// Two prices closer than this are treated as the same price level.
const PRICE_EPS: f64 = 1e-9;

/// How degenerate optima (ties at equal prices) are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Fill tied units in table order and clear the maximum volume
    #[default]
    MeritOrder,
    /// Keep whatever split the solver returned
    Solver,
}

impl TieBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::MeritOrder => "merit-order",
            TieBreak::Solver => "solver",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieBreak {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "merit-order" | "merit" => Ok(TieBreak::MeritOrder),
            "solver" | "none" => Ok(TieBreak::Solver),
            other => Err(anyhow!(
                "unknown tie-break '{}'; supported values: merit-order, solver",
                other
            )),
        }
    }
}

/// The dispatch LP together with the handles of its variables.
#[derive(Debug)]
pub struct DispatchModel {
    pub model: LpModel,
    pub generation: Vec<VarId>,
    pub consumption: Vec<VarId>,
}

/// Build the welfare-maximisation LP for one period.
pub fn formulate(generators: &GeneratorTable, demands: &DemandTable) -> DispatchModel {
    let mut model = LpModel::new();

    let generation: Vec<VarId> = generators
        .iter()
        .map(|g| model.add_variable(0.0, g.capacity.value()))
        .collect();
    let consumption: Vec<VarId> = demands
        .iter()
        .map(|d| model.add_variable(0.0, d.load.value()))
        .collect();

    // Σ d_j − Σ g_i = 0
    let balance: Vec<(VarId, f64)> = consumption
        .iter()
        .map(|&v| (v, 1.0))
        .chain(generation.iter().map(|&v| (v, -1.0)))
        .collect();
    model.add_constraint(balance, Relation::Equal, 0.0);

    let welfare: Vec<(VarId, f64)> = demands
        .iter()
        .zip(&consumption)
        .map(|(d, &v)| (v, d.offer_price.value()))
        .chain(
            generators
                .iter()
                .zip(&generation)
                .map(|(g, &v)| (v, -g.bid_price.value())),
        )
        .collect();
    model.set_objective(welfare, Sense::Maximize);

    DispatchModel {
        model,
        generation,
        consumption,
    }
}

/// Σ offer · d − Σ bid · g for a given dispatch.
pub fn welfare_of(
    generators: &GeneratorTable,
    demands: &DemandTable,
    generation: &[f64],
    consumption: &[f64],
) -> f64 {
    let value: f64 = demands
        .iter()
        .zip(consumption)
        .map(|(d, &c)| d.offer_price.value() * c)
        .sum();
    let cost: f64 = generators
        .iter()
        .zip(generation)
        .map(|(g, &p)| g.bid_price.value() * p)
        .sum();
    value - cost
}

/// Builds and solves the dispatch LP.
///
/// Each call to [`DispatchEngine::dispatch`] gets its own backend instance,
/// so one engine can be shared across threads clearing independent periods.
#[derive(Clone)]
pub struct DispatchEngine {
    solver: LpSolverKind,
    settings: SolverSettings,
    backend: Option<Arc<dyn LpBackend>>,
    tolerance: f64,
    tie_break: TieBreak,
    adequacy_check: bool,
}

impl fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("solver", &self.solver_name())
            .field("settings", &self.settings)
            .field("tolerance", &self.tolerance)
            .field("tie_break", &self.tie_break)
            .field("adequacy_check", &self.adequacy_check)
            .finish()
    }
}

impl DispatchEngine {
    /// Clarabel, no time limit, 1e-6 tolerance, merit-order tie-break,
    /// adequacy check on.
    pub fn new() -> Self {
        Self {
            solver: LpSolverKind::default(),
            settings: SolverSettings::default(),
            backend: None,
            tolerance: 1e-6,
            tie_break: TieBreak::default(),
            adequacy_check: true,
        }
    }

    pub fn with_solver(mut self, solver: LpSolverKind) -> Self {
        self.solver = solver;
        self.backend = None;
        self
    }

    /// Use a caller-provided backend instead of a built-in one.
    pub fn with_backend(mut self, backend: Arc<dyn LpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// A solve that hits the limit fails with `DispatchInfeasible`.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.settings.time_limit = Some(limit);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.settings.max_iterations = max_iterations;
        self
    }

    /// Must be finite and non-negative; [`DispatchEngine::dispatch`] rejects
    /// anything else with `InvalidInput`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Reject periods whose total capacity cannot cover total load.
    pub fn with_adequacy_check(mut self, enabled: bool) -> Self {
        self.adequacy_check = enabled;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn solver_name(&self) -> &'static str {
        match &self.backend {
            Some(backend) => backend.name(),
            None => self.solver.as_str(),
        }
    }

    fn instantiate_backend(&self) -> Arc<dyn LpBackend> {
        match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => Arc::from(self.solver.build_backend(&self.settings)),
        }
    }

    /// Solve the dispatch for one period.
    pub fn dispatch(
        &self,
        generators: &GeneratorTable,
        demands: &DemandTable,
    ) -> Result<DispatchResult, ClearingError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ClearingError::InvalidInput(format!(
                "dispatch tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        if self.adequacy_check {
            let capacity = generators.total_capacity();
            let load = demands.total_load();
            if capacity.value() + self.tolerance < load.value() {
                return Err(ClearingError::DispatchInfeasible(format!(
                    "total generator capacity {} is below total demand {}",
                    capacity, load
                )));
            }
        }

        let formulation = formulate(generators, demands);
        let backend = self.instantiate_backend();
        debug!(
            generators = generators.len(),
            demands = demands.len(),
            backend = backend.name(),
            "formulated dispatch LP"
        );

        let solution = backend.solve(&formulation.model).map_err(|e| {
            warn!(error = %e, "LP backend failed");
            ClearingError::DispatchInfeasible(format!("{}: {}", backend.name(), e))
        })?;

        if !solution.status.is_optimal() {
            warn!(status = %solution.status, "dispatch LP not solved to optimality");
            return Err(ClearingError::DispatchInfeasible(format!(
                "{} reported {}",
                backend.name(),
                solution.status
            )));
        }

        let mut generation: Vec<f64> = formulation
            .generation
            .iter()
            .map(|&v| solution.value(v))
            .collect();
        let mut consumption: Vec<f64> = formulation
            .consumption
            .iter()
            .map(|&v| solution.value(v))
            .collect();

        let caps: Vec<f64> = generators.iter().map(|g| g.capacity.value()).collect();
        let loads: Vec<f64> = demands.iter().map(|d| d.load.value()).collect();
        snap_to_bounds(&mut generation, &caps, self.tolerance);
        snap_to_bounds(&mut consumption, &loads, self.tolerance);

        if self.tie_break == TieBreak::MeritOrder {
            let bids: Vec<f64> = generators.iter().map(|g| g.bid_price.value()).collect();
            let offers: Vec<f64> = demands.iter().map(|d| d.offer_price.value()).collect();
            refill_price_groups(&mut generation, &caps, &bids);
            refill_price_groups(&mut consumption, &loads, &offers);
            let traded = trade_neutral_volume(
                &mut generation,
                &caps,
                &bids,
                &mut consumption,
                &loads,
                &offers,
                self.tolerance,
            );
            if traded > 0.0 {
                debug!(traded_mw = traded, "cleared extra welfare-neutral volume");
            }
        }

        let residual = absorb_residual(&mut generation, &caps, &mut consumption, &loads);
        let scale = 1.0 + generators.total_capacity().value();
        if residual.abs() > self.tolerance * scale {
            warn!(residual, "dispatch violates power balance beyond tolerance");
            return Err(ClearingError::DispatchInfeasible(format!(
                "{} returned an unbalanced dispatch (residual {:.3e} MW)",
                backend.name(),
                residual
            )));
        }

        let welfare = welfare_of(generators, demands, &generation, &consumption);
        let result = DispatchResult {
            generation,
            consumption,
            welfare,
            solver: backend.name().to_string(),
            iterations: solution.iterations,
            solve_time_ms: solution.solve_time.as_millis(),
        };
        info!(
            welfare = result.welfare,
            cleared_mw = result.total_consumption(),
            "dispatch solved"
        );
        Ok(result)
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn snap_to_bounds(values: &mut [f64], uppers: &[f64], tolerance: f64) {
    for (value, &upper) in values.iter_mut().zip(uppers) {
        if *value <= tolerance {
            *value = 0.0;
        } else if *value >= upper - tolerance {
            *value = upper;
        }
    }
}

/// Within each run of equal prices, move the run's volume to its earliest rows.
fn refill_price_groups(values: &mut [f64], uppers: &[f64], prices: &[f64]) {
    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        while end < values.len() && (prices[end] - prices[start]).abs() <= PRICE_EPS {
            end += 1;
        }
        if end - start > 1 {
            let mut remaining: f64 = values[start..end].iter().sum();
            for k in start..end {
                let take = remaining.min(uppers[k]).max(0.0);
                values[k] = take;
                remaining -= take;
            }
        }
        start = end;
    }
}

/// Raise the cheapest generator and the most willing demand with headroom
/// together while the demand's offer covers the generator's bid. At an LP
/// optimum these trades are welfare-neutral; they pick the maximum-volume
/// vertex of the optimal face. Returns the MW added.
fn trade_neutral_volume(
    generation: &mut [f64],
    caps: &[f64],
    bids: &[f64],
    consumption: &mut [f64],
    loads: &[f64],
    offers: &[f64],
    tolerance: f64,
) -> f64 {
    let mut traded = 0.0;
    loop {
        let Some(i) = (0..generation.len()).find(|&i| generation[i] < caps[i] - tolerance) else {
            break;
        };
        let Some(j) = (0..consumption.len()).find(|&j| consumption[j] < loads[j] - tolerance)
        else {
            break;
        };
        if offers[j] + PRICE_EPS < bids[i] {
            break;
        }
        let delta = (caps[i] - generation[i]).min(loads[j] - consumption[j]);
        if delta <= 0.0 {
            break;
        }
        generation[i] = if delta == caps[i] - generation[i] {
            caps[i]
        } else {
            generation[i] + delta
        };
        consumption[j] = if delta == loads[j] - consumption[j] {
            loads[j]
        } else {
            consumption[j] + delta
        };
        traded += delta;
    }
    traded
}

/// Push Σg − Σd into a unit strictly inside its bounds, generators first.
/// Returns whatever residual could not be absorbed.
fn absorb_residual(
    generation: &mut [f64],
    caps: &[f64],
    consumption: &mut [f64],
    loads: &[f64],
) -> f64 {
    let residual: f64 = generation.iter().sum::<f64>() - consumption.iter().sum::<f64>();
    if residual == 0.0 {
        return 0.0;
    }

    let interior_gen = (0..generation.len())
        .rev()
        .find(|&i| generation[i] > 0.0 && generation[i] < caps[i]);
    if let Some(i) = interior_gen {
        let adjusted = generation[i] - residual;
        if (0.0..=caps[i]).contains(&adjusted) {
            generation[i] = adjusted;
            return 0.0;
        }
    }

    let interior_dem = (0..consumption.len())
        .rev()
        .find(|&j| consumption[j] > 0.0 && consumption[j] < loads[j]);
    if let Some(j) = interior_dem {
        let adjusted = consumption[j] + residual;
        if (0.0..=loads[j]).contains(&adjusted) {
            consumption[j] = adjusted;
            return 0.0;
        }
    }

    residual
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpm_core::{DemandBid, GeneratorBid};

    fn tables() -> (GeneratorTable, DemandTable) {
        let generators = GeneratorTable::new(vec![
            GeneratorBid::new("Cheap", 50.0, 10.0),
            GeneratorBid::new("Dear", 50.0, 30.0),
        ])
        .unwrap();
        let demands = DemandTable::new(vec![DemandBid::new("Town", 70.0, 100.0)]).unwrap();
        (generators, demands)
    }

    #[test]
    fn test_formulation_shape() {
        let (generators, demands) = tables();
        let formulation = formulate(&generators, &demands);

        assert_eq!(formulation.model.num_variables(), 3);
        assert_eq!(formulation.model.constraints().len(), 1);
        assert_eq!(formulation.model.constraints()[0].relation, Relation::Equal);
        assert_eq!(formulation.model.sense(), Sense::Maximize);
        assert_eq!(formulation.model.variables()[1].upper, 50.0);
    }

    #[test]
    fn test_welfare_of() {
        let (generators, demands) = tables();
        // 70 MW at 100 $/MWh minus 50·10 + 20·30
        let w = welfare_of(&generators, &demands, &[50.0, 20.0], &[70.0]);
        assert_eq!(w, 7000.0 - 500.0 - 600.0);
    }

    #[test]
    fn test_snap_to_bounds() {
        let mut values = vec![1e-8, 49.9999999, 25.0];
        snap_to_bounds(&mut values, &[50.0, 50.0, 50.0], 1e-6);
        assert_eq!(values, vec![0.0, 50.0, 25.0]);
    }

    #[test]
    fn test_refill_price_groups_fills_in_table_order() {
        let mut values = vec![10.0, 7.5, 7.5, 0.0];
        refill_price_groups(&mut values, &[10.0, 10.0, 10.0, 10.0], &[0.0, 5.0, 5.0, 9.0]);
        assert_eq!(values, vec![10.0, 10.0, 5.0, 0.0]);
    }

    #[test]
    fn test_trade_neutral_volume_clears_tied_block() {
        // Generator at 80 half used, demand at 80 half served: trade to the max.
        let mut generation = vec![30.0, 2.5];
        let mut consumption = vec![30.0, 2.5];
        let traded = trade_neutral_volume(
            &mut generation,
            &[30.0, 40.0],
            &[70.0, 80.0],
            &mut consumption,
            &[30.0, 20.0],
            &[120.0, 80.0],
            1e-6,
        );
        assert_eq!(traded, 17.5);
        assert_eq!(generation, vec![30.0, 20.0]);
        assert_eq!(consumption, vec![30.0, 20.0]);
    }

    #[test]
    fn test_trade_stops_when_offer_below_bid() {
        let mut generation = vec![10.0, 0.0];
        let mut consumption = vec![10.0, 0.0];
        let traded = trade_neutral_volume(
            &mut generation,
            &[10.0, 10.0],
            &[5.0, 50.0],
            &mut consumption,
            &[10.0, 10.0],
            &[60.0, 40.0],
            1e-6,
        );
        assert_eq!(traded, 0.0);
    }

    #[test]
    fn test_absorb_residual_uses_marginal_generator() {
        let mut generation = vec![50.0, 20.000001];
        let mut consumption = vec![70.0];
        let left = absorb_residual(&mut generation, &[50.0, 50.0], &mut consumption, &[70.0]);
        assert_eq!(left, 0.0);
        assert!((generation.iter().sum::<f64>() - 70.0).abs() < 1e-12);
    }

    #[test]
    fn test_tie_break_parsing() {
        assert_eq!("merit-order".parse::<TieBreak>().unwrap(), TieBreak::MeritOrder);
        assert_eq!("SOLVER".parse::<TieBreak>().unwrap(), TieBreak::Solver);
        assert!("random".parse::<TieBreak>().is_err());
    }

    #[test]
    fn test_adequacy_check_runs_before_solver() {
        let generators = GeneratorTable::new(vec![GeneratorBid::new("Small", 10.0, 5.0)]).unwrap();
        let demands = DemandTable::new(vec![DemandBid::new("Big", 20.0, 50.0)]).unwrap();
        let err = DispatchEngine::new()
            .dispatch(&generators, &demands)
            .unwrap_err();
        assert!(matches!(err, ClearingError::DispatchInfeasible(_)));
    }
}
