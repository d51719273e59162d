//! Consistency checks for a dispatch against its bid tables.

use cpm_core::{DemandTable, DispatchResult, GeneratorTable};
use serde::Serialize;

/// Worst-case violations found in a dispatch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchViolations {
    /// Σ generation − Σ consumption (MW)
    pub balance_residual: f64,
    /// Largest excursion of a generator outside `[0, capacity]` (MW)
    pub max_generation_bound_violation: f64,
    /// Largest excursion of a demand block outside `[0, load]` (MW)
    pub max_consumption_bound_violation: f64,
    /// Dispatched generators with a strictly cheaper generator left idle
    pub generator_merit_breaches: usize,
    /// Served demand blocks with a strictly more willing block left unserved
    pub demand_merit_breaches: usize,
}

impl DispatchViolations {
    pub fn within_tolerance(&self, tolerance: f64) -> bool {
        self.balance_residual.abs() <= tolerance
            && self.max_generation_bound_violation <= tolerance
            && self.max_consumption_bound_violation <= tolerance
            && self.generator_merit_breaches == 0
            && self.demand_merit_breaches == 0
    }
}

fn bound_violation(value: f64, upper: f64) -> f64 {
    (-value).max(value - upper).max(0.0)
}

/// Compute balance, bound and merit-order violations.
///
/// Quantities within `tolerance` of zero count as idle.
pub fn compute_dispatch_violations(
    generators: &GeneratorTable,
    demands: &DemandTable,
    dispatch: &DispatchResult,
    tolerance: f64,
) -> DispatchViolations {
    let mut violations = DispatchViolations {
        balance_residual: dispatch.balance_residual(),
        ..Default::default()
    };

    for (g, &p) in generators.iter().zip(&dispatch.generation) {
        violations.max_generation_bound_violation = violations
            .max_generation_bound_violation
            .max(bound_violation(p, g.capacity.value()));
    }
    for (d, &c) in demands.iter().zip(&dispatch.consumption) {
        violations.max_consumption_bound_violation = violations
            .max_consumption_bound_violation
            .max(bound_violation(c, d.load.value()));
    }

    // Tables are sorted, so "strictly cheaper" units all sit before `b`.
    let gens = generators.bids();
    for b in 0..gens.len() {
        if dispatch.generation[b] <= tolerance {
            continue;
        }
        let breach = (0..b).any(|a| {
            gens[a].bid_price.value() < gens[b].bid_price.value()
                && gens[a].capacity.value() > tolerance
                && dispatch.generation[a] <= tolerance
        });
        if breach {
            violations.generator_merit_breaches += 1;
        }
    }

    let dems = demands.bids();
    for b in 0..dems.len() {
        if dispatch.consumption[b] <= tolerance {
            continue;
        }
        let breach = (0..b).any(|a| {
            dems[a].offer_price.value() > dems[b].offer_price.value()
                && dems[a].load.value() > tolerance
                && dispatch.consumption[a] <= tolerance
        });
        if breach {
            violations.demand_merit_breaches += 1;
        }
    }

    violations
}

/// Welfare comparison between a solver dispatch and a reference.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WelfareGap {
    pub welfare: f64,
    pub reference_welfare: f64,
    pub gap_abs: f64,
    /// Relative gap (fraction of the reference)
    pub gap_rel: f64,
}

impl WelfareGap {
    pub fn new(welfare: f64, reference_welfare: f64) -> Self {
        let gap_abs = (welfare - reference_welfare).abs();
        let gap_rel = if reference_welfare.abs() > 1e-10 {
            gap_abs / reference_welfare.abs()
        } else {
            gap_abs
        };
        Self {
            welfare,
            reference_welfare,
            gap_abs,
            gap_rel,
        }
    }
}
