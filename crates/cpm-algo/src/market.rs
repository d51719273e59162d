//! Dispatch-then-price clearing of market periods.
//!
//! Each period is independent: its own LP, its own backend instance, no
//! shared state. [`clear_periods`] therefore fans periods out across the
//! rayon pool and returns results in input order.

use cpm_core::{
    ClearingError, ClearingPrice, DemandTable, DispatchResult, GeneratorTable, MarketPeriod,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::dispatch::DispatchEngine;
use crate::pricing::{resolve_price_outcome, PriceOutcome};

/// Outcome of clearing one period.
#[derive(Debug, Clone, Serialize)]
pub struct MarketClearing {
    pub period: u32,
    pub dispatch: DispatchResult,
    pub outcome: PriceOutcome,
    pub price: ClearingPrice,
    /// Total served demand (MW)
    pub cleared_quantity: f64,
}

impl MarketClearing {
    /// Name of the generator where the price scan stopped.
    pub fn price_setter<'a>(&self, generators: &'a GeneratorTable) -> Option<&'a str> {
        generators
            .get(self.outcome.marginal_index())
            .map(|g| g.name.as_str())
    }
}

/// Dispatch one period and resolve its clearing price.
pub fn clear(
    engine: &DispatchEngine,
    period: u32,
    generators: &GeneratorTable,
    demands: &DemandTable,
) -> Result<MarketClearing, ClearingError> {
    let dispatch = engine.dispatch(generators, demands)?;
    let outcome = resolve_price_outcome(generators, &dispatch.generation, engine.tolerance())?;
    let price = outcome.clearing_price();
    let cleared_quantity = dispatch.total_consumption();

    info!(
        period,
        price = %price,
        cleared_mw = cleared_quantity,
        outcome = outcome.label(),
        "period cleared"
    );

    Ok(MarketClearing {
        period,
        dispatch,
        outcome,
        price,
        cleared_quantity,
    })
}

pub fn clear_period(
    engine: &DispatchEngine,
    period: &MarketPeriod,
) -> Result<MarketClearing, ClearingError> {
    clear(engine, period.period, &period.generators, &period.demands)
}

/// Clear many periods in parallel.
///
/// A failing period does not stop the others; its error is returned in its
/// slot.
pub fn clear_periods(
    engine: &DispatchEngine,
    periods: &[MarketPeriod],
) -> Vec<(u32, Result<MarketClearing, ClearingError>)> {
    periods
        .par_iter()
        .map(|p| {
            let result = clear_period(engine, p);
            if let Err(e) = &result {
                warn!(period = p.period, error = %e, "period failed to clear");
            }
            (p.period, result)
        })
        .collect()
}
