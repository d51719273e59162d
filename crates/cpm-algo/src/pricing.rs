//! Merit-order clearing-price discovery.
//!
//! Walks the generator table cheapest first and stops at the unit that sets
//! the price:
//!
//! | Unit `i` | Next unit | Outcome |
//! |----------|-----------|---------|
//! | partially loaded | - | [`PriceOutcome::Marginal`] at `bid[i]` |
//! | saturated | dispatched | keep scanning at `i + 1` |
//! | saturated | idle | [`PriceOutcome::IntervalAmbiguous`] `[bid[i], bid[i+1]]` |
//! | saturated and last, or anything else | - | [`PriceOutcome::SaturatedTerminal`] at `bid[i]` |
//!
//! Units with zero capacity can never run, so the scan steps over them: the
//! "next unit" is the next one with capacity above the tolerance.
//!
//! The reported price always belongs to the unit where the scan stops, never
//! to a unit the scan passed over. The interval case is a genuine property of
//! the dispatch: every price between the two bid levels clears the same
//! quantities.

use cpm_core::{ClearingError, ClearingPrice, GeneratorTable};
use serde::Serialize;

/// Where and why the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceOutcome {
    /// Unit `index` is partially loaded and sets the price.
    Marginal { index: usize, price: f64 },
    /// Unit `index` is saturated and the next unit is idle.
    IntervalAmbiguous { index: usize, low: f64, high: f64 },
    /// Unit `index` is saturated with nothing after it to examine.
    SaturatedTerminal { index: usize, price: f64 },
}

impl PriceOutcome {
    pub fn clearing_price(&self) -> ClearingPrice {
        match *self {
            PriceOutcome::Marginal { price, .. } | PriceOutcome::SaturatedTerminal { price, .. } => {
                ClearingPrice::Single(price)
            }
            PriceOutcome::IntervalAmbiguous { low, high, .. } => ClearingPrice::Interval([low, high]),
        }
    }

    /// Index (in merit order) of the unit where the scan stopped.
    pub fn marginal_index(&self) -> usize {
        match *self {
            PriceOutcome::Marginal { index, .. }
            | PriceOutcome::IntervalAmbiguous { index, .. }
            | PriceOutcome::SaturatedTerminal { index, .. } => index,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriceOutcome::Marginal { .. } => "marginal",
            PriceOutcome::IntervalAmbiguous { .. } => "interval",
            PriceOutcome::SaturatedTerminal { .. } => "saturated",
        }
    }
}

enum ScanState {
    Examine(usize),
    Stop(PriceOutcome),
}

/// Run the merit-order scan.
///
/// `generation` must be aligned with `generators` (merit order). Values
/// within `tolerance` of zero or of capacity count as idle or saturated.
pub fn resolve_price_outcome(
    generators: &GeneratorTable,
    generation: &[f64],
    tolerance: f64,
) -> Result<PriceOutcome, ClearingError> {
    if generation.len() != generators.len() {
        return Err(ClearingError::PriceResolutionFailed(format!(
            "dispatch has {} generator entries but the table has {}",
            generation.len(),
            generators.len()
        )));
    }
    if let Some(bad) = generation.iter().find(|g| !g.is_finite()) {
        return Err(ClearingError::PriceResolutionFailed(format!(
            "dispatch contains a non-finite value ({bad})"
        )));
    }
    let total: f64 = generation.iter().sum();
    if total <= tolerance {
        return Err(ClearingError::PriceResolutionFailed(
            "no generation dispatched; nothing sets a price".to_string(),
        ));
    }

    let bids = generators.bids();
    let is_idle = |g: f64| g.abs() <= tolerance;
    let next_active =
        |from: usize| (from..bids.len()).find(|&k| bids[k].capacity.value() > tolerance);
    let Some(first) = next_active(0) else {
        return Err(ClearingError::PriceResolutionFailed(
            "no generator has capacity".to_string(),
        ));
    };
    let mut state = ScanState::Examine(first);

    loop {
        state = match state {
            ScanState::Stop(outcome) => return Ok(outcome),
            ScanState::Examine(i) => {
                let (Some(unit), Some(&g)) = (bids.get(i), generation.get(i)) else {
                    return Err(ClearingError::PriceResolutionFailed(format!(
                        "scan ran past the last generator (index {i})"
                    )));
                };
                let capacity = unit.capacity.value();
                let price = unit.bid_price.value();
                let partially_loaded = g > tolerance && g < capacity - tolerance;
                let saturated = (g - capacity).abs() <= tolerance;

                if partially_loaded {
                    ScanState::Stop(PriceOutcome::Marginal { index: i, price })
                } else if let (true, Some(next)) = (saturated, next_active(i + 1)) {
                    if !is_idle(generation[next]) {
                        ScanState::Examine(next)
                    } else {
                        ScanState::Stop(PriceOutcome::IntervalAmbiguous {
                            index: i,
                            low: price,
                            high: bids[next].bid_price.value(),
                        })
                    }
                } else {
                    ScanState::Stop(PriceOutcome::SaturatedTerminal { index: i, price })
                }
            }
        };
    }
}

/// [`resolve_price_outcome`] reduced to the price itself.
pub fn resolve_clearing_price(
    generators: &GeneratorTable,
    generation: &[f64],
    tolerance: f64,
) -> Result<ClearingPrice, ClearingError> {
    resolve_price_outcome(generators, generation, tolerance).map(|o| o.clearing_price())
}
