//! Outputs of a market clearing: the dispatch and the clearing price.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Optimal dispatch for one period.
///
/// `generation[i]` belongs to the i-th generator of the [`GeneratorTable`]
/// that produced it (merit order), `consumption[j]` to the j-th row of the
/// [`DemandTable`].
///
/// [`GeneratorTable`]: crate::GeneratorTable
/// [`DemandTable`]: crate::DemandTable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Dispatched MW per generator
    pub generation: Vec<f64>,
    /// Served MW per demand block
    pub consumption: Vec<f64>,
    /// Demand value minus generation cost ($ for the period)
    pub welfare: f64,

    // === Solve metadata ===
    pub solver: String,
    pub iterations: u32,
    pub solve_time_ms: u128,
}

impl DispatchResult {
    pub fn total_generation(&self) -> f64 {
        self.generation.iter().sum()
    }

    pub fn total_consumption(&self) -> f64 {
        self.consumption.iter().sum()
    }

    /// Generation minus consumption; zero up to solver tolerance.
    pub fn balance_residual(&self) -> f64 {
        self.total_generation() - self.total_consumption()
    }
}

/// Uniform market-clearing price in $/MWh.
///
/// `Interval([low, high])` arises when the last dispatched generator is
/// exactly saturated and the next one in merit order is idle: every price in
/// the interval clears the same quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClearingPrice {
    Single(f64),
    Interval([f64; 2]),
}

impl ClearingPrice {
    pub fn low(&self) -> f64 {
        match self {
            ClearingPrice::Single(p) => *p,
            ClearingPrice::Interval([low, _]) => *low,
        }
    }

    pub fn high(&self) -> f64 {
        match self {
            ClearingPrice::Single(p) => *p,
            ClearingPrice::Interval([_, high]) => *high,
        }
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.low() + self.high())
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, ClearingPrice::Interval(_))
    }
}

impl fmt::Display for ClearingPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearingPrice::Single(p) => write!(f, "{p} $/MWh"),
            ClearingPrice::Interval([low, high]) => write!(f, "[{low}, {high}] $/MWh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_serializes_as_scalar_or_pair() {
        assert_eq!(serde_json::to_string(&ClearingPrice::Single(80.0)).unwrap(), "80.0");
        assert_eq!(
            serde_json::to_string(&ClearingPrice::Interval([70.0, 80.0])).unwrap(),
            "[70.0,80.0]"
        );
        let back: ClearingPrice = serde_json::from_str("[70.0,80.0]").unwrap();
        assert!(back.is_interval());
    }

    #[test]
    fn test_price_bounds() {
        let interval = ClearingPrice::Interval([70.0, 80.0]);
        assert_eq!(interval.low(), 70.0);
        assert_eq!(interval.high(), 80.0);
        assert_eq!(interval.midpoint(), 75.0);
        assert_eq!(ClearingPrice::Single(40.0).midpoint(), 40.0);
        assert_eq!(interval.to_string(), "[70, 80] $/MWh");
    }

    #[test]
    fn test_balance_residual() {
        let dispatch = DispatchResult {
            generation: vec![20.0, 5.0, 15.0],
            consumption: vec![40.0],
            welfare: 1000.0,
            solver: "test".into(),
            iterations: 0,
            solve_time_ms: 0,
        };
        assert_eq!(dispatch.total_generation(), 40.0);
        assert_eq!(dispatch.balance_residual(), 0.0);
    }
}
