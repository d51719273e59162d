//! # cpm-algo: Copper-Plate Market Clearing
//!
//! Economic dispatch and price discovery for a single-node electricity
//! market. Clearing a period is two steps:
//!
//! 1. [`DispatchEngine::dispatch`] solves the welfare-maximising LP and
//!    returns MW per generator and per demand block.
//! 2. [`resolve_price_outcome`] walks the generator merit order against that
//!    dispatch and reports the uniform clearing price, which may be an
//!    interval when the marginal unit is exactly saturated.
//!
//! [`market::clear`] chains both and [`market::clear_periods`] clears many
//! independent hours in parallel.
//!
//! ## Solver backends
//!
//! | Backend | Kind | Notes |
//! |---------|------|-------|
//! | [`lp::ClarabelBackend`] | `clarabel` | Direct conic interface, always built |
//! | [`lp::GoodLpBackend`] | `good_lp` | `good_lp` modelling layer over Clarabel |
//! | [`lp::GoodLpBackend`] | `highs` | Requires the `solver-highs` feature |
//!
//! ## Around the core
//!
//! - [`merit_order`]: closed-form greedy dispatch used as a welfare reference
//! - [`validation`]: balance, bound and merit-order checks on a dispatch
//! - [`settlement`]: revenues, payments and surplus at the clearing price
//! - [`curves`]: supply/demand step curves for an external plotter
//! - [`io`]: CSV loading of bid tables
//!
//! ## Example
//!
//! ```no_run
//! use cpm_algo::{market, test_utils, DispatchEngine};
//!
//! let period = test_utils::worked_example_period()?;
//! let clearing = market::clear_period(&DispatchEngine::new(), &period)?;
//! println!("{} at {}", clearing.cleared_quantity, clearing.price);
//! # Ok::<(), cpm_core::ClearingError>(())
//! ```

pub mod curves;
pub mod dispatch;
pub mod io;
pub mod lp;
pub mod market;
pub mod merit_order;
pub mod pricing;
pub mod settlement;
pub mod test_utils;
pub mod validation;

pub use curves::{AxisLimits, CurveStep, SupplyDemandCurves};
pub use dispatch::{formulate, welfare_of, DispatchEngine, DispatchModel, TieBreak};
pub use lp::{LpBackend, LpError, LpSolution, LpSolverKind, LpStatus, SolverSettings};
pub use market::{clear, clear_period, clear_periods, MarketClearing};
pub use merit_order::merit_order_dispatch;
pub use pricing::{resolve_clearing_price, resolve_price_outcome, PriceOutcome};
pub use settlement::{settle, DemandSettlement, GeneratorSettlement, Settlement, SettlementRule};
pub use validation::{compute_dispatch_violations, DispatchViolations, WelfareGap};
