//! # cpm-core: Copper-Plate Market Data Model
//!
//! Types shared by the dispatch engine, the price resolver and anything that
//! presents their results.
//!
//! ## Design Philosophy
//!
//! A copper-plate market has no network: one hour of supply offers meets one
//! hour of demand bids at a single node. The data model is therefore two
//! ordered tables and two results:
//!
//! - [`GeneratorTable`] - generator bids, ascending by price (merit order)
//! - [`DemandTable`] - demand bids, descending by price
//! - [`DispatchResult`] - MW per generator and per demand block, plus welfare
//! - [`ClearingPrice`] - a single price or a `[low, high]` interval
//!
//! Tables sort themselves on construction, so the merit-order invariant is
//! carried by the type rather than by caller discipline. Rows are named
//! structs; nothing is addressed by column position.
//!
//! ## Quick Start
//!
//! ```rust
//! use cpm_core::*;
//!
//! let generators = GeneratorTable::new(vec![
//!     GeneratorBid::new("Gas 1", 40.0, 80.0),
//!     GeneratorBid::new("Nuclear", 80.0, 20.0),
//! ])?;
//! let demands = DemandTable::new(vec![DemandBid::new("Houses", 100.0, 120.0)])?;
//!
//! assert_eq!(generators.bids()[0].name, "Nuclear");
//! let period = MarketPeriod::new(0, generators, demands);
//! assert_eq!(period.demands.total_load(), Megawatts(100.0));
//! # Ok::<(), ClearingError>(())
//! ```

pub mod bids;
pub mod clearing;
pub mod error;
pub mod units;

pub use bids::{DemandBid, DemandTable, GeneratorBid, GeneratorTable, MarketPeriod};
pub use clearing::{ClearingPrice, DispatchResult};
pub use error::{ClearingError, CpmError, CpmResult};
pub use units::{DollarsPerMwh, Megawatts};
