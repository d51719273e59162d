//! Generator and demand bid tables.
//!
//! Tables are built once per period from caller-supplied rows and are never
//! mutated afterwards. Construction validates every row and puts the table in
//! merit order:
//!
//! - [`GeneratorTable`]: ascending by bid price (cheapest first)
//! - [`DemandTable`]: descending by offer price (most willing first)
//!
//! Both sorts are stable, so rows with equal prices keep the order in which
//! the caller listed them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ClearingError;
use crate::units::{DollarsPerMwh, Megawatts};

/// One generating unit's offer to sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorBid {
    pub name: String,
    pub capacity: Megawatts,
    pub bid_price: DollarsPerMwh,
}

impl GeneratorBid {
    pub fn new(name: impl Into<String>, capacity_mw: f64, bid_price: f64) -> Self {
        Self {
            name: name.into(),
            capacity: Megawatts(capacity_mw),
            bid_price: DollarsPerMwh(bid_price),
        }
    }
}

/// One demand block's offer to buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandBid {
    pub name: String,
    pub load: Megawatts,
    pub offer_price: DollarsPerMwh,
}

impl DemandBid {
    pub fn new(name: impl Into<String>, load_mw: f64, offer_price: f64) -> Self {
        Self {
            name: name.into(),
            load: Megawatts(load_mw),
            offer_price: DollarsPerMwh(offer_price),
        }
    }
}

fn validate_row(
    table: &str,
    row: usize,
    name: &str,
    quantity: Megawatts,
    quantity_label: &str,
    price: DollarsPerMwh,
) -> Result<(), ClearingError> {
    if name.trim().is_empty() {
        return Err(ClearingError::InvalidInput(format!(
            "{table} row {row}: empty name"
        )));
    }
    if !quantity.is_finite() || quantity.value() < 0.0 {
        return Err(ClearingError::InvalidInput(format!(
            "{table} '{name}': {quantity_label} must be a finite non-negative number, got {}",
            quantity.value()
        )));
    }
    if !price.is_finite() {
        return Err(ClearingError::InvalidInput(format!(
            "{table} '{name}': price must be finite, got {}",
            price.value()
        )));
    }
    Ok(())
}

fn by_price(a: DollarsPerMwh, b: DollarsPerMwh) -> Ordering {
    a.value().partial_cmp(&b.value()).unwrap_or(Ordering::Equal)
}

/// Generators in merit order (ascending bid price).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorTable {
    bids: Vec<GeneratorBid>,
}

impl GeneratorTable {
    /// Validate the rows and sort them cheapest first.
    pub fn new(mut bids: Vec<GeneratorBid>) -> Result<Self, ClearingError> {
        if bids.is_empty() {
            return Err(ClearingError::InvalidInput(
                "generator table is empty".to_string(),
            ));
        }
        for (row, bid) in bids.iter().enumerate() {
            validate_row(
                "generator",
                row,
                &bid.name,
                bid.capacity,
                "capacity",
                bid.bid_price,
            )?;
        }
        bids.sort_by(|a, b| by_price(a.bid_price, b.bid_price));
        Ok(Self { bids })
    }

    pub fn bids(&self) -> &[GeneratorBid] {
        &self.bids
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeneratorBid> {
        self.bids.iter()
    }

    pub fn get(&self, index: usize) -> Option<&GeneratorBid> {
        self.bids.get(index)
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    /// Always false for a constructed table; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn total_capacity(&self) -> Megawatts {
        self.bids.iter().map(|b| b.capacity).sum()
    }
}

impl<'a> IntoIterator for &'a GeneratorTable {
    type Item = &'a GeneratorBid;
    type IntoIter = std::slice::Iter<'a, GeneratorBid>;

    fn into_iter(self) -> Self::IntoIter {
        self.bids.iter()
    }
}

/// Demand blocks in merit order (descending offer price).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandTable {
    bids: Vec<DemandBid>,
}

impl DemandTable {
    /// Validate the rows and sort them highest offer first.
    pub fn new(mut bids: Vec<DemandBid>) -> Result<Self, ClearingError> {
        if bids.is_empty() {
            return Err(ClearingError::InvalidInput(
                "demand table is empty".to_string(),
            ));
        }
        for (row, bid) in bids.iter().enumerate() {
            validate_row("demand", row, &bid.name, bid.load, "load", bid.offer_price)?;
        }
        bids.sort_by(|a, b| by_price(b.offer_price, a.offer_price));
        Ok(Self { bids })
    }

    pub fn bids(&self) -> &[DemandBid] {
        &self.bids
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DemandBid> {
        self.bids.iter()
    }

    pub fn get(&self, index: usize) -> Option<&DemandBid> {
        self.bids.get(index)
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn total_load(&self) -> Megawatts {
        self.bids.iter().map(|b| b.load).sum()
    }
}

impl<'a> IntoIterator for &'a DemandTable {
    type Item = &'a DemandBid;
    type IntoIter = std::slice::Iter<'a, DemandBid>;

    fn into_iter(self) -> Self::IntoIter {
        self.bids.iter()
    }
}

/// Inputs for clearing one market period (one hour).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPeriod {
    pub period: u32,
    pub generators: GeneratorTable,
    pub demands: DemandTable,
}

impl MarketPeriod {
    pub fn new(period: u32, generators: GeneratorTable, demands: DemandTable) -> Self {
        Self {
            period,
            generators,
            demands,
        }
    }
}
