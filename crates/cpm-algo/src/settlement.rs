//! Uniform-price settlement of a cleared period.
//!
//! Every dispatched generator is paid the clearing price and every served
//! demand block pays it. When the price is an interval, [`SettlementRule`]
//! picks the point inside it.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use cpm_core::{ClearingPrice, DemandTable, DispatchResult, GeneratorTable};
use serde::{Deserialize, Serialize};

/// Point of an interval price used for settlement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementRule {
    Low,
    #[default]
    Midpoint,
    High,
}

impl SettlementRule {
    pub fn price(&self, clearing: &ClearingPrice) -> f64 {
        match self {
            SettlementRule::Low => clearing.low(),
            SettlementRule::Midpoint => clearing.midpoint(),
            SettlementRule::High => clearing.high(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementRule::Low => "low",
            SettlementRule::Midpoint => "midpoint",
            SettlementRule::High => "high",
        }
    }
}

impl fmt::Display for SettlementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(SettlementRule::Low),
            "midpoint" | "mid" => Ok(SettlementRule::Midpoint),
            "high" => Ok(SettlementRule::High),
            other => Err(anyhow!(
                "unknown settlement rule '{}'; supported values: low, midpoint, high",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorSettlement {
    pub name: String,
    pub dispatch_mw: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemandSettlement {
    pub name: String,
    pub served_mw: f64,
    pub payment: f64,
    /// Willingness to pay for the served quantity
    pub value: f64,
    pub surplus: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    /// Price actually used ($/MWh)
    pub price: f64,
    pub rule: SettlementRule,
    pub generators: Vec<GeneratorSettlement>,
    pub demands: Vec<DemandSettlement>,
    pub producer_surplus: f64,
    pub consumer_surplus: f64,
    pub total_revenue: f64,
    pub total_payment: f64,
}

impl Settlement {
    /// Producer plus consumer surplus; equals dispatch welfare when the
    /// dispatch is balanced.
    pub fn total_surplus(&self) -> f64 {
        self.producer_surplus + self.consumer_surplus
    }
}

pub fn settle(
    generators: &GeneratorTable,
    demands: &DemandTable,
    dispatch: &DispatchResult,
    clearing: &ClearingPrice,
    rule: SettlementRule,
) -> Settlement {
    let price = rule.price(clearing);

    let generator_rows: Vec<GeneratorSettlement> = generators
        .iter()
        .zip(&dispatch.generation)
        .map(|(g, &p)| {
            let revenue = price * p;
            let cost = g.bid_price.value() * p;
            GeneratorSettlement {
                name: g.name.clone(),
                dispatch_mw: p,
                revenue,
                cost,
                profit: revenue - cost,
            }
        })
        .collect();

    let demand_rows: Vec<DemandSettlement> = demands
        .iter()
        .zip(&dispatch.consumption)
        .map(|(d, &c)| {
            let payment = price * c;
            let value = d.offer_price.value() * c;
            DemandSettlement {
                name: d.name.clone(),
                served_mw: c,
                payment,
                value,
                surplus: value - payment,
            }
        })
        .collect();

    Settlement {
        price,
        rule,
        producer_surplus: generator_rows.iter().map(|r| r.profit).sum(),
        consumer_surplus: demand_rows.iter().map(|r| r.surplus).sum(),
        total_revenue: generator_rows.iter().map(|r| r.revenue).sum(),
        total_payment: demand_rows.iter().map(|r| r.payment).sum(),
        generators: generator_rows,
        demands: demand_rows,
    }
}
