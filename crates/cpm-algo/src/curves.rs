//! Supply/demand step curves for plotting.
//!
//! The supply curve is a capacity-weighted step per generator in merit
//! order; the demand curve is a load-weighted step per demand block. The
//! result carries the clearing annotation and axis limits so an external
//! plotter can draw the market chart without redoing any market logic.

use cpm_core::{ClearingPrice, DemandTable, DispatchResult, GeneratorTable};
use serde::Serialize;

/// Headroom added above the highest price on the y axis ($/MWh)
const PRICE_AXIS_MARGIN: f64 = 15.0;
/// Headroom added after total load on the x axis (MW)
const QUANTITY_AXIS_MARGIN: f64 = 5.0;

/// One horizontal step: `[from_mw, to_mw)` at `price`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveStep {
    pub name: String,
    pub from_mw: f64,
    pub to_mw: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisLimits {
    pub x_max: f64,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyDemandCurves {
    pub supply: Vec<CurveStep>,
    pub demand: Vec<CurveStep>,
    pub clearing_price: ClearingPrice,
    pub cleared_quantity: f64,
    pub axis: AxisLimits,
    pub annotation: String,
}

fn steps<'a>(rows: impl Iterator<Item = (&'a str, f64, f64)>) -> Vec<CurveStep> {
    let mut x = 0.0;
    rows.map(|(name, width, price)| {
        let step = CurveStep {
            name: name.to_string(),
            from_mw: x,
            to_mw: x + width,
            price,
        };
        x += width;
        step
    })
    .collect()
}

impl SupplyDemandCurves {
    pub fn build(
        generators: &GeneratorTable,
        demands: &DemandTable,
        dispatch: &DispatchResult,
        clearing_price: ClearingPrice,
    ) -> Self {
        let supply = steps(
            generators
                .iter()
                .map(|g| (g.name.as_str(), g.capacity.value(), g.bid_price.value())),
        );
        let demand = steps(
            demands
                .iter()
                .map(|d| (d.name.as_str(), d.load.value(), d.offer_price.value())),
        );

        let max_bid = generators
            .iter()
            .map(|g| g.bid_price.value())
            .fold(f64::NEG_INFINITY, f64::max);
        let max_offer = demands
            .iter()
            .map(|d| d.offer_price.value())
            .fold(f64::NEG_INFINITY, f64::max);
        let axis = AxisLimits {
            x_max: generators
                .total_capacity()
                .value()
                .max(demands.total_load().value() + QUANTITY_AXIS_MARGIN),
            y_max: max_bid.max(max_offer) + PRICE_AXIS_MARGIN,
        };

        let cleared_quantity = dispatch.total_consumption();
        let annotation = format!(
            "Electricity price: {}\nQuantity: {} MW",
            clearing_price, cleared_quantity
        );

        Self {
            supply,
            demand,
            clearing_price,
            cleared_quantity,
            axis,
            annotation,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpm_core::{DemandBid, GeneratorBid};

    #[test]
    fn test_steps_are_contiguous_and_sorted() {
        let generators = GeneratorTable::new(vec![
            GeneratorBid::new("Gas", 40.0, 80.0),
            GeneratorBid::new("Wind", 20.0, 0.0),
        ])
        .unwrap();
        let demands = DemandTable::new(vec![
            DemandBid::new("Industry", 20.0, 80.0),
            DemandBid::new("Houses", 30.0, 120.0),
        ])
        .unwrap();
        let dispatch = DispatchResult {
            generation: vec![20.0, 30.0],
            consumption: vec![30.0, 20.0],
            welfare: 0.0,
            solver: "test".into(),
            iterations: 0,
            solve_time_ms: 0,
        };

        let curves =
            SupplyDemandCurves::build(&generators, &demands, &dispatch, ClearingPrice::Single(80.0));

        assert_eq!(curves.supply[0].name, "Wind");
        assert_eq!(curves.supply[1].from_mw, 20.0);
        assert_eq!(curves.supply[1].to_mw, 60.0);
        assert_eq!(curves.demand[0].price, 120.0);
        assert_eq!(curves.demand[1].to_mw, 50.0);
        assert_eq!(curves.cleared_quantity, 50.0);
        assert_eq!(curves.axis, AxisLimits { x_max: 60.0, y_max: 135.0 });
        assert!(curves.annotation.contains("80 $/MWh"));

        let json = curves.to_json().unwrap();
        assert!(json.contains("\"clearing_price\": 80.0"));
    }
}
