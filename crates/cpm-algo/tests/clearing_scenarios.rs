//! End-to-end dispatch + price resolution on hand-built markets

use cpm_algo::test_utils::{worked_example_demands, worked_example_generators};
use cpm_algo::{clear, DispatchEngine, PriceOutcome, TieBreak};
use cpm_core::{ClearingError, ClearingPrice, DemandBid, DemandTable, GeneratorBid, GeneratorTable};

const TOL: f64 = 1e-6;

fn generators(rows: &[(&str, f64, f64)]) -> GeneratorTable {
    GeneratorTable::new(
        rows.iter()
            .map(|&(name, cap, bid)| GeneratorBid::new(name, cap, bid))
            .collect(),
    )
    .unwrap()
}

fn demands(rows: &[(&str, f64, f64)]) -> DemandTable {
    DemandTable::new(
        rows.iter()
            .map(|&(name, load, offer)| DemandBid::new(name, load, offer))
            .collect(),
    )
    .unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOL,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn partially_loaded_unit_sets_price() {
    let gens = generators(&[("G1", 40.0, 80.0), ("G2", 25.0, 85.0)]);
    let dems = demands(&[("Load", 50.0, 100.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_close(clearing.dispatch.generation[0], 40.0);
    assert_close(clearing.dispatch.generation[1], 10.0);
    assert_eq!(
        clearing.outcome,
        PriceOutcome::Marginal {
            index: 1,
            price: 85.0
        }
    );
    assert_eq!(clearing.price, ClearingPrice::Single(85.0));
}

#[test]
fn full_saturation_prices_at_last_unit() {
    let gens = generators(&[("A", 30.0, 10.0), ("B", 20.0, 40.0), ("C", 10.0, 60.0)]);
    let dems = demands(&[("Town", 45.0, 200.0), ("Plant", 15.0, 150.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_close(clearing.cleared_quantity, 60.0);
    assert_eq!(
        clearing.outcome,
        PriceOutcome::SaturatedTerminal {
            index: 2,
            price: 60.0
        }
    );
    assert_eq!(clearing.price, ClearingPrice::Single(60.0));
}

#[test]
fn saturated_unit_before_idle_unit_gives_interval() {
    let gens = generators(&[("Base", 10.0, 10.0), ("Peak", 10.0, 50.0)]);
    let dems = demands(&[("Town", 10.0, 100.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_eq!(clearing.dispatch.generation, vec![10.0, 0.0]);
    assert_eq!(clearing.price, ClearingPrice::Interval([10.0, 50.0]));
    assert!(clearing.price.is_interval());
}

#[test]
fn small_demand_uses_only_cheapest_unit() {
    let gens = generators(&[("Cheap", 100.0, 10.0), ("Dear", 50.0, 30.0)]);
    let dems = demands(&[("Town", 40.0, 100.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_close(clearing.dispatch.generation[0], 40.0);
    assert_eq!(clearing.dispatch.generation[1], 0.0);
    assert_eq!(clearing.price, ClearingPrice::Single(10.0));
}

#[test]
fn worked_example_clears_all_demand_at_gas1_bid() {
    let gens = worked_example_generators().unwrap();
    let dems = worked_example_demands().unwrap();

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_close(clearing.cleared_quantity, 190.0);
    assert_close(clearing.dispatch.total_generation(), 190.0);
    assert_eq!(clearing.price, ClearingPrice::Single(80.0));
    assert_eq!(clearing.price_setter(&gens), Some("Gas1"));

    // Everything up to Coal1 runs flat out, Gas1 carries the last 5 MW.
    let expected = [20.0, 5.0, 80.0, 20.0, 30.0, 30.0, 5.0, 0.0];
    for (actual, expected) in clearing.dispatch.generation.iter().zip(expected) {
        assert_close(*actual, expected);
    }
}

#[test]
fn inadequate_capacity_is_infeasible() {
    let gens = generators(&[("A", 50.0, 10.0), ("B", 40.0, 20.0)]);
    let dems = demands(&[("Town", 100.0, 100.0)]);

    let err = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap_err();
    assert!(matches!(err, ClearingError::DispatchInfeasible(_)));
    assert_eq!(err.kind(), "dispatch_infeasible");
}

#[test]
fn without_adequacy_check_demand_is_curtailed() {
    let gens = generators(&[("A", 50.0, 10.0), ("B", 40.0, 20.0)]);
    let dems = demands(&[("Town", 100.0, 100.0)]);
    let engine = DispatchEngine::new().with_adequacy_check(false);

    let clearing = clear(&engine, 0, &gens, &dems).unwrap();
    assert_close(clearing.cleared_quantity, 90.0);
    assert_eq!(clearing.price, ClearingPrice::Single(20.0));
}

#[test]
fn no_profitable_trade_fails_price_resolution() {
    let gens = generators(&[("Dear", 50.0, 90.0)]);
    let dems = demands(&[("Thrifty", 20.0, 30.0)]);
    let engine = DispatchEngine::new();

    let dispatch = engine.dispatch(&gens, &dems).unwrap();
    assert_eq!(dispatch.total_generation(), 0.0);

    let err = clear(&engine, 0, &gens, &dems).unwrap_err();
    assert!(matches!(err, ClearingError::PriceResolutionFailed(_)));
}

#[test]
fn tied_generators_fill_in_table_order() {
    let gens = generators(&[("First", 10.0, 20.0), ("Second", 10.0, 20.0)]);
    let dems = demands(&[("Town", 15.0, 100.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_eq!(gens.bids()[0].name, "First");
    assert_close(clearing.dispatch.generation[0], 10.0);
    assert_close(clearing.dispatch.generation[1], 5.0);
    assert_eq!(clearing.price, ClearingPrice::Single(20.0));
}

#[test]
fn solver_tie_break_still_balances() {
    let gens = generators(&[("First", 10.0, 20.0), ("Second", 10.0, 20.0)]);
    let dems = demands(&[("Town", 15.0, 100.0)]);
    let engine = DispatchEngine::new().with_tie_break(TieBreak::Solver);

    let dispatch = engine.dispatch(&gens, &dems).unwrap();
    assert_close(dispatch.total_generation(), 15.0);
    assert!(dispatch.balance_residual().abs() < TOL);
}

#[test]
fn zero_bid_units_dispatch_first() {
    let gens = generators(&[("Gas", 50.0, 60.0), ("Solar", 30.0, 0.0), ("Wind", 30.0, 0.0)]);
    let dems = demands(&[("Town", 70.0, 100.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    assert_eq!(gens.bids()[2].name, "Gas");
    assert_close(clearing.dispatch.generation[0], 30.0);
    assert_close(clearing.dispatch.generation[1], 30.0);
    assert_close(clearing.dispatch.generation[2], 10.0);
    assert_eq!(clearing.price, ClearingPrice::Single(60.0));
}

#[test]
fn zero_capacity_unit_does_not_hide_the_marginal_unit() {
    let gens = generators(&[("A", 10.0, 5.0), ("Mothballed", 0.0, 7.0), ("B", 40.0, 9.0)]);
    let dems = demands(&[("Town", 15.0, 100.0)]);

    let clearing = clear(&DispatchEngine::new(), 0, &gens, &dems).unwrap();

    for (actual, expected) in clearing.dispatch.generation.iter().zip([10.0, 0.0, 5.0]) {
        assert_close(*actual, expected);
    }
    assert_eq!(
        clearing.outcome,
        PriceOutcome::Marginal {
            index: 2,
            price: 9.0
        }
    );
    assert_eq!(clearing.price, ClearingPrice::Single(9.0));
}

#[test]
fn invalid_tolerance_is_rejected_before_solving() {
    let gens = generators(&[("A", 10.0, 5.0), ("B", 40.0, 9.0)]);
    let dems = demands(&[("Town", 15.0, 100.0)]);

    for tolerance in [-1e-6, f64::NAN, f64::INFINITY] {
        let engine = DispatchEngine::new().with_tolerance(tolerance);
        let err = clear(&engine, 0, &gens, &dems).unwrap_err();
        assert!(
            matches!(err, ClearingError::InvalidInput(_)),
            "tolerance {tolerance}: {err:?}"
        );
    }
}
