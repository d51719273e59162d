//! Closed-form merit-order dispatch
//!
//! Walks generators cheapest first against demands most willing first and
//! trades while the demand's offer covers the generator's bid. On a
//! copper-plate market this lands on the maximum-volume optimum of the
//! welfare LP, so it serves as an independent reference for spot-checking
//! the solver path.

use cpm_core::{DemandTable, DispatchResult, GeneratorTable};
use web_time::Instant;

use crate::dispatch::welfare_of;

/// Greedy merit-order dispatch (no solver).
pub fn merit_order_dispatch(generators: &GeneratorTable, demands: &DemandTable) -> DispatchResult {
    let start = Instant::now();
    let gens = generators.bids();
    let dems = demands.bids();

    let mut generation = vec![0.0; gens.len()];
    let mut consumption = vec![0.0; dems.len()];
    let (mut i, mut j) = (0, 0);
    let mut steps = 0u32;

    while i < gens.len() && j < dems.len() {
        if dems[j].offer_price.value() < gens[i].bid_price.value() {
            break;
        }

        let headroom = gens[i].capacity.value() - generation[i];
        let unserved = dems[j].load.value() - consumption[j];
        if headroom <= 0.0 {
            i += 1;
            continue;
        }
        if unserved <= 0.0 {
            j += 1;
            continue;
        }

        let traded = headroom.min(unserved);
        generation[i] += traded;
        consumption[j] += traded;
        steps += 1;
    }

    let welfare = welfare_of(generators, demands, &generation, &consumption);
    DispatchResult {
        generation,
        consumption,
        welfare,
        solver: "merit-order".to_string(),
        iterations: steps,
        solve_time_ms: start.elapsed().as_millis(),
    }
}
