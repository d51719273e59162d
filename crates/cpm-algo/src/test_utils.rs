//! Sample market used by docs, tests and `cpm demo`.
//!
//! Eight generators and three demand blocks. With elastic demand the market
//! clears 190 MW with Gas1 partially loaded at 80 $/MWh.

use cpm_core::{
    ClearingError, DemandBid, DemandTable, GeneratorBid, GeneratorTable, MarketPeriod,
};

pub fn worked_example_generator_bids() -> Vec<GeneratorBid> {
    vec![
        GeneratorBid::new("Gas1", 40.0, 80.0),
        GeneratorBid::new("Gas2", 25.0, 85.0),
        GeneratorBid::new("Coal1", 30.0, 70.0),
        GeneratorBid::new("Coal2", 30.0, 65.0),
        GeneratorBid::new("Biomass", 20.0, 40.0),
        GeneratorBid::new("Nuclear", 80.0, 20.0),
        GeneratorBid::new("Wind1", 20.0, 0.0),
        GeneratorBid::new("Wind2", 5.0, 0.0),
    ]
}

pub fn worked_example_demand_bids() -> Vec<DemandBid> {
    vec![
        DemandBid::new("Houses", 120.0, 120.0),
        DemandBid::new("Industry1", 50.0, 100.0),
        DemandBid::new("Industry2", 20.0, 80.0),
    ]
}

pub fn worked_example_generators() -> Result<GeneratorTable, ClearingError> {
    GeneratorTable::new(worked_example_generator_bids())
}

pub fn worked_example_demands() -> Result<DemandTable, ClearingError> {
    DemandTable::new(worked_example_demand_bids())
}

pub fn worked_example_period() -> Result<MarketPeriod, ClearingError> {
    Ok(MarketPeriod::new(
        0,
        worked_example_generators()?,
        worked_example_demands()?,
    ))
}
