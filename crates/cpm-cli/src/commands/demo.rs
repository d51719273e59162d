use anyhow::Result;
use cpm_algo::test_utils::worked_example_period;
use cpm_cli::{CpmConfig, RunArgs};

use crate::commands::clear::run_periods;

pub fn handle(run: &RunArgs, config: &CpmConfig) -> Result<()> {
    let period = worked_example_period()?;
    run_periods(std::slice::from_ref(&period), run, config)
}
