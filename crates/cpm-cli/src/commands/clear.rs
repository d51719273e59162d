use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use cpm_algo::{clear_periods, io as tables, SettlementRule, SupplyDemandCurves, TieBreak};
use cpm_core::MarketPeriod;
use cpm_cli::{CpmConfig, OutputFormat, RunArgs};
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::commands::report::{self, PeriodReport};

/// Curves of one period, tagged with its id for the plotter.
#[derive(Serialize)]
struct PeriodCurves {
    period: u32,
    #[serde(flatten)]
    curves: SupplyDemandCurves,
}

pub fn handle(generators: &Path, demands: &Path, run: &RunArgs, config: &CpmConfig) -> Result<()> {
    let periods = tables::load_market(generators, demands).with_context(|| {
        format!(
            "loading market from {} and {}",
            generators.display(),
            demands.display()
        )
    })?;
    info!(periods = periods.len(), "loaded market");
    run_periods(&periods, run, config)
}

/// Apply command-line overrides on top of the file configuration.
pub fn effective_config(run: &RunArgs, config: &CpmConfig) -> Result<CpmConfig> {
    let mut config = config.clone();
    if let Some(solver) = &run.solver {
        config.solver.backend = solver.clone();
    }
    if let Some(tie_break) = &run.tie_break {
        config.dispatch.tie_break = tie_break.parse::<TieBreak>()?;
    }
    if let Some(rule) = &run.interval_rule {
        config.settlement.interval_rule = rule.parse::<SettlementRule>()?;
    }
    Ok(config)
}

fn configure_threads(requested: &str) -> Result<()> {
    let count = if requested.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        match requested.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => bail!("invalid thread count '{requested}'; use \"auto\" or a positive number"),
        }
    };
    // The global pool can only be installed once per process.
    if ThreadPoolBuilder::new().num_threads(count).build_global().is_ok() {
        debug!(threads = count, "configured worker pool");
    }
    Ok(())
}

pub fn run_periods(periods: &[MarketPeriod], run: &RunArgs, config: &CpmConfig) -> Result<()> {
    configure_threads(&run.threads)?;
    let config = effective_config(run, config)?;
    let engine = config.dispatch_engine()?;
    debug!(?engine, "dispatch engine ready");

    let results = clear_periods(&engine, periods);
    let validate = run.validate.then_some(config.dispatch.tolerance);

    let reports: Vec<PeriodReport> = periods
        .iter()
        .zip(&results)
        .map(|(period, (_, result))| {
            PeriodReport::build(period, result, config.settlement.interval_rule, validate)
        })
        .collect();

    if let Some(path) = &run.curves {
        let curves: Vec<PeriodCurves> = periods
            .iter()
            .zip(&results)
            .filter_map(|(period, (_, result))| {
                let clearing = result.as_ref().ok()?;
                Some(PeriodCurves {
                    period: period.period,
                    curves: SupplyDemandCurves::build(
                        &period.generators,
                        &period.demands,
                        &clearing.dispatch,
                        clearing.price,
                    ),
                })
            })
            .collect();
        write_curves(path, &curves)?;
        info!(path = %path.display(), periods = curves.len(), "wrote supply/demand curves");
    }

    let stdout = io::stdout();
    match run.format {
        OutputFormat::Table => report::write_tables(stdout.lock(), periods, &reports)?,
        OutputFormat::Json => report::write_json(stdout.lock(), &reports)?,
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        bail!("{failed} of {} periods failed to clear", reports.len());
    }
    let invalid = reports
        .iter()
        .filter_map(|r| r.clearing.as_ref()?.validation.as_ref())
        .filter(|v| !v.passed)
        .count();
    if invalid > 0 {
        bail!("{invalid} periods failed validation");
    }
    Ok(())
}

fn write_curves(path: &Path, curves: &[PeriodCurves]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, curves)
        .with_context(|| format!("writing curves to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
