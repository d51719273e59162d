//! Per-period reports and their table/JSON renderings.

use std::io::Write;

use anyhow::Result;
use cpm_algo::{
    compute_dispatch_violations, merit_order_dispatch, settle, DispatchViolations, MarketClearing,
    PriceOutcome, Settlement, SettlementRule, WelfareGap,
};
use cpm_core::{ClearingError, ClearingPrice, MarketPeriod};
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Debug, Serialize)]
pub struct PeriodReport {
    pub period: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearing: Option<ClearedPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

#[derive(Debug, Serialize)]
pub struct ClearedPeriod {
    pub price: ClearingPrice,
    pub outcome: PriceOutcome,
    pub price_setter: Option<String>,
    pub cleared_quantity: f64,
    pub welfare: f64,
    pub solver: String,
    pub iterations: u32,
    pub solve_time_ms: u128,
    pub settlement: Settlement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub violations: DispatchViolations,
    /// LP welfare against the closed-form merit-order walk
    pub reference: WelfareGap,
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
}

impl PeriodReport {
    pub fn build(
        period: &MarketPeriod,
        result: &Result<MarketClearing, ClearingError>,
        rule: SettlementRule,
        validate: Option<f64>,
    ) -> Self {
        match result {
            Ok(clearing) => Self {
                period: period.period,
                clearing: Some(ClearedPeriod::build(period, clearing, rule, validate)),
                error: None,
            },
            Err(e) => Self {
                period: period.period,
                clearing: None,
                error: Some(ErrorReport {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl ClearedPeriod {
    fn build(
        period: &MarketPeriod,
        clearing: &MarketClearing,
        rule: SettlementRule,
        validate: Option<f64>,
    ) -> Self {
        let dispatch = &clearing.dispatch;
        let validation = validate.map(|tolerance| {
            let violations =
                compute_dispatch_violations(&period.generators, &period.demands, dispatch, tolerance);
            let reference = merit_order_dispatch(&period.generators, &period.demands);
            let gap = WelfareGap::new(dispatch.welfare, reference.welfare);
            let welfare_ok = gap.gap_abs <= tolerance * (1.0 + reference.welfare.abs());
            ValidationReport {
                passed: violations.within_tolerance(tolerance) && welfare_ok,
                violations,
                reference: gap,
            }
        });

        Self {
            price: clearing.price,
            outcome: clearing.outcome,
            price_setter: clearing.price_setter(&period.generators).map(str::to_string),
            cleared_quantity: clearing.cleared_quantity,
            welfare: dispatch.welfare,
            solver: dispatch.solver.clone(),
            iterations: dispatch.iterations,
            solve_time_ms: dispatch.solve_time_ms,
            settlement: settle(
                &period.generators,
                &period.demands,
                dispatch,
                &clearing.price,
                rule,
            ),
            validation,
        }
    }
}

fn describe_outcome(period: &MarketPeriod, cleared: &ClearedPeriod) -> String {
    let name = |i: usize| {
        period
            .generators
            .get(i)
            .map(|g| g.name.as_str())
            .unwrap_or("?")
    };
    match cleared.outcome {
        PriceOutcome::Marginal { index, .. } => format!("set by partially loaded {}", name(index)),
        PriceOutcome::IntervalAmbiguous { index, .. } => format!(
            "indeterminate between saturated {} and idle {}",
            name(index),
            name(index + 1)
        ),
        PriceOutcome::SaturatedTerminal { index, .. } => format!("set by saturated {}", name(index)),
    }
}

pub fn write_json<W: Write>(out: W, reports: &[PeriodReport]) -> Result<()> {
    let mut out = out;
    serde_json::to_writer_pretty(&mut out, reports)
        .map_err(|err| anyhow::anyhow!("serializing clearing report to JSON: {err}"))?;
    writeln!(out)?;
    Ok(())
}

pub fn write_tables<W: Write>(
    out: W,
    periods: &[MarketPeriod],
    reports: &[PeriodReport],
) -> Result<()> {
    let mut writer = TabWriter::new(out);
    for (period, report) in periods.iter().zip(reports) {
        let Some(cleared) = &report.clearing else {
            if let Some(err) = &report.error {
                writeln!(writer, "Period {}: failed ({})", report.period, err.kind)?;
                writeln!(writer, "  {}", err.message)?;
                writeln!(writer)?;
            }
            continue;
        };

        writeln!(
            writer,
            "Period {}: cleared {:.2} MW at {} ({})",
            report.period,
            cleared.cleared_quantity,
            cleared.price,
            describe_outcome(period, cleared)
        )?;
        writeln!(writer)?;

        writeln!(
            writer,
            "GENERATOR\tCAPACITY (MW)\tBID ($/MWh)\tDISPATCH (MW)\tREVENUE ($)\tPROFIT ($)"
        )?;
        for (bid, row) in period.generators.iter().zip(&cleared.settlement.generators) {
            writeln!(
                writer,
                "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
                bid.name,
                bid.capacity.value(),
                bid.bid_price.value(),
                row.dispatch_mw,
                row.revenue,
                row.profit
            )?;
        }
        writeln!(writer)?;

        writeln!(
            writer,
            "DEMAND\tLOAD (MW)\tOFFER ($/MWh)\tSERVED (MW)\tPAYMENT ($)\tSURPLUS ($)"
        )?;
        for (bid, row) in period.demands.iter().zip(&cleared.settlement.demands) {
            writeln!(
                writer,
                "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
                bid.name,
                bid.load.value(),
                bid.offer_price.value(),
                row.served_mw,
                row.payment,
                row.surplus
            )?;
        }
        writeln!(writer)?;

        let s = &cleared.settlement;
        writeln!(
            writer,
            "Welfare: {:.2} $ (producers {:.2}, consumers {:.2}); settled at {:.2} $/MWh ({})",
            cleared.welfare,
            s.producer_surplus,
            s.consumer_surplus,
            s.price,
            s.rule
        )?;
        writeln!(
            writer,
            "Solver: {} ({} iterations, {} ms)",
            cleared.solver, cleared.iterations, cleared.solve_time_ms
        )?;
        if let Some(v) = &cleared.validation {
            if v.passed {
                writeln!(writer, "Validation: ok")?;
            } else {
                writeln!(
                    writer,
                    "Validation: FAILED (residual {:.3e} MW, bound excess {:.3e}/{:.3e} MW, merit breaches {}/{}, welfare gap {:.3e})",
                    v.violations.balance_residual,
                    v.violations.max_generation_bound_violation,
                    v.violations.max_consumption_bound_violation,
                    v.violations.generator_merit_breaches,
                    v.violations.demand_merit_breaches,
                    v.reference.gap_abs
                )?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpm_algo::test_utils::worked_example_period;
    use cpm_algo::{clear_period, DispatchEngine};

    #[test]
    fn table_names_price_setter() {
        let period = worked_example_period().unwrap();
        let result = clear_period(&DispatchEngine::new(), &period);
        let report = PeriodReport::build(&period, &result, SettlementRule::Midpoint, Some(1e-6));

        let mut buf = Vec::new();
        write_tables(&mut buf, std::slice::from_ref(&period), &[report]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Period 0: cleared 190.00 MW at 80 $/MWh"));
        assert!(text.contains("set by partially loaded Gas1"));
        assert!(text.contains("Validation: ok"));
    }

    #[test]
    fn failed_period_reports_kind() {
        let period = worked_example_period().unwrap();
        let result = Err(ClearingError::DispatchInfeasible("no capacity".into()));
        let report = PeriodReport::build(&period, &result, SettlementRule::Midpoint, None);
        assert!(!report.is_success());

        let mut buf = Vec::new();
        write_json(&mut buf, &[report]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["error"]["kind"], "dispatch_infeasible");
        assert!(value[0].get("clearing").is_none());
    }
}
