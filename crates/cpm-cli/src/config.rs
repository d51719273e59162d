//! TOML configuration for the `cpm` tool.
//!
//! Every section and field has a default, so a partial file (or none at all)
//! is valid. Command-line flags override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cpm_algo::{DispatchEngine, LpSolverKind, SettlementRule, TieBreak};
use serde::{Deserialize, Serialize};

/// File picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "cpm.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CpmConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// LP backend: clarabel, good_lp, highs
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Solve time limit in seconds (0 = no limit)
    #[serde(default)]
    pub time_limit_seconds: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            time_limit_seconds: 0,
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_backend() -> String {
    LpSolverKind::default().as_str().to_string()
}

fn default_max_iterations() -> u32 {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Numerical tolerance for bound snapping and price comparisons
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Reject periods whose capacity cannot cover their load
    #[serde(default = "default_true")]
    pub adequacy_check: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            tie_break: TieBreak::default(),
            adequacy_check: true,
        }
    }
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SettlementConfig {
    #[serde(default)]
    pub interval_rule: SettlementRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl CpmConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load `explicit` if given, else `./cpm.toml` if it exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(&fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .parse()
            .with_context(|| format!("invalid log level '{}'", self.logging.level))
    }

    pub fn dispatch_engine(&self) -> Result<DispatchEngine> {
        let tolerance = self.dispatch.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            bail!("invalid dispatch tolerance {tolerance}; expected a finite value >= 0");
        }
        let solver: LpSolverKind = self.solver.backend.parse()?;
        let mut engine = DispatchEngine::new()
            .with_solver(solver)
            .with_max_iterations(self.solver.max_iterations)
            .with_tolerance(self.dispatch.tolerance)
            .with_tie_break(self.dispatch.tie_break)
            .with_adequacy_check(self.dispatch.adequacy_check);
        if self.solver.time_limit_seconds > 0 {
            engine = engine.with_time_limit(Duration::from_secs(self.solver.time_limit_seconds));
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_or_nan_tolerance() {
        let mut config = CpmConfig::default();
        config.dispatch.tolerance = -1e-6;
        let err = config.dispatch_engine().unwrap_err();
        assert!(err.to_string().contains("invalid dispatch tolerance"));

        config.dispatch.tolerance = f64::NAN;
        assert!(config.dispatch_engine().is_err());

        config.dispatch.tolerance = 0.0;
        assert!(config.dispatch_engine().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: CpmConfig = toml::from_str(
            r#"
            [dispatch]
            tie_break = "solver"

            [settlement]
            interval_rule = "high"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.tie_break, TieBreak::Solver);
        assert_eq!(config.dispatch.tolerance, 1e-6);
        assert!(config.dispatch.adequacy_check);
        assert_eq!(config.settlement.interval_rule, SettlementRule::High);
        assert_eq!(config.solver.backend, "clarabel");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cpm.toml");
        let mut config = CpmConfig::default();
        config.solver.time_limit_seconds = 30;

        config.save(&path).unwrap();
        assert_eq!(CpmConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = CpmConfig::default();
        config.solver.backend = "cplex".into();
        let err = config.dispatch_engine().unwrap_err();
        assert!(err.to_string().contains("unknown lp solver"));
    }

    #[test]
    fn engine_reflects_dispatch_section() {
        let mut config = CpmConfig::default();
        config.dispatch.tolerance = 1e-4;
        let engine = config.dispatch_engine().unwrap();
        assert_eq!(engine.tolerance(), 1e-4);
        assert_eq!(engine.solver_name(), "clarabel");
    }
}
