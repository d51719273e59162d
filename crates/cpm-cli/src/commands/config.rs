use std::path::Path;

use anyhow::{bail, Result};
use cpm_cli::{ConfigCommands, CpmConfig};

pub fn handle(command: &ConfigCommands, config: &CpmConfig) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { path, force } => init(path, *force),
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    CpmConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
