//! `config`: show where the configuration lives and what is in effect.

use anyhow::Result;
use lehrpool_core::config::LehrpoolConfig;

pub fn cmd_config(config: &LehrpoolConfig) -> Result<()> {
    println!("# {}", LehrpoolConfig::file_path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}
