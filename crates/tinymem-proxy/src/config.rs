//! Config loading: a TOML file overlaid on `EngineConfig`'s defaults.
//! Configuration loading proper (file discovery, env overrides, validation
//! beyond parsing) is out of scope for the core; this is the minimal loader
//! the CLI needs to hand the engine a config.

use anyhow::Context;
use std::path::Path;
use tinymem_core::EngineConfig;

pub fn load(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}
