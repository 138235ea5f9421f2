use anyhow::Context;
use slackduty_core::Config;
use std::path::{Path, PathBuf};

/// Resolve the config file location.
///
/// Priority:
/// 1. `--config` flag / `SLACKDUTY_CONFIG` env var (passed in as `explicit`)
/// 2. `~/.slackduty/config.yml`
pub fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    Config::default_path().context("cannot locate the default config file")
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config from {}", path.display()))
}
