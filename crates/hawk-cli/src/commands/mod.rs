//! Command implementations
//!
//! Each command writes to the given output so it can be exercised without a
//! terminal.

pub mod config;
pub mod policy;

use anyhow::{Context, Result};
use hawk_core::HawkConfig;
use std::path::Path;

/// Load configuration from an optional file plus `HAWK_*` environment overrides
pub fn load_config(path: Option<&Path>) -> Result<HawkConfig> {
    let config = HawkConfig::load(path).with_context(|| match path {
        Some(path) => format!("loading configuration from {}", path.display()),
        None => "loading default configuration".to_string(),
    })?;
    tracing::debug!(file = ?path, "configuration ready");
    Ok(config)
}
