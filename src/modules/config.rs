use std::env;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MAX_DEPTH: usize = 1024;
pub const MAX_DEPTH_ENV: &str = "RHOEXPR_MAX_DEPTH";

/// Knobs shared by every fold and map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
  /// Nesting level (expressions, propositions and trace nodes) past which a traversal gives up.
  pub max_depth: usize,
  /// Reject map visitors that return a node of a different kind than they were given.
  pub check_kinds: bool,
}

impl Default for TraversalConfig {
  fn default() -> Self {
    TraversalConfig { max_depth: DEFAULT_MAX_DEPTH, check_kinds: true }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("malformed traversal config: {0}")]
  Json(#[from] serde_json::Error),

  #[error("{var} must be a positive integer, got `{value}`")]
  BadEnv { var: &'static str, value: String },
}

impl TraversalConfig {
  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    let config: TraversalConfig = serde_json::from_str(text)?;
    debug!("loaded traversal config {:?}", config);
    Ok(config)
  }

  /// Defaults, with `max_depth` taken from `RHOEXPR_MAX_DEPTH` when set.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = TraversalConfig::default();
    if let Ok(value) = env::var(MAX_DEPTH_ENV) {
      config.max_depth = match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => return Err(ConfigError::BadEnv { var: MAX_DEPTH_ENV, value }),
      };
      debug!("max traversal depth set to {} from {}", config.max_depth, MAX_DEPTH_ENV);
    }
    Ok(config)
  }

  pub fn with_max_depth(mut self, max_depth: usize) -> Self {
    self.max_depth = max_depth;
    self
  }

  pub fn with_kind_checks(mut self, check_kinds: bool) -> Self {
    self.check_kinds = check_kinds;
    self
  }
}
