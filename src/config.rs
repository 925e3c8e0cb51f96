use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::component::GraphFnOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Assembly-wide settings. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Options used by `add_graph_fn` when none are given.
    pub graph_fn: GraphFnOptions,
    /// Overrides the batch rank of every space attached to an input socket.
    pub add_batch_rank: Option<bool>,
    /// Upper bound on propagation work items per assembly call.
    pub max_propagation_steps: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            graph_fn: GraphFnOptions::default(),
            add_batch_rank: None,
            max_propagation_steps: 100_000,
        }
    }
}

impl AssemblyConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::debug!("Loaded assembly config: {config:?}");
        Ok(config)
    }
}
