// src/config/loader.rs

//! Graph file IO.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

pub const DEFAULT_GRAPH_FILE: &str = "Gatedag.toml";

/// Default graph file path in the current working directory.
pub fn default_graph_path() -> PathBuf {
    PathBuf::from(DEFAULT_GRAPH_FILE)
}

/// Parse a graph file without validating it.
pub fn load_from_path(path: &Path) -> Result<RawGraphFile> {
    debug!(path = %path.display(), "loading graph file");
    let contents = std::fs::read_to_string(path)?;
    let raw: RawGraphFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Parse and validate a graph file in one step.
pub fn load_and_validate(path: &Path) -> Result<GraphFile> {
    GraphFile::try_from(load_from_path(path)?)
}
