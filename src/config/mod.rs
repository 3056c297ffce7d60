// src/config/mod.rs

//! TOML graph file loading and validation.
//!
//! Parsing and validation are separate stages: [`model::RawGraphFile`]
//! is whatever serde accepted from disk, [`model::GraphFile`] is a file
//! whose job graph passed structural validation. The `TryFrom` gate
//! between them is the only way to get a `GraphFile`, so downstream code
//! never sees an invalid graph.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_graph_path, load_and_validate, load_from_path};
pub use model::{ExecutionSection, GraphFile, JobEntry, RawGraphFile};
