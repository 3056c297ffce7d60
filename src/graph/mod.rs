// src/graph/mod.rs

//! Job definitions and DAG structure.
//!
//! - [`job`] defines the immutable [`Job`] record and its retry policy.
//! - [`graph`] holds the adjacency structure plus graph validation
//!   (dangling references, self-dependencies, cycles).

pub mod graph;
pub mod job;

pub use graph::{JobGraph, validate_jobs};
pub use job::{Job, JobId, RetryPolicy};
