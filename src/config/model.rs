// src/config/model.rs

//! Graph file data model.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::condition::Condition;
use crate::graph::{Job, RetryPolicy};

/// Top-level `[execution]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    pub name: String,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_max_parallel() -> usize {
    8
}

/// One `[job.<id>]` table.
///
/// The table key is the job id; `BTreeMap` keeps file order deterministic
/// regardless of declaration order.
#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    #[serde(rename = "type", default = "default_job_type")]
    pub job_type: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Handler payload, passed through opaquely.
    #[serde(default = "empty_table")]
    pub config: toml::Value,

    #[serde(default)]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub retry: Option<RetryPolicy>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_job_type() -> String {
    "command".to_string()
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::Table::new())
}

/// Graph file exactly as deserialized, before any validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGraphFile {
    pub execution: ExecutionSection,

    #[serde(default)]
    pub job: BTreeMap<String, JobEntry>,
}

/// A graph file whose job graph passed validation.
///
/// Constructed only through `TryFrom<RawGraphFile>` (see
/// [`crate::config::validate`]) or [`GraphFile::new_unchecked`] in tests.
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub execution: ExecutionSection,
    pub job: BTreeMap<String, JobEntry>,
}

impl GraphFile {
    /// Bypass validation. Only for constructing fixtures in tests.
    pub fn new_unchecked(execution: ExecutionSection, job: BTreeMap<String, JobEntry>) -> Self {
        Self { execution, job }
    }

    /// Materialize engine jobs from the file entries.
    pub fn jobs(&self) -> Vec<Job> {
        self.job
            .iter()
            .map(|(id, entry)| Job {
                id: id.clone(),
                name: entry.name.clone().unwrap_or_else(|| id.clone()),
                job_type: entry.job_type.clone(),
                depends_on: entry.depends_on.clone(),
                config: toml_to_json(entry.config.clone()),
                condition: entry.condition.clone(),
                retry: entry.retry,
                timeout_ms: entry.timeout_ms,
            })
            .collect()
    }
}

/// TOML payloads cross into the engine as JSON values; handlers only
/// ever see `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::Value::from(i),
        toml::Value::Float(f) => serde_json::Value::from(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
