// src/condition/registry.rs

//! Named predicate lookup.
//!
//! Predicates let the surrounding application register arbitrary (possibly
//! async) "should execute" logic under a stable name, so a job's condition
//! stays serializable: the config stores `{kind = "predicate", name = "..."}`
//! and the function itself lives in the registry handed to the engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::errors::Result;
use crate::handlers::JobContext;

/// A registered predicate: params from the condition plus the job context.
pub type PredicateFn =
    Arc<dyn Fn(Value, JobContext) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// Explicit predicate registry, passed into the engine at construction.
#[derive(Default, Clone)]
pub struct PredicateRegistry {
    predicates: HashMap<String, PredicateFn>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, predicate: PredicateFn) {
        self.predicates.insert(name.into(), predicate);
    }

    /// Convenience wrapper that boxes an async closure.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.register(name, Arc::new(move |params, ctx| Box::pin(f(params, ctx))));
    }

    pub fn get(&self, name: &str) -> Option<PredicateFn> {
        self.predicates.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(|s| s.as_str())
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("names", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}
