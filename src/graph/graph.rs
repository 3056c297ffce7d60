// src/graph/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{GatedagError, Result};
use crate::graph::job::{Job, JobId};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct GraphNode {
    deps: Vec<JobId>,
    dependents: Vec<JobId>,
}

/// In-memory DAG adjacency keyed by job id.
///
/// Construction runs full validation ([`validate_jobs`]), so a `JobGraph`
/// value is always acyclic with resolvable dependency references.
#[derive(Debug, Clone)]
pub struct JobGraph {
    nodes: HashMap<JobId, GraphNode>,
}

impl JobGraph {
    /// Build and validate a graph from job definitions.
    pub fn build(jobs: &[Job]) -> Result<Self> {
        validate_jobs(jobs)?;

        let mut nodes: HashMap<JobId, GraphNode> = HashMap::new();

        for job in jobs {
            nodes.insert(
                job.id.clone(),
                GraphNode {
                    deps: job.depends_on.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Populate dependents from the dependency lists.
        let ids: Vec<JobId> = nodes.keys().cloned().collect();
        for id in ids {
            let deps = nodes.get(&id).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        Ok(Self { nodes })
    }

    /// All job ids in the graph.
    pub fn jobs(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a job.
    pub fn dependencies_of(&self, id: &str) -> &[JobId] {
        self.nodes.get(id).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a job.
    pub fn dependents_of(&self, id: &str) -> &[JobId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Transitive dependents of a job, excluding the job itself.
    pub fn transitive_dependents_of(&self, id: &str) -> Vec<JobId> {
        let mut stack: Vec<JobId> = self.dependents_of(id).to_vec();
        let mut seen: HashSet<JobId> = HashSet::new();
        let mut out = Vec::new();

        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            stack.extend(self.dependents_of(&next).iter().cloned());
            out.push(next);
        }

        out
    }

    /// Root jobs (no dependencies).
    pub fn roots(&self) -> Vec<JobId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.deps.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Validate a set of job definitions as a DAG.
///
/// Checks, in order:
/// - duplicate job ids
/// - `depends_on` references that don't resolve within the set
/// - self-dependencies
/// - cycles (petgraph toposort)
///
/// Errors name the offending job so callers can surface it directly.
pub fn validate_jobs(jobs: &[Job]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::new();
    for job in jobs {
        if !ids.insert(job.id.as_str()) {
            return Err(GatedagError::GraphInvalid(format!(
                "duplicate job id '{}'",
                job.id
            )));
        }
    }

    for job in jobs {
        for dep in &job.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(GatedagError::GraphInvalid(format!(
                    "job '{}' has unknown dependency '{}' in `depends_on`",
                    job.id, dep
                )));
            }
            if dep == &job.id {
                return Err(GatedagError::GraphInvalid(format!(
                    "job '{}' cannot depend on itself",
                    job.id
                )));
            }
        }
    }

    // Edge direction: dep -> job. A topological sort fails on a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for job in jobs {
        graph.add_node(job.id.as_str());
    }
    for job in jobs {
        for dep in &job.depends_on {
            graph.add_edge(dep.as_str(), job.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(GatedagError::GraphInvalid(format!(
            "cycle detected in job graph involving job '{}'",
            cycle.node_id()
        ))),
    }
}
