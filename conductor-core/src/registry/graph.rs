//! Dependency graph with topological ordering
//!
//! Edges point from a tool to the tools it depends on. The transpose
//! (`reverse_dependencies`) is maintained alongside on every insert and
//! removal so dependents can be found without a scan.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Directed dependency graph keyed by tool name
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, Vec<String>>,
    reverse_dependencies: BTreeMap<String, BTreeSet<String>>,
}

/// Result of a topological sort that found a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    /// Nodes that could not be ordered
    pub remaining: BTreeSet<String>,
    /// One concrete cycle among them, first node repeated at the end
    pub cycle: Vec<String>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its dependencies
    pub fn insert(&mut self, name: &str, dependencies: &[String]) {
        for dependency in dependencies {
            self.reverse_dependencies
                .entry(dependency.clone())
                .or_default()
                .insert(name.to_string());
        }
        self.dependencies
            .insert(name.to_string(), dependencies.to_vec());
    }

    /// Remove a node and its outgoing edges
    ///
    /// Edges from other nodes into `name` stay; those nodes still declare the
    /// dependency and will fail to resolve it until it is registered again.
    pub fn remove(&mut self, name: &str) {
        let Some(dependencies) = self.dependencies.remove(name) else {
            return;
        };
        for dependency in dependencies {
            if let Some(dependents) = self.reverse_dependencies.get_mut(&dependency) {
                dependents.remove(name);
                if dependents.is_empty() {
                    self.reverse_dependencies.remove(&dependency);
                }
            }
        }
    }

    /// Check whether a node is present
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Number of declared edges
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(Vec::len).sum()
    }

    /// Direct dependencies of a node, in declaration order
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.dependencies
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Nodes that directly depend on `name`
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.reverse_dependencies
            .get(name)
            .map(|dependents| dependents.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Declared dependencies that are not nodes of the graph, as `(node, missing)` pairs
    pub fn missing_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for (name, dependencies) in &self.dependencies {
            for dependency in dependencies {
                if !self.contains(dependency) {
                    missing.push((name.clone(), dependency.clone()));
                }
            }
        }
        missing
    }

    /// Order in which nodes can be torn down: dependents before dependencies
    ///
    /// Kahn's algorithm where the in-degree of a node is the number of
    /// registered nodes that depend on it. A node is emitted once all of its
    /// dependents have been. Dependencies on unknown nodes are ignored.
    pub fn disposal_order(&self) -> Result<Vec<String>, CycleDetected> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .dependencies
            .keys()
            .map(|name| {
                let dependents = self
                    .reverse_dependencies
                    .get(name)
                    .map(|d| d.iter().filter(|n| self.contains(n)).count())
                    .unwrap_or(0);
                (name.as_str(), dependents)
            })
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.dependencies.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            for dependency in self.dependencies_of(name) {
                if let Some(degree) = in_degree.get_mut(dependency.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependency.as_str());
                    }
                }
            }
        }

        if order.len() < self.dependencies.len() {
            let processed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
            let remaining: BTreeSet<String> = self
                .dependencies
                .keys()
                .filter(|name| !processed.contains(name.as_str()))
                .cloned()
                .collect();
            let cycle = self.trace_cycle(&remaining);
            return Err(CycleDetected { remaining, cycle });
        }

        Ok(order)
    }

    /// Order in which nodes can be constructed: dependencies before dependents
    pub fn construction_order(&self) -> Result<Vec<String>, CycleDetected> {
        let mut order = self.disposal_order()?;
        order.reverse();
        Ok(order)
    }

    /// Find one cycle among nodes left over by the sort
    ///
    /// Every leftover node still has a leftover dependent, so walking
    /// dependents must revisit a node.
    fn trace_cycle(&self, remaining: &BTreeSet<String>) -> Vec<String> {
        let Some(start) = remaining.iter().next() else {
            return Vec::new();
        };

        let mut walk: Vec<String> = Vec::new();
        let mut current = start.clone();
        loop {
            if let Some(index) = walk.iter().position(|n| *n == current) {
                // Walked along dependents; reverse to read as "depends on"
                let mut cycle: Vec<String> = walk[index..].iter().rev().cloned().collect();
                if let Some(first) = cycle.first().cloned() {
                    cycle.push(first);
                }
                return cycle;
            }
            walk.push(current.clone());

            let next = self
                .reverse_dependencies
                .get(&current)
                .and_then(|dependents| dependents.iter().find(|d| remaining.contains(*d)));
            match next {
                Some(next) => current = next.clone(),
                None => return walk,
            }
        }
    }
}
