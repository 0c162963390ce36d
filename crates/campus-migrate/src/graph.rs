//! Collection ordering from declared dependencies.

use std::collections::BTreeSet;
use std::fmt::Display;

use campus_core::{Collection, MigrationError};

/// Nodes in declaration order plus `node → prerequisite` edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T> {
    nodes: Vec<T>,
    edges: Vec<(T, T)>,
}

impl<T: Copy + Ord + Display> DependencyGraph<T> {
    pub fn new(nodes: Vec<T>) -> Self {
        Self {
            nodes,
            edges: Vec::new(),
        }
    }

    pub fn depends_on(&mut self, node: T, prerequisite: T) -> &mut Self {
        self.edges.push((node, prerequisite));
        self
    }

    /// Kahn's algorithm; among ready nodes the earliest declared goes first.
    pub fn topological_order(&self) -> Result<Vec<T>, MigrationError> {
        let known: BTreeSet<T> = self.nodes.iter().copied().collect();
        for (node, prerequisite) in &self.edges {
            if !known.contains(prerequisite) {
                return Err(MigrationError::invalid_field(
                    "collections",
                    format!("{node} depends on {prerequisite}, which is not part of this run"),
                ));
            }
        }

        let mut done: BTreeSet<T> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let next = self.nodes.iter().copied().find(|node| {
                !done.contains(node)
                    && self
                        .edges
                        .iter()
                        .filter(|(from, _)| from == node)
                        .all(|(_, prerequisite)| done.contains(prerequisite))
            });
            let Some(next) = next else {
                let stuck: Vec<String> = self
                    .nodes
                    .iter()
                    .filter(|node| !done.contains(node))
                    .map(ToString::to_string)
                    .collect();
                return Err(MigrationError::DependencyCycle {
                    collections: stuck.join(", "),
                });
            };
            done.insert(next);
            order.push(next);
        }
        Ok(order)
    }
}

/// Processing order for `collections`, following [`Collection::dependencies`].
pub fn processing_order(collections: &[Collection]) -> Result<Vec<Collection>, MigrationError> {
    let mut declared: Vec<Collection> = Collection::ALL
        .iter()
        .copied()
        .filter(|c| collections.contains(c))
        .collect();
    declared.dedup();

    let mut graph = DependencyGraph::new(declared.clone());
    for collection in declared {
        for prerequisite in collection.dependencies() {
            graph.depends_on(collection, *prerequisite);
        }
    }
    graph.topological_order()
}
