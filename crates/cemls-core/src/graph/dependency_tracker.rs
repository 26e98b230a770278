//! Dependency tracking for the module graph.
//!
//! Two directed relations over module paths: the import graph
//! (importer -> imported) and the re-export graph (re-exporter -> source).
//! Cycles are permitted; resolvers guard with visited sets. Thread-safe via
//! an internal reader/writer lock; readers return defensive copies.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

#[derive(Debug, Default)]
struct DependencyTrackerInner {
    /// importer -> set of imported module paths
    module_dependencies: HashMap<String, BTreeSet<String>>,
    /// re-exporter -> set of source module paths
    re_export_chains: HashMap<String, BTreeSet<String>>,
}

/// Thread-safe directed dependency graph over module path keys.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    inner: RwLock<DependencyTrackerInner>,
}

impl DependencyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an import edge `importer -> imported`.
    ///
    /// Duplicate edges and blank inputs are ignored. Returns `true` when a
    /// new edge was inserted.
    pub fn add_dependency(&self, importer: &str, imported: &str) -> bool {
        if importer.trim().is_empty() || imported.trim().is_empty() {
            return false;
        }

        self.inner
            .write()
            .module_dependencies
            .entry(importer.to_string())
            .or_default()
            .insert(imported.to_string())
    }

    /// Record a re-export edge `re_exporter -> source`.
    pub fn add_re_export_chain(&self, re_exporter: &str, source: &str) -> bool {
        if re_exporter.trim().is_empty() || source.trim().is_empty() {
            return false;
        }

        self.inner
            .write()
            .re_export_chains
            .entry(re_exporter.to_string())
            .or_default()
            .insert(source.to_string())
    }

    /// Direct dependencies of `module`, sorted.
    pub fn dependencies_of(&self, module: &str) -> Vec<String> {
        self.inner
            .read()
            .module_dependencies
            .get(module)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `module` has any recorded outgoing import edges.
    pub fn has_dependencies(&self, module: &str) -> bool {
        self.inner
            .read()
            .module_dependencies
            .get(module)
            .is_some_and(|deps| !deps.is_empty())
    }

    /// Deep copy of the whole re-export table.
    pub fn re_export_chains(&self) -> HashMap<String, Vec<String>> {
        self.inner
            .read()
            .re_export_chains
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect()
    }

    /// All modules with outgoing import edges, sorted.
    pub fn all_importers(&self) -> Vec<String> {
        let mut importers: Vec<String> = self
            .inner
            .read()
            .module_dependencies
            .keys()
            .cloned()
            .collect();
        importers.sort();
        importers
    }

    /// Total number of import edges.
    pub fn edge_count(&self) -> usize {
        self.inner
            .read()
            .module_dependencies
            .values()
            .map(|deps| deps.len())
            .sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
