//! Module Graph
//!
//! The workspace-wide dependency graph answering the central question of the
//! server: which custom element tag names are transitively available when a
//! document imports a given module. State lives in two trackers (exports and
//! dependencies) keyed by module path strings; resolution is a depth-capped
//! breadth-first walk with a lock-free result cache. Unknown import paths
//! are expanded on demand by the lazy builder.

mod dependency_tracker;
mod export_tracker;
mod lazy;

pub use dependency_tracker::DependencyTracker;
pub use export_tracker::{ExportKind, ExportTracker, ModuleExport};

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::fs::{FileSystem, OsFileSystem};
use crate::metrics::{MetricsCollector, NoopMetrics};
use crate::parser::ParserPool;
use crate::resolver::ManifestResolver;

/// Default bound on breadth-first expansion depth.
///
/// Real dependency chains are two or three levels deep; the cap bounds
/// worst-case work on pathological graphs while still finding everything
/// reachable in practice.
pub const DEFAULT_MAX_TRANSITIVE_DEPTH: usize = 5;

// ============================================================================
// Path Normalization
// ============================================================================

/// Normalize a module specifier into the graph's key form.
///
/// `./x.js` and `../x.js` become `x.js`; native path separators become
/// forward slashes; bare specifiers are retained as-is.
pub fn normalize_module_path(specifier: &str) -> String {
    let mut path = specifier.trim().replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix("../") {
            path = rest.to_string();
        } else {
            break;
        }
    }
    path
}

// ============================================================================
// Module Graph
// ============================================================================

/// The module graph and its resolution machinery.
///
/// Thread-safe throughout: trackers guard their state with reader/writer
/// locks, the transitive cache is a lock-free concurrent map, and the
/// tuning knobs use atomics. Handlers may query and mutate concurrently.
pub struct ModuleGraph {
    exports: ExportTracker,
    dependencies: DependencyTracker,
    /// module path -> transitively available tag names
    transitive_cache: DashMap<String, Vec<String>>,
    max_depth: AtomicUsize,
    workspace_root: RwLock<Option<PathBuf>>,
    resolver: RwLock<Option<Arc<dyn ManifestResolver>>>,
    metrics: Arc<dyn MetricsCollector>,
    fs: Arc<dyn FileSystem>,
    pool: Arc<ParserPool>,
}

impl ModuleGraph {
    /// Create a graph with default collaborators: no manifest resolver,
    /// no-op metrics, the real filesystem, and a private parser pool.
    pub fn new() -> Self {
        Self::with_collaborators(
            Arc::new(ParserPool::new()),
            Arc::new(OsFileSystem),
            Arc::new(NoopMetrics),
        )
    }

    /// Create a graph with injected collaborators.
    pub fn with_collaborators(
        pool: Arc<ParserPool>,
        fs: Arc<dyn FileSystem>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            exports: ExportTracker::new(),
            dependencies: DependencyTracker::new(),
            transitive_cache: DashMap::new(),
            max_depth: AtomicUsize::new(DEFAULT_MAX_TRANSITIVE_DEPTH),
            workspace_root: RwLock::new(None),
            resolver: RwLock::new(None),
            metrics,
            fs,
            pool,
        }
    }

    // ------------------------------------------------------------------
    // Tuning knobs
    // ------------------------------------------------------------------

    /// Current breadth-first depth cap.
    pub fn max_transitive_depth(&self) -> usize {
        self.max_depth.load(Ordering::Relaxed)
    }

    /// Set the depth cap. Non-positive values are clamped to the default.
    /// Changing the cap clears the transitive cache.
    pub fn set_max_transitive_depth(&self, depth: i64) {
        let clamped = if depth <= 0 {
            DEFAULT_MAX_TRANSITIVE_DEPTH
        } else {
            depth as usize
        };
        self.max_depth.store(clamped, Ordering::Relaxed);
        self.clear_transitive_cache();
    }

    /// Workspace root used by the lazy builder.
    pub fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.read().clone()
    }

    /// Set the workspace root. Required before lazy building can run.
    pub fn set_workspace_root(&self, root: impl Into<PathBuf>) {
        *self.workspace_root.write() = Some(root.into());
    }

    /// Install a manifest resolver, switching resolution from direct mode
    /// to manifest mode and clearing the transitive cache.
    ///
    /// The mode choice is made per call by inspecting whether a resolver is
    /// configured: a deliberately-NoOp resolver counts as configured and
    /// yields manifest-mode resolution that finds nothing, which is not the
    /// same as direct mode.
    pub fn set_manifest_resolver(&self, resolver: Arc<dyn ManifestResolver>) {
        *self.resolver.write() = Some(resolver);
        self.clear_transitive_cache();
    }

    /// Whether a manifest resolver is configured.
    pub fn has_manifest_resolver(&self) -> bool {
        self.resolver.read().is_some()
    }

    fn current_resolver(&self) -> Option<Arc<dyn ManifestResolver>> {
        self.resolver.read().clone()
    }

    // ------------------------------------------------------------------
    // Collaborator access
    // ------------------------------------------------------------------

    /// The export tracker.
    pub fn exports(&self) -> &ExportTracker {
        &self.exports
    }

    /// The dependency tracker.
    pub fn dependencies(&self) -> &DependencyTracker {
        &self.dependencies
    }

    pub(crate) fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    pub(crate) fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub(crate) fn pool(&self) -> &Arc<ParserPool> {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Record an import edge. Keys are normalized before insertion, and the
    /// importer's cached transitive result is evicted so the next query
    /// observes the new edge.
    pub fn add_dependency(&self, importer: &str, imported: &str) {
        let importer = normalize_module_path(importer);
        let imported = normalize_module_path(imported);
        if self.dependencies.add_dependency(&importer, &imported) {
            self.evict(&importer);
        }
    }

    /// Record a re-export edge alongside the matching import edge.
    pub fn add_re_export_chain(&self, re_exporter: &str, source: &str) {
        let re_exporter = normalize_module_path(re_exporter);
        let source = normalize_module_path(source);
        self.dependencies.add_re_export_chain(&re_exporter, &source);
    }

    /// Record a direct `customElements.define` export.
    pub fn add_direct_export(&self, module: &str, class_name: &str, tag_name: &str) {
        self.exports
            .add_direct_export(&normalize_module_path(module), class_name, tag_name);
    }

    /// Record a re-exported element.
    pub fn add_re_export(&self, re_exporter: &str, source: &str, class_name: &str, tag_name: &str) {
        self.exports.add_re_export(
            &normalize_module_path(re_exporter),
            &normalize_module_path(source),
            class_name,
            tag_name,
        );
    }

    /// Drop every cached transitive result.
    pub fn clear_transitive_cache(&self) {
        self.transitive_cache.clear();
    }

    fn evict(&self, module: &str) {
        if self.transitive_cache.remove(module).is_some() {
            self.metrics.record_cache_eviction();
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Tag names transitively available to an importer of `module`.
    ///
    /// Answers from the cache when possible. On a miss, expands unknown
    /// import paths lazily, walks the dependency graph breadth-first up to
    /// the depth cap, and resolves each visited module to its element tag
    /// names: through the manifest resolver when one is configured,
    /// otherwise directly from the export tracker.
    pub fn transitive_elements(&self, module: &str) -> Vec<String> {
        let module = normalize_module_path(module);
        if module.is_empty() {
            return Vec::new();
        }

        if let Some(cached) = self.transitive_cache.get(&module) {
            self.metrics.record_cache_hit();
            return cached.clone();
        }
        self.metrics.record_cache_miss();

        self.ensure_loaded(&module);

        let tags = self.resolve_transitive(&module, self.max_transitive_depth());
        // A racing computation may store first; both values are equal as a
        // function of the tracker state they observed, so last write wins.
        self.transitive_cache.insert(module, tags.clone());
        tags
    }

    /// Uncached resolution with an explicit depth cap.
    ///
    /// A cap of zero yields only the starting module's own elements.
    pub fn transitive_elements_with_depth(&self, module: &str, max_depth: usize) -> Vec<String> {
        let module = normalize_module_path(module);
        if module.is_empty() {
            return Vec::new();
        }
        self.resolve_transitive(&module, max_depth)
    }

    /// Resolution that bypasses the manifest resolver and reads the export
    /// tracker alone. Behavior matches direct mode regardless of whether a
    /// resolver is configured.
    pub fn transitive_elements_direct(&self, module: &str) -> Vec<String> {
        let module = normalize_module_path(module);
        if module.is_empty() {
            return Vec::new();
        }

        let visited = self.walk(&module, self.max_transitive_depth());
        self.collect_direct(&visited)
    }

    fn resolve_transitive(&self, module: &str, max_depth: usize) -> Vec<String> {
        let visited = self.walk(module, max_depth);
        match self.current_resolver() {
            Some(resolver) => self.collect_via_resolver(&visited, resolver.as_ref()),
            None => self.collect_direct(&visited),
        }
    }

    /// Breadth-first reachability with a visited guard.
    ///
    /// The starting module is always visited; each loop level advances the
    /// frontier one import hop, up to `max_depth` hops.
    fn walk(&self, module: &str, max_depth: usize) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut visited: Vec<String> = Vec::new();

        seen.insert(module.to_string());
        visited.push(module.to_string());

        let mut frontier = vec![module.to_string()];
        let mut depth = 0;
        while !frontier.is_empty() && depth < max_depth {
            let mut next = Vec::new();
            for current in frontier {
                for dep in self.dependencies.dependencies_of(&current) {
                    if seen.insert(dep.clone()) {
                        visited.push(dep.clone());
                        next.push(dep);
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        visited
    }

    fn collect_direct(&self, visited: &[String]) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for module in visited {
            for export in self.exports.module_exports(module) {
                tags.insert(export.tag_name);
            }
        }
        tags.into_iter().collect()
    }

    fn collect_via_resolver(
        &self,
        visited: &[String],
        resolver: &dyn ManifestResolver,
    ) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for module in visited {
            let mut found = resolver.elements_from_manifest_module(module);
            if found.is_empty() && !module.starts_with("./") {
                // Compensates for path-normalization mismatches between
                // editors and manifests.
                found = resolver.elements_from_manifest_module(&format!("./{module}"));
            }
            if found.is_empty() {
                debug!(module = %module, "no manifest elements for visited module");
            }
            tags.extend(found);
        }
        tags.into_iter().collect()
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
