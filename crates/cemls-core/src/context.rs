//! Server Context
//!
//! The single dependency-injection surface handed to feature handlers.
//! Owns the process-wide singletons (registry, module graph, document
//! store, parser pool, metrics) and offers the cross-component queries
//! handlers need, so they stay thin clients.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::error;

use crate::completion::CompletionAnalysis;
use crate::documents::{DocumentStore, Position};
use crate::fs::{FileSystem, OsFileSystem};
use crate::graph::ModuleGraph;
use crate::metrics::{MetricsCollector, NoopMetrics};
use crate::parser::ParserPool;
use crate::registry::{CemRegistry, ElementDeclaration, ElementRelationship};
use crate::resolver::RegistryResolver;

// ============================================================================
// Internal Error
// ============================================================================

/// The failure a recovery boundary reports instead of crashing the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    method: String,
}

impl InternalError {
    /// The feature method that failed.
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "internal error in {}", self.method)
    }
}

impl std::error::Error for InternalError {}

/// Run a feature-level entry point inside a recovery boundary.
///
/// An unwinding panic is logged with a backtrace and converted into an
/// [`InternalError`], so one malformed document or query cannot crash the
/// server.
pub fn guarded<T>(method: &str, f: impl FnOnce() -> T) -> Result<T, InternalError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();
        error!(method, %message, %backtrace, "recovered from panic in feature handler");
        InternalError {
            method: method.to_string(),
        }
    })
}

// ============================================================================
// Server Context
// ============================================================================

/// Process-wide state shared by every feature handler.
pub struct ServerContext {
    registry: Arc<CemRegistry>,
    graph: Arc<ModuleGraph>,
    documents: Arc<DocumentStore>,
    pool: Arc<ParserPool>,
}

impl ServerContext {
    /// Start building a context.
    pub fn builder() -> ServerContextBuilder {
        ServerContextBuilder::default()
    }

    /// The manifest registry.
    pub fn registry(&self) -> &Arc<CemRegistry> {
        &self.registry
    }

    /// The module graph.
    pub fn graph(&self) -> &Arc<ModuleGraph> {
        &self.graph
    }

    /// The document store.
    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    /// The shared parser pool.
    pub fn pool(&self) -> &Arc<ParserPool> {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Cross-component queries
    // ------------------------------------------------------------------

    /// Completion context at a cursor position.
    pub fn analyze_completion_context(
        &self,
        uri: &str,
        position: Position,
    ) -> Option<CompletionAnalysis> {
        self.documents.analyze_completion_context(uri, position)
    }

    /// Declaration for a tag, if any manifest declares it.
    pub fn element(&self, tag_name: &str) -> Option<Arc<ElementDeclaration>> {
        self.registry.element(tag_name).cloned()
    }

    /// Relationships from a tag to other registered elements.
    pub fn relationships(&self, tag_name: &str) -> Vec<ElementRelationship> {
        self.registry.relationships(tag_name)
    }

    /// Tag names transitively available to a document through its module
    /// imports.
    pub fn tags_available_to_document(&self, uri: &str) -> Vec<String> {
        let mut available = Vec::new();
        for import in self.documents.module_imports(uri) {
            for tag in self.graph.transitive_elements(&import) {
                if !available.contains(&tag) {
                    available.push(tag);
                }
            }
        }
        available.sort();
        available
    }

    /// Import specifiers that would make `tag_name` available: manifest
    /// modules first, then graph-tracked sources such as re-exporters.
    pub fn import_paths_for_tag(&self, tag_name: &str) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(element) = self.registry.element(tag_name) {
            paths.push(element.module_path.clone());
        }
        for source in self.graph.exports().element_sources(tag_name) {
            if !paths.contains(&source) {
                paths.push(source);
            }
        }
        paths
    }

    /// Workspace file defining `tag_name`, for go-to-definition.
    ///
    /// Probes the lazy builder's candidate layout prefixes under the
    /// workspace root for a source file matching the element's manifest
    /// module path.
    pub fn definition_file_for_tag(&self, tag_name: &str) -> Option<PathBuf> {
        let element = self.registry.element(tag_name)?;
        let root = self.graph.workspace_root()?;
        let module = crate::graph::normalize_module_path(&element.module_path);

        let fs = OsFileSystem;
        for prefix in ["", "elements/", "src/", "lib/", "components/", "node_modules/"] {
            let candidate = root.join(prefix).join(&module);
            if fs.exists(&candidate) {
                return Some(candidate);
            }
            if let Some(stem) = module.strip_suffix(".js") {
                for ext in ["ts", "mjs"] {
                    let candidate = root.join(prefix).join(format!("{stem}.{ext}"));
                    if fs.exists(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder wiring the context's collaborators together.
#[derive(Default)]
pub struct ServerContextBuilder {
    registry: Option<Arc<CemRegistry>>,
    workspace_root: Option<PathBuf>,
    max_transitive_depth: Option<i64>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl ServerContextBuilder {
    /// Use an already-built registry.
    pub fn registry(mut self, registry: Arc<CemRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the workspace root for lazy building and definition lookup.
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Override the transitive depth cap.
    pub fn max_transitive_depth(mut self, depth: i64) -> Self {
        self.max_transitive_depth = Some(depth);
        self
    }

    /// Inject a metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Inject file access for the module graph.
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Wire everything together.
    ///
    /// A non-empty registry installs a registry-backed manifest resolver on
    /// the graph; an empty one leaves the graph in direct mode so it can be
    /// built before manifests are loaded.
    pub fn build(self) -> ServerContext {
        let registry = self.registry.unwrap_or_else(|| Arc::new(CemRegistry::new()));
        let pool = Arc::new(ParserPool::new());
        let graph = Arc::new(ModuleGraph::with_collaborators(
            Arc::clone(&pool),
            self.fs.unwrap_or_else(|| Arc::new(OsFileSystem)),
            self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
        ));

        if let Some(root) = self.workspace_root {
            graph.set_workspace_root(root);
        }
        if let Some(depth) = self.max_transitive_depth {
            graph.set_max_transitive_depth(depth);
        }
        if !registry.is_empty() {
            graph.set_manifest_resolver(Arc::new(RegistryResolver::new(Arc::clone(&registry))));
        }

        let documents = Arc::new(DocumentStore::new(Arc::clone(&pool)));
        ServerContext {
            registry,
            graph,
            documents,
            pool,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn guarded_passes_through_success() {
        let result = guarded("textDocument/completion", || 42);
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn guarded_converts_panic_to_internal_error() {
        let result: Result<(), InternalError> =
            guarded("textDocument/hover", || panic!("boom"));
        let err = result.unwrap_err();
        assert_eq!(err.method(), "textDocument/hover");
        assert_eq!(err.to_string(), "internal error in textDocument/hover");
    }

    #[test]
    fn empty_builder_yields_direct_mode_graph() {
        let context = ServerContext::builder().build();
        assert!(!context.graph().has_manifest_resolver());
        assert!(context.registry().is_empty());
        assert!(context.tags_available_to_document("file:///none.html").is_empty());
    }

    #[test]
    fn builder_with_registry_installs_resolver() {
        use crate::manifest::{CemDeclaration, CemModule, CemPackage, LoadedManifest};

        let manifest = LoadedManifest {
            package_name: None,
            manifest_path: "custom-elements.json".into(),
            package: CemPackage {
                schema_version: "1.0.0".to_string(),
                readme: None,
                modules: vec![CemModule {
                    kind: "javascript-module".to_string(),
                    path: "my-el.js".to_string(),
                    declarations: vec![CemDeclaration {
                        kind: "class".to_string(),
                        name: "MyEl".to_string(),
                        tag_name: Some("my-el".to_string()),
                        custom_element: true,
                        ..Default::default()
                    }],
                    exports: Vec::new(),
                }],
            },
        };
        let registry = Arc::new(CemRegistry::from_manifests(&[manifest]));

        let context = ServerContext::builder().registry(registry).build();
        assert!(context.graph().has_manifest_resolver());
        assert!(context.element("my-el").is_some());
        assert_eq!(
            context.graph().transitive_elements("my-el.js"),
            vec!["my-el".to_string()]
        );
        assert_eq!(context.import_paths_for_tag("my-el"), vec!["my-el.js"]);
    }
}
