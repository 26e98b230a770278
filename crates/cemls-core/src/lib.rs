//! CEM Language Server Core
//!
//! This crate provides the core of the language server for HTML with
//! Custom Elements Manifest support:
//! - Tree-sitter parsing for HTML, TypeScript/JavaScript, and CSS
//! - The module graph: which custom element tags are transitively
//!   available through a document's imports
//! - The CEM registry: the immutable read model of loaded manifests
//! - Versioned documents with incremental updates
//! - Completion context analysis for markup and tagged templates

// Implemented modules
pub mod autofix;
pub mod completion;
pub mod context;
pub mod documents;
pub mod exports;
pub mod fs;
pub mod graph;
pub mod manifest;
pub mod metrics;
pub mod parser;
pub mod queries;
pub mod registry;
pub mod resolver;

// Re-exports for convenience
pub use autofix::{AutofixData, AutofixKind};
pub use completion::{CompletionAnalysis, CompletionKind};
pub use context::{guarded, InternalError, ServerContext, ServerContextBuilder};
pub use documents::{
    Document, DocumentError, DocumentStore, FoundAttribute, FoundCssProperty, FoundElement,
    LineIndex, Position, Range, TextChange,
};
pub use exports::{ExportParseMode, ExportParser, ParsedModuleInfo};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use graph::{
    normalize_module_path, DependencyTracker, ExportKind, ExportTracker, ModuleExport, ModuleGraph,
    DEFAULT_MAX_TRANSITIVE_DEPTH,
};
pub use manifest::{discover_manifests, CemPackage, LoadedManifest, ManifestError};
pub use metrics::{CounterMetrics, MetricsCollector, NoopMetrics};
pub use parser::{ParserError, ParserPool, PooledParser, SupportedLanguage};
pub use queries::{QueryCache, QueryKind};
pub use registry::{
    is_valid_custom_element_tag, AttributeInfo, CemRegistry, ElementDeclaration,
    ElementRelationship, RelationshipKind,
};
pub use resolver::{ManifestResolver, NoopManifestResolver, RegistryResolver};
