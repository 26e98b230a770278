//! Embedded Tree-sitter queries and the process-wide matcher cache.
//!
//! Query sources are embedded at compile time so the server works without
//! external query files. Compiled queries are cheap to share (read-only),
//! so a single process-wide [`QueryCache`] hands out `Arc<Query>` matchers,
//! compiled lazily and keyed by `(language, query kind)`.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tree_sitter::Query;

use crate::parser::{ParserError, SupportedLanguage};

// Query sources - embedded at compile time
const EXPORTS_QUERY: &str = include_str!("../queries/exports.scm");
const HTML_ELEMENTS_QUERY: &str = include_str!("../queries/html-elements.scm");
const TAGGED_TEMPLATES_QUERY: &str = include_str!("../queries/tagged-templates.scm");
const CSS_CUSTOM_PROPERTIES_QUERY: &str = include_str!("../queries/css-custom-properties.scm");

// ============================================================================
// Query Kinds
// ============================================================================

/// The query families the core compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Import/export/`customElements.define` captures (TS/JS).
    Exports,
    /// Element and attribute captures (HTML).
    HtmlElements,
    /// Tagged and untagged template literal captures (TS/JS).
    TaggedTemplates,
    /// Custom property declarations and var() usages (CSS).
    CssCustomProperties,
}

impl QueryKind {
    /// Get the query name as used in query file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Exports => "exports",
            QueryKind::HtmlElements => "html-elements",
            QueryKind::TaggedTemplates => "tagged-templates",
            QueryKind::CssCustomProperties => "css-custom-properties",
        }
    }

    /// The embedded source for this query, if `language` supports it.
    pub fn source_for(&self, language: SupportedLanguage) -> Option<&'static str> {
        match (self, language) {
            (QueryKind::Exports, lang) if lang.is_script() => Some(EXPORTS_QUERY),
            (QueryKind::TaggedTemplates, lang) if lang.is_script() => Some(TAGGED_TEMPLATES_QUERY),
            (QueryKind::HtmlElements, SupportedLanguage::Html) => Some(HTML_ELEMENTS_QUERY),
            (QueryKind::CssCustomProperties, SupportedLanguage::Css) => {
                Some(CSS_CUSTOM_PROPERTIES_QUERY)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Query Cache
// ============================================================================

/// Process-wide cache of compiled tree-sitter queries.
///
/// Matchers are compiled on first request and live for the process
/// lifetime. Compilation failures are returned upward: a query that fails
/// to compile at startup will fail identically on every retry, so callers
/// treat the first failure as fatal.
pub struct QueryCache {
    queries: DashMap<(SupportedLanguage, QueryKind), Arc<Query>>,
}

impl QueryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            queries: DashMap::new(),
        }
    }

    /// The process-wide cache instance.
    pub fn global() -> &'static QueryCache {
        static GLOBAL: OnceLock<QueryCache> = OnceLock::new();
        GLOBAL.get_or_init(QueryCache::new)
    }

    /// Get the compiled matcher for `(language, kind)`, compiling on first
    /// use.
    pub fn matcher(
        &self,
        language: SupportedLanguage,
        kind: QueryKind,
    ) -> Result<Arc<Query>, ParserError> {
        if let Some(query) = self.queries.get(&(language, kind)) {
            return Ok(Arc::clone(&query));
        }

        let source = kind
            .source_for(language)
            .ok_or_else(|| ParserError::UnsupportedLanguage(format!("{language}/{kind}")))?;

        let query = Query::new(&language.tree_sitter_language(), source).map_err(|e| {
            ParserError::QueryCompile {
                name: format!("{language}/{kind}"),
                message: format!("{e:?}"),
            }
        })?;

        let query = Arc::new(query);
        // Two racing compilations produce equal queries; last write wins.
        self.queries
            .insert((language, kind), Arc::clone(&query));
        Ok(query)
    }

    /// Number of compiled matchers currently cached.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether no matchers have been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
