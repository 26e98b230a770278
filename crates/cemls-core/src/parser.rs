//! Tree-Sitter Parsing Layer
//!
//! This module provides the pooled tree-sitter parsers the rest of the core
//! borrows for parsing HTML documents, TypeScript/JavaScript modules, and CSS.
//!
//! ## Supported Languages
//!
//! - HTML (.html, .htm)
//! - JavaScript (.js, .mjs, .cjs)
//! - TypeScript (.ts, .tsx)
//! - CSS (.css)

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use parking_lot::Mutex;
use thiserror::Error;
use tree_sitter::{Language, Parser, Tree};

// ============================================================================
// Supported Languages
// ============================================================================

/// Languages the core can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    Html,
    JavaScript,
    TypeScript,
    Css,
}

impl SupportedLanguage {
    /// Get the language name as used in query file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedLanguage::Html => "html",
            SupportedLanguage::JavaScript => "javascript",
            SupportedLanguage::TypeScript => "typescript",
            SupportedLanguage::Css => "css",
        }
    }

    /// Get the tree-sitter Language for this language.
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SupportedLanguage::Html => tree_sitter_html::LANGUAGE.into(),
            SupportedLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SupportedLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SupportedLanguage::Css => tree_sitter_css::LANGUAGE.into(),
        }
    }

    /// Detect language from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    pub fn from_extension(ext: &str) -> Option<Self> {
        get_extension_map()
            .get(ext.to_lowercase().as_str())
            .copied()
    }

    /// Detect language from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect language from a document URI.
    ///
    /// Falls back on the extension of the final path segment.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let trimmed = uri.split(['?', '#']).next().unwrap_or(uri);
        let (_, ext) = trimmed.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Whether this language hosts JavaScript module syntax.
    pub fn is_script(&self) -> bool {
        matches!(
            self,
            SupportedLanguage::JavaScript | SupportedLanguage::TypeScript
        )
    }

    /// Get all supported file extensions.
    pub fn all_extensions() -> &'static [&'static str] {
        &["html", "htm", "js", "mjs", "cjs", "ts", "tsx", "css"]
    }
}

impl std::fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static extension to language mapping.
static EXTENSION_MAP: OnceLock<HashMap<&'static str, SupportedLanguage>> = OnceLock::new();

fn get_extension_map() -> &'static HashMap<&'static str, SupportedLanguage> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        // HTML
        map.insert("html", SupportedLanguage::Html);
        map.insert("htm", SupportedLanguage::Html);
        // JavaScript
        map.insert("js", SupportedLanguage::JavaScript);
        map.insert("mjs", SupportedLanguage::JavaScript);
        map.insert("cjs", SupportedLanguage::JavaScript);
        // TypeScript
        map.insert("ts", SupportedLanguage::TypeScript);
        map.insert("tsx", SupportedLanguage::TypeScript);
        // CSS
        map.insert("css", SupportedLanguage::Css);
        map
    })
}

// ============================================================================
// Parser Errors
// ============================================================================

/// Errors that can occur in the parsing layer.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Failed to set language on a parser
    #[error("Failed to set language: {0}")]
    LanguageSet(String),

    /// Tree-sitter produced no tree
    #[error("Failed to parse source code")]
    ParseFailed,

    /// Failed to compile a query
    #[error("Failed to compile query '{name}': {message}")]
    QueryCompile { name: String, message: String },

    /// Unsupported language
    #[error("Unsupported language for document: {0}")]
    UnsupportedLanguage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Parser Pool
// ============================================================================

/// A pool of reusable tree-sitter parsers, one bucket per language.
///
/// Parser construction requires a grammar load, so instances are recycled.
/// The pool is unbounded; parsers are borrowed via [`ParserPool::acquire`]
/// and returned by the [`PooledParser`] guard on drop, which covers every
/// exit path including parse failure and panic unwinding.
pub struct ParserPool {
    idle: Mutex<HashMap<SupportedLanguage, Vec<Parser>>>,
}

impl ParserPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Borrow a parser configured for `language`.
    ///
    /// Reuses an idle parser when one is available, otherwise creates one.
    pub fn acquire(&self, language: SupportedLanguage) -> Result<PooledParser<'_>, ParserError> {
        let recycled = self
            .idle
            .lock()
            .get_mut(&language)
            .and_then(|bucket| bucket.pop());

        let parser = match recycled {
            Some(parser) => parser,
            None => {
                let mut parser = Parser::new();
                parser
                    .set_language(&language.tree_sitter_language())
                    .map_err(|e| ParserError::LanguageSet(e.to_string()))?;
                parser
            }
        };

        Ok(PooledParser {
            pool: self,
            language,
            parser: Some(parser),
        })
    }

    /// Number of idle parsers held for `language`.
    pub fn idle_count(&self, language: SupportedLanguage) -> usize {
        self.idle
            .lock()
            .get(&language)
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }

    fn release(&self, language: SupportedLanguage, parser: Parser) {
        self.idle.lock().entry(language).or_default().push(parser);
    }
}

impl Default for ParserPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A parser borrowed from a [`ParserPool`].
///
/// Returned to the pool on drop.
pub struct PooledParser<'a> {
    pool: &'a ParserPool,
    language: SupportedLanguage,
    parser: Option<Parser>,
}

impl PooledParser<'_> {
    /// The language this parser is configured for.
    pub fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Parse source code into a syntax tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParserError> {
        self.parse_with_old_tree(source, None)
    }

    /// Parse with an existing tree for incremental reuse.
    pub fn parse_with_old_tree(
        &mut self,
        source: &str,
        old_tree: Option<&Tree>,
    ) -> Result<Tree, ParserError> {
        self.parser
            .as_mut()
            .expect("parser present until drop")
            .parse(source, old_tree)
            .ok_or(ParserError::ParseFailed)
    }
}

impl Drop for PooledParser<'_> {
    fn drop(&mut self) {
        if let Some(mut parser) = self.parser.take() {
            parser.reset();
            self.pool.release(self.language, parser);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_extension() {
        assert_eq!(
            SupportedLanguage::from_extension("html"),
            Some(SupportedLanguage::Html)
        );
        assert_eq!(
            SupportedLanguage::from_extension("TS"),
            Some(SupportedLanguage::TypeScript)
        );
        assert_eq!(
            SupportedLanguage::from_extension("mjs"),
            Some(SupportedLanguage::JavaScript)
        );
        assert_eq!(SupportedLanguage::from_extension("py"), None);
    }

    #[test]
    fn detects_language_from_uri() {
        assert_eq!(
            SupportedLanguage::from_uri("file:///ws/index.html"),
            Some(SupportedLanguage::Html)
        );
        assert_eq!(
            SupportedLanguage::from_uri("file:///ws/elements/rh-tab.ts"),
            Some(SupportedLanguage::TypeScript)
        );
        assert_eq!(SupportedLanguage::from_uri("file:///ws/README"), None);
    }

    #[test]
    fn pool_recycles_parsers() {
        let pool = ParserPool::new();
        assert_eq!(pool.idle_count(SupportedLanguage::Html), 0);

        {
            let mut parser = pool.acquire(SupportedLanguage::Html).unwrap();
            let tree = parser.parse("<p>hi</p>").unwrap();
            assert_eq!(tree.root_node().kind(), "document");
        }

        assert_eq!(pool.idle_count(SupportedLanguage::Html), 1);

        // Reacquire drains the idle bucket.
        let _parser = pool.acquire(SupportedLanguage::Html).unwrap();
        assert_eq!(pool.idle_count(SupportedLanguage::Html), 0);
    }

    #[test]
    fn pool_returns_parser_on_parse_failure_path() {
        let pool = ParserPool::new();
        {
            let mut parser = pool.acquire(SupportedLanguage::TypeScript).unwrap();
            // Malformed input still produces a tree with ERROR nodes; the
            // guard returns the parser either way.
            let _ = parser.parse("export class {{{{");
        }
        assert_eq!(pool.idle_count(SupportedLanguage::TypeScript), 1);
    }

    #[test]
    fn distinct_languages_use_distinct_buckets() {
        let pool = ParserPool::new();
        {
            let _html = pool.acquire(SupportedLanguage::Html).unwrap();
            let _css = pool.acquire(SupportedLanguage::Css).unwrap();
        }
        assert_eq!(pool.idle_count(SupportedLanguage::Html), 1);
        assert_eq!(pool.idle_count(SupportedLanguage::Css), 1);
    }
}
