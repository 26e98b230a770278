//! Document Store
//!
//! Versioned text documents with tree-sitter trees. Editor change events
//! arrive as `{range, newText}` triples or whole-buffer replacements;
//! incremental edits are applied to the stored content and fed to
//! `Tree::edit` so the reparse can reuse unchanged subtrees. Versions are
//! strictly increasing per URI; stale updates are dropped without error.
//! A per-URI mutex serializes edits for one URI; distinct URIs are
//! independent.
//!
//! Positions follow the editor protocol: zero-based lines, UTF-16 code
//! unit columns, half-open ranges.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tree_sitter::{InputEdit, Point, QueryCursor, StreamingIterator, Tree};

use crate::completion::{self, CompletionAnalysis};
use crate::graph::normalize_module_path;
use crate::parser::{ParserError, ParserPool, SupportedLanguage};
use crate::queries::{QueryCache, QueryKind};
use crate::registry::is_valid_custom_element_tag;

// ============================================================================
// Protocol-Shaped Positions
// ============================================================================

/// A zero-based line/character position. Characters count UTF-16 code
/// units, as in the editor protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open `[start, end)` range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether `position` falls inside the half-open range.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }
}

/// One editor change event: a range edit, or a whole-buffer replacement
/// when `range` is absent.
#[derive(Debug, Clone)]
pub struct TextChange {
    pub range: Option<Range>,
    pub text: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The URI's extension maps to no supported language
    #[error("Unsupported language for document: {0}")]
    UnsupportedLanguage(String),

    /// Operation on a URI that was never opened
    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    /// Parsing layer failure
    #[error(transparent)]
    Parser(#[from] ParserError),
}

// ============================================================================
// Line Index
// ============================================================================

/// Byte offsets of line starts, for position/offset conversion.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Index `text`.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Number of lines (at least one).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset for a protocol position, clamped to line and text ends.
    pub fn offset_of(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return text.len();
        }
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(text.len());

        let mut units: u32 = 0;
        let mut offset = start;
        for ch in text[start..end].chars() {
            if units >= position.character || ch == '\n' || ch == '\r' {
                break;
            }
            units += ch.len_utf16() as u32;
            offset += ch.len_utf8();
        }
        offset
    }

    /// Protocol position for a byte offset.
    pub fn position_of(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insertion) => insertion - 1,
        };
        let start = self.line_starts[line];
        let character = text[start..offset]
            .chars()
            .map(|c| c.len_utf16() as u32)
            .sum();
        Position::new(line as u32, character)
    }

    /// Tree-sitter point (row, byte column) for a byte offset.
    pub fn point_of(&self, text: &str, offset: usize) -> Point {
        let offset = offset.min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insertion) => insertion - 1,
        };
        Point {
            row: line,
            column: offset - self.line_starts[line],
        }
    }

    /// Byte range of a line, without its terminator.
    pub fn line_span(&self, text: &str, line: u32) -> (usize, usize) {
        let line = line as usize;
        if line >= self.line_starts.len() {
            return (text.len(), text.len());
        }
        let start = self.line_starts[line];
        let mut end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(text.len());
        while end > start && matches!(text.as_bytes()[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        (start, end)
    }
}

// ============================================================================
// Document
// ============================================================================

/// A versioned open document and its parsed tree.
///
/// The tree is owned by the document and released when the document is
/// closed or its content replaced.
pub struct Document {
    uri: String,
    version: i32,
    language: SupportedLanguage,
    content: String,
    line_index: LineIndex,
    tree: Option<Tree>,
}

impl Document {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// The content as of the last applied update.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Byte offset of a protocol position.
    pub fn offset_of(&self, position: Position) -> usize {
        self.line_index.offset_of(&self.content, position)
    }

    /// Protocol position of a byte offset.
    pub fn position_of(&self, offset: usize) -> Position {
        self.line_index.position_of(&self.content, offset)
    }

    /// A line's text without its terminator.
    pub fn line_content(&self, line: u32) -> &str {
        let (start, end) = self.line_index.line_span(&self.content, line);
        &self.content[start..end]
    }
}

/// A custom element usage found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundElement {
    pub tag_name: String,
    /// Range of the tag name token.
    pub range: Range,
}

/// An attribute found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundAttribute {
    pub name: String,
    /// Tag name of the enclosing element, when determinable.
    pub element: Option<String>,
    pub range: Range,
}

/// A CSS custom property declaration or `var()` usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundCssProperty {
    /// Property name, including the `--` prefix.
    pub name: String,
    pub range: Range,
}

// ============================================================================
// Document Store
// ============================================================================

/// The store of open documents.
pub struct DocumentStore {
    documents: DashMap<String, Arc<Mutex<Document>>>,
    pool: Arc<ParserPool>,
    queries: &'static QueryCache,
}

impl DocumentStore {
    /// Create a store borrowing parsers from `pool`.
    pub fn new(pool: Arc<ParserPool>) -> Self {
        Self {
            documents: DashMap::new(),
            pool,
            queries: QueryCache::global(),
        }
    }

    /// Open (or re-open) a document.
    ///
    /// Re-opening with a version at or below the stored one is dropped.
    pub fn open(&self, uri: &str, content: String, version: i32) -> Result<(), DocumentError> {
        let language = SupportedLanguage::from_uri(uri)
            .ok_or_else(|| DocumentError::UnsupportedLanguage(uri.to_string()))?;

        if let Some(existing) = self.document(uri) {
            let doc = existing.lock();
            if doc.version >= version {
                debug!(uri, version, "dropping stale open");
                return Ok(());
            }
        }

        let tree = self.parse_fresh(language, &content);
        let document = Document {
            uri: uri.to_string(),
            version,
            language,
            line_index: LineIndex::new(&content),
            content,
            tree,
        };
        self.documents
            .insert(uri.to_string(), Arc::new(Mutex::new(document)));
        Ok(())
    }

    /// Replace a document's content wholesale.
    ///
    /// Returns `false` when the update was dropped (unknown URI or stale
    /// version).
    pub fn update(&self, uri: &str, content: String, version: i32) -> bool {
        self.update_with_changes(
            uri,
            version,
            &[TextChange {
                range: None,
                text: content,
            }],
        )
    }

    /// Apply a batch of editor change events.
    ///
    /// Range edits reuse the existing tree via `Tree::edit`; a change
    /// without a range replaces the content and takes a fresh parse.
    /// Returns `false` when the update was dropped.
    pub fn update_with_changes(&self, uri: &str, version: i32, changes: &[TextChange]) -> bool {
        let Some(entry) = self.document(uri) else {
            debug!(uri, "update for unknown document dropped");
            return false;
        };

        let mut doc = entry.lock();
        if version <= doc.version {
            debug!(uri, version, current = doc.version, "stale update dropped");
            return false;
        }

        let mut incremental = true;
        for change in changes {
            match change.range {
                Some(range) => apply_range_edit(&mut doc, range, &change.text),
                None => {
                    doc.content = change.text.clone();
                    doc.line_index = LineIndex::new(&doc.content);
                    // Full replacement: the old tree is released and a
                    // fresh parse takes its place.
                    doc.tree = None;
                    incremental = false;
                }
            }
        }

        doc.tree = if incremental {
            self.reparse(doc.language, &doc.content, doc.tree.as_ref())
        } else {
            self.parse_fresh(doc.language, &doc.content)
        };
        doc.version = version;
        true
    }

    /// Close a document, releasing its tree.
    pub fn close(&self, uri: &str) {
        self.documents.remove(uri);
    }

    /// Run `f` against a document, serialized with edits to the same URI.
    pub fn with_document<R>(&self, uri: &str, f: impl FnOnce(&Document) -> R) -> Option<R> {
        let entry = self.document(uri)?;
        let doc = entry.lock();
        Some(f(&doc))
    }

    /// Content and version snapshot of a document.
    pub fn snapshot(&self, uri: &str) -> Option<(String, i32)> {
        self.with_document(uri, |doc| (doc.content.clone(), doc.version))
    }

    /// URIs of all open documents.
    pub fn all_uris(&self) -> Vec<String> {
        self.documents.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are open.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn document(&self, uri: &str) -> Option<Arc<Mutex<Document>>> {
        self.documents.get(uri).map(|entry| Arc::clone(&entry))
    }

    fn parse_fresh(&self, language: SupportedLanguage, content: &str) -> Option<Tree> {
        self.reparse(language, content, None)
    }

    fn reparse(
        &self,
        language: SupportedLanguage,
        content: &str,
        old_tree: Option<&Tree>,
    ) -> Option<Tree> {
        let mut parser = match self.pool.acquire(language) {
            Ok(parser) => parser,
            Err(e) => {
                debug!(error = %e, "parser unavailable");
                return None;
            }
        };
        match parser.parse_with_old_tree(content, old_tree) {
            Ok(tree) => Some(tree),
            Err(e) => {
                debug!(error = %e, "document parse failed");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Document queries
    // ------------------------------------------------------------------

    /// All custom element usages in a document.
    ///
    /// For HTML this scans the document tree; for TS/JS it scans the HTML
    /// fragments of template literals.
    pub fn find_custom_elements(&self, uri: &str) -> Vec<FoundElement> {
        self.with_document(uri, |doc| self.elements_in(doc))
            .unwrap_or_default()
    }

    /// The custom element whose tag name token covers `position`.
    pub fn find_element_at_position(&self, uri: &str, position: Position) -> Option<FoundElement> {
        self.with_document(uri, |doc| {
            self.elements_in(doc)
                .into_iter()
                .find(|el| el.range.contains(position))
        })?
    }

    /// All attributes in a document, with their enclosing elements.
    pub fn find_attributes(&self, uri: &str) -> Vec<FoundAttribute> {
        self.with_document(uri, |doc| self.attributes_in(doc))
            .unwrap_or_default()
    }

    /// The attribute whose name token covers `position`.
    pub fn find_attribute_at_position(
        &self,
        uri: &str,
        position: Position,
    ) -> Option<FoundAttribute> {
        self.with_document(uri, |doc| {
            self.attributes_in(doc)
                .into_iter()
                .find(|attr| attr.range.contains(position))
        })?
    }

    /// Semantic completion context at a cursor position.
    pub fn analyze_completion_context(
        &self,
        uri: &str,
        position: Position,
    ) -> Option<CompletionAnalysis> {
        self.with_document(uri, |doc| completion::analyze(doc, position, self.queries))
    }

    /// Custom property declarations and `var()` usages in a CSS document.
    pub fn find_css_custom_properties(&self, uri: &str) -> Vec<FoundCssProperty> {
        self.with_document(uri, |doc| self.css_properties_in(doc))
            .unwrap_or_default()
    }

    /// Module specifiers imported by a document, normalized.
    ///
    /// For TS/JS documents these are the document's own imports; for HTML
    /// documents, the imports of inline module scripts.
    pub fn module_imports(&self, uri: &str) -> Vec<String> {
        self.with_document(uri, |doc| self.imports_in(doc))
            .unwrap_or_default()
    }

    fn elements_in(&self, doc: &Document) -> Vec<FoundElement> {
        let mut found = Vec::new();
        for (fragment, base) in self.html_views(doc) {
            let Some((tree, source)) = fragment else {
                continue;
            };
            self.collect_elements(&tree, &source, base, doc, &mut found);
        }
        found
    }

    fn attributes_in(&self, doc: &Document) -> Vec<FoundAttribute> {
        let mut found = Vec::new();
        for (fragment, base) in self.html_views(doc) {
            let Some((tree, source)) = fragment else {
                continue;
            };
            self.collect_attributes(&tree, &source, base, doc, &mut found);
        }
        found
    }

    /// HTML views of a document: the document itself for HTML, or each
    /// template fragment reparsed as HTML for TS/JS. The returned base is
    /// the fragment's byte offset in the document.
    #[allow(clippy::type_complexity)]
    fn html_views(&self, doc: &Document) -> Vec<(Option<(Tree, String)>, usize)> {
        match doc.language() {
            SupportedLanguage::Html => {
                let view = doc
                    .tree()
                    .cloned()
                    .map(|tree| (tree, doc.content().to_string()));
                vec![(view, 0)]
            }
            SupportedLanguage::JavaScript | SupportedLanguage::TypeScript => {
                completion::template_fragments(doc, self.queries)
                    .into_iter()
                    .map(|fragment| {
                        let source = doc.content()[fragment.start..fragment.end].to_string();
                        let view = self
                            .reparse(SupportedLanguage::Html, &source, None)
                            .map(|tree| (tree, source));
                        (view, fragment.start)
                    })
                    .collect()
            }
            SupportedLanguage::Css => Vec::new(),
        }
    }

    fn collect_elements(
        &self,
        tree: &Tree,
        source: &str,
        base: usize,
        doc: &Document,
        found: &mut Vec<FoundElement>,
    ) {
        let Ok(query) = self
            .queries
            .matcher(SupportedLanguage::Html, QueryKind::HtmlElements)
        else {
            return;
        };
        let capture_names = query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());
        while let Some(match_) = matches.next() {
            for capture in match_.captures {
                let name = capture_names[capture.index as usize];
                if name != "tag.name" && name != "tag.close" {
                    continue;
                }
                let text = capture.node.utf8_text(source.as_bytes()).unwrap_or("");
                if !is_valid_custom_element_tag(text) {
                    continue;
                }
                found.push(FoundElement {
                    tag_name: text.to_string(),
                    range: Range::new(
                        doc.position_of(base + capture.node.start_byte()),
                        doc.position_of(base + capture.node.end_byte()),
                    ),
                });
            }
        }
    }

    fn collect_attributes(
        &self,
        tree: &Tree,
        source: &str,
        base: usize,
        doc: &Document,
        found: &mut Vec<FoundAttribute>,
    ) {
        let Ok(query) = self
            .queries
            .matcher(SupportedLanguage::Html, QueryKind::HtmlElements)
        else {
            return;
        };
        let capture_names = query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());
        while let Some(match_) = matches.next() {
            for capture in match_.captures {
                if capture_names[capture.index as usize] != "attr.name" {
                    continue;
                }
                let node = capture.node;
                let text = node.utf8_text(source.as_bytes()).unwrap_or("");
                found.push(FoundAttribute {
                    name: text.to_string(),
                    element: enclosing_tag_name(node, source),
                    range: Range::new(
                        doc.position_of(base + node.start_byte()),
                        doc.position_of(base + node.end_byte()),
                    ),
                });
            }
        }
    }

    fn css_properties_in(&self, doc: &Document) -> Vec<FoundCssProperty> {
        if doc.language() != SupportedLanguage::Css {
            return Vec::new();
        }
        let Some(tree) = doc.tree() else {
            return Vec::new();
        };
        let Ok(query) = self
            .queries
            .matcher(SupportedLanguage::Css, QueryKind::CssCustomProperties)
        else {
            return Vec::new();
        };
        let capture_names = query.capture_names();
        let source = doc.content();

        let mut found = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());
        while let Some(match_) = matches.next() {
            let mut is_var_call = false;
            for capture in match_.captures {
                let node = capture.node;
                let text = node.utf8_text(source.as_bytes()).unwrap_or("");
                match capture_names[capture.index as usize] {
                    "property.name" if text.starts_with("--") => {
                        found.push(FoundCssProperty {
                            name: text.to_string(),
                            range: Range::new(
                                doc.position_of(node.start_byte()),
                                doc.position_of(node.end_byte()),
                            ),
                        });
                    }
                    "function.name" => is_var_call = text == "var",
                    "function.arguments" if is_var_call => {
                        // Arguments read like `(--rh-tab-color, red)`; the
                        // custom property is the first `--` token.
                        if let Some(name) =
                            text.split([',', '(', ')']).map(str::trim).find(|t| {
                                t.starts_with("--")
                            })
                        {
                            let offset = node.start_byte()
                                + text.find(name).unwrap_or(0);
                            found.push(FoundCssProperty {
                                name: name.to_string(),
                                range: Range::new(
                                    doc.position_of(offset),
                                    doc.position_of(offset + name.len()),
                                ),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        found
    }

    fn imports_in(&self, doc: &Document) -> Vec<String> {
        match doc.language() {
            SupportedLanguage::JavaScript | SupportedLanguage::TypeScript => doc
                .tree()
                .map(|tree| self.script_imports(tree, doc.content(), doc.language()))
                .unwrap_or_default(),
            SupportedLanguage::Html => {
                let mut imports = Vec::new();
                for script in self.inline_scripts(doc) {
                    if let Some(tree) = self.reparse(SupportedLanguage::JavaScript, &script, None) {
                        for import in
                            self.script_imports(&tree, &script, SupportedLanguage::JavaScript)
                        {
                            if !imports.contains(&import) {
                                imports.push(import);
                            }
                        }
                    }
                }
                imports
            }
            SupportedLanguage::Css => Vec::new(),
        }
    }

    fn script_imports(
        &self,
        tree: &Tree,
        source: &str,
        language: SupportedLanguage,
    ) -> Vec<String> {
        let Ok(query) = self.queries.matcher(language, QueryKind::Exports) else {
            return Vec::new();
        };
        let capture_names = query.capture_names();
        let mut imports = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());
        while let Some(match_) = matches.next() {
            for capture in match_.captures {
                let name = capture_names[capture.index as usize];
                if !matches!(name, "import.source" | "import.dynamic" | "export.source") {
                    continue;
                }
                let raw = capture.node.utf8_text(source.as_bytes()).unwrap_or("");
                let normalized = normalize_module_path(raw);
                if !normalized.is_empty() && !imports.contains(&normalized) {
                    imports.push(normalized);
                }
            }
        }
        imports
    }

    fn inline_scripts(&self, doc: &Document) -> Vec<String> {
        let Some(tree) = doc.tree() else {
            return Vec::new();
        };
        let Ok(query) = self
            .queries
            .matcher(SupportedLanguage::Html, QueryKind::HtmlElements)
        else {
            return Vec::new();
        };
        let capture_names = query.capture_names();
        let source = doc.content();
        let mut scripts = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());
        while let Some(match_) = matches.next() {
            for capture in match_.captures {
                if capture_names[capture.index as usize] == "script.text" {
                    scripts.push(
                        capture
                            .node
                            .utf8_text(source.as_bytes())
                            .unwrap_or("")
                            .to_string(),
                    );
                }
            }
        }
        scripts
    }
}

/// Walk up from an attribute node to its start tag's name.
fn enclosing_tag_name(node: tree_sitter::Node<'_>, source: &str) -> Option<String> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(parent.kind(), "start_tag" | "self_closing_tag") {
            let mut walker = parent.walk();
            for child in parent.children(&mut walker) {
                if child.kind() == "tag_name" {
                    return child
                        .utf8_text(source.as_bytes())
                        .ok()
                        .map(str::to_string);
                }
            }
            return None;
        }
        current = parent.parent();
    }
    None
}

fn apply_range_edit(doc: &mut Document, range: Range, new_text: &str) {
    let start_byte = doc.line_index.offset_of(&doc.content, range.start);
    let old_end_byte = doc
        .line_index
        .offset_of(&doc.content, range.end)
        .max(start_byte);

    let start_position = doc.line_index.point_of(&doc.content, start_byte);
    let old_end_position = doc.line_index.point_of(&doc.content, old_end_byte);

    doc.content.replace_range(start_byte..old_end_byte, new_text);
    doc.line_index = LineIndex::new(&doc.content);

    let new_end_byte = start_byte + new_text.len();
    let new_end_position = doc.line_index.point_of(&doc.content, new_end_byte);

    if let Some(tree) = doc.tree.as_mut() {
        tree.edit(&InputEdit {
            start_byte,
            old_end_byte,
            new_end_byte,
            start_position,
            old_end_position,
            new_end_position,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
