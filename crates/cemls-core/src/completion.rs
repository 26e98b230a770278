//! Completion Context Analyzer
//!
//! Turns a cursor position into a semantic completion context: tag name,
//! attribute name, attribute value, or one of the Lit binding sigils
//! (`@event`, `.property`, `?boolean-attribute`). Sigil kinds are only
//! produced inside tagged template literals; an `innerHTML`-style string
//! still gets markup analysis but never the binding kinds.
//!
//! Analysis is a pure function of `(document content, position)`: it walks
//! the document's tree to locate the hosting template fragment, then scans
//! the markup before the cursor, which stays robust while the user is
//! mid-keystroke and the tree holds ERROR nodes.

use serde::{Deserialize, Serialize};
use tree_sitter::{QueryCursor, StreamingIterator};

use crate::documents::{Document, Position};
use crate::parser::SupportedLanguage;
use crate::queries::{QueryCache, QueryKind};

// ============================================================================
// Analysis Output
// ============================================================================

/// What the cursor is positioned to complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionKind {
    #[default]
    Unknown,
    /// Inside an opening-tag name or right after a bare `<`.
    TagName,
    /// Inside an element's attribute region, outside any value.
    AttributeName,
    /// Inside an attribute's quoted value.
    AttributeValue,
    /// Attribute name starting with `@` (tagged template only).
    LitEventBinding,
    /// Attribute name starting with `.` (tagged template only).
    LitPropertyBinding,
    /// Attribute name starting with `?` (tagged template only).
    LitBooleanAttribute,
}

/// The semantic context at a cursor position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAnalysis {
    pub kind: CompletionKind,
    /// Tag of the element being completed or hosting the attribute.
    pub tag_name: Option<String>,
    /// Attribute name at or before the cursor, without any sigil.
    pub attribute_name: Option<String>,
    /// Character immediately before the cursor.
    pub trigger_char: Option<String>,
    /// Full text of the cursor's line.
    pub line_content: String,
    /// Whether the cursor is inside a tagged template literal's HTML.
    pub in_tagged_template: bool,
    /// The binding sigil for the Lit kinds.
    pub sigil: Option<char>,
}

// ============================================================================
// Template Fragments
// ============================================================================

/// A template literal's content span within a TS/JS document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TemplateFragment {
    /// Byte offset of the first content byte (after the opening backtick).
    pub start: usize,
    /// Byte offset just past the last content byte.
    pub end: usize,
    /// Whether the literal is tagged with `html`.
    pub tagged: bool,
}

impl TemplateFragment {
    fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end
    }
}

/// Template literal fragments of a TS/JS document, innermost last.
pub(crate) fn template_fragments(
    document: &Document,
    queries: &QueryCache,
) -> Vec<TemplateFragment> {
    let Some(tree) = document.tree() else {
        return Vec::new();
    };
    let Ok(query) = queries.matcher(document.language(), QueryKind::TaggedTemplates) else {
        return Vec::new();
    };
    let capture_names = query.capture_names();
    let source = document.content().as_bytes();

    // A template string matches both the tagged pattern and the bare one;
    // aggregate per node so the tagged flag survives.
    let mut fragments: Vec<(usize, TemplateFragment)> = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);
    while let Some(match_) = matches.next() {
        let mut function_name = None;
        let mut literal = None;
        for capture in match_.captures {
            match capture_names[capture.index as usize] {
                "template.function" => {
                    function_name = capture.node.utf8_text(source).ok();
                }
                "template.literal" | "template.any" => literal = Some(capture.node),
                _ => {}
            }
        }

        let Some(node) = literal else { continue };
        let (start_byte, end_byte) = (node.start_byte(), node.end_byte());
        if end_byte <= start_byte + 1 {
            continue;
        }
        let fragment = TemplateFragment {
            start: start_byte + 1,
            end: end_byte.saturating_sub(1).max(start_byte + 1),
            tagged: function_name == Some("html"),
        };

        match fragments.iter_mut().find(|(id, _)| *id == node.id()) {
            Some((_, existing)) => existing.tagged |= fragment.tagged,
            None => fragments.push((node.id(), fragment)),
        }
    }

    fragments.into_iter().map(|(_, fragment)| fragment).collect()
}

// ============================================================================
// Analyzer
// ============================================================================

/// Analyze the completion context at `position`. Never mutates state.
pub fn analyze(
    document: &Document,
    position: Position,
    queries: &QueryCache,
) -> CompletionAnalysis {
    let offset = document.offset_of(position);
    let line_content = document.line_content(position.line).to_string();
    let trigger_char = document.content()[..offset]
        .chars()
        .next_back()
        .map(String::from);

    let base = CompletionAnalysis {
        line_content,
        trigger_char,
        ..Default::default()
    };

    match document.language() {
        SupportedLanguage::Html => {
            markup_context(document.content(), offset, false, base)
        }
        SupportedLanguage::JavaScript | SupportedLanguage::TypeScript => {
            // Innermost fragment containing the cursor wins.
            let fragment = template_fragments(document, queries)
                .into_iter()
                .filter(|f| f.contains(offset))
                .max_by_key(|f| f.start);
            match fragment {
                Some(fragment) => {
                    let text = &document.content()[fragment.start..fragment.end];
                    markup_context(text, offset - fragment.start, fragment.tagged, base)
                }
                None => base,
            }
        }
        SupportedLanguage::Css => base,
    }
}

/// Scan the markup before `offset` and classify the cursor context.
fn markup_context(
    text: &str,
    offset: usize,
    in_tagged_template: bool,
    mut analysis: CompletionAnalysis,
) -> CompletionAnalysis {
    analysis.in_tagged_template = in_tagged_template;

    let offset = offset.min(text.len());
    let before = &text[..offset];
    let Some(lt) = before.rfind('<') else {
        return analysis;
    };
    if let Some(gt) = before.rfind('>') {
        if gt > lt {
            // The last tag is closed; the cursor sits in text content.
            return analysis;
        }
    }

    let tag_region = &before[lt + 1..];

    // Closing tag: completing the tag name after `</`.
    if let Some(name) = tag_region.strip_prefix('/') {
        analysis.kind = CompletionKind::TagName;
        analysis.tag_name = non_empty(name);
        return analysis;
    }

    // Still inside the tag name: no whitespace since `<`.
    if !tag_region.contains(char::is_whitespace) {
        analysis.kind = CompletionKind::TagName;
        analysis.tag_name = non_empty(tag_region);
        return analysis;
    }

    let (tag_name, rest) = tag_region
        .split_once(char::is_whitespace)
        .expect("region contains whitespace");
    analysis.tag_name = non_empty(tag_name);

    // Walk the attribute region tracking quote state, the attribute a value
    // belongs to, and the word under the cursor.
    let mut in_quote: Option<char> = None;
    let mut value_attribute = String::new();
    let mut current_word = String::new();
    for ch in rest.chars() {
        match in_quote {
            Some(quote) if ch == quote => {
                in_quote = None;
                current_word.clear();
            }
            Some(_) => {}
            None => match ch {
                '"' | '\'' => in_quote = Some(ch),
                '=' => {
                    value_attribute = current_word.clone();
                    current_word.clear();
                }
                c if c.is_whitespace() => current_word.clear(),
                c => current_word.push(c),
            },
        }
    }

    if in_quote.is_some() {
        analysis.kind = CompletionKind::AttributeValue;
        analysis.attribute_name = non_empty(strip_sigil(&value_attribute).1);
        return analysis;
    }

    let (sigil, bare) = strip_sigil(&current_word);
    match sigil {
        Some(sigil) if in_tagged_template => {
            analysis.kind = match sigil {
                '@' => CompletionKind::LitEventBinding,
                '.' => CompletionKind::LitPropertyBinding,
                _ => CompletionKind::LitBooleanAttribute,
            };
            analysis.sigil = Some(sigil);
            analysis.attribute_name = non_empty(bare);
        }
        _ => {
            analysis.kind = CompletionKind::AttributeName;
            analysis.attribute_name = non_empty(&current_word);
        }
    }
    analysis
}

fn strip_sigil(word: &str) -> (Option<char>, &str) {
    match word.chars().next() {
        Some(sigil @ ('@' | '.' | '?')) => (Some(sigil), &word[sigil.len_utf8()..]),
        _ => (None, word),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentStore;
    use crate::parser::ParserPool;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn analyze_at(uri: &str, content: &str, position: Position) -> CompletionAnalysis {
        let store = DocumentStore::new(Arc::new(ParserPool::new()));
        store.open(uri, content.to_string(), 1).unwrap();
        store.analyze_completion_context(uri, position).unwrap()
    }

    #[test]
    fn bare_angle_bracket_is_tag_name() {
        let analysis = analyze_at("file:///a.html", "<", Position::new(0, 1));
        assert_eq!(analysis.kind, CompletionKind::TagName);
        assert_eq!(analysis.tag_name, None);
        assert_eq!(analysis.trigger_char.as_deref(), Some("<"));
        assert!(!analysis.in_tagged_template);
    }

    #[test]
    fn partial_tag_name() {
        let analysis = analyze_at("file:///a.html", "<my-ta", Position::new(0, 6));
        assert_eq!(analysis.kind, CompletionKind::TagName);
        assert_eq!(analysis.tag_name.as_deref(), Some("my-ta"));
    }

    #[test]
    fn closing_tag_name() {
        let analysis = analyze_at("file:///a.html", "<my-el></my-", Position::new(0, 12));
        assert_eq!(analysis.kind, CompletionKind::TagName);
        assert_eq!(analysis.tag_name.as_deref(), Some("my-"));
    }

    #[test]
    fn attribute_region_after_whitespace() {
        let analysis = analyze_at("file:///a.html", "<my-el ", Position::new(0, 7));
        assert_eq!(analysis.kind, CompletionKind::AttributeName);
        assert_eq!(analysis.tag_name.as_deref(), Some("my-el"));
        assert_eq!(analysis.attribute_name, None);
    }

    #[test]
    fn partial_attribute_name() {
        let analysis = analyze_at("file:///a.html", "<my-el acti", Position::new(0, 11));
        assert_eq!(analysis.kind, CompletionKind::AttributeName);
        assert_eq!(analysis.attribute_name.as_deref(), Some("acti"));
    }

    #[test]
    fn inside_quoted_attribute_value() {
        let analysis = analyze_at("file:///a.html", "<my-el variant=\"ea", Position::new(0, 18));
        assert_eq!(analysis.kind, CompletionKind::AttributeValue);
        assert_eq!(analysis.tag_name.as_deref(), Some("my-el"));
        assert_eq!(analysis.attribute_name.as_deref(), Some("variant"));
    }

    #[test]
    fn second_attribute_after_closed_value() {
        let analysis = analyze_at(
            "file:///a.html",
            "<my-el variant=\"earth\" dis",
            Position::new(0, 26),
        );
        assert_eq!(analysis.kind, CompletionKind::AttributeName);
        assert_eq!(analysis.attribute_name.as_deref(), Some("dis"));
    }

    #[test]
    fn text_content_is_unknown() {
        let analysis = analyze_at("file:///a.html", "<my-el>hello ", Position::new(0, 13));
        assert_eq!(analysis.kind, CompletionKind::Unknown);
    }

    #[test]
    fn event_binding_in_tagged_template() {
        let analysis = analyze_at(
            "file:///a.ts",
            "const tpl = html`<my-el @`;",
            Position::new(0, 25),
        );
        assert_eq!(analysis.kind, CompletionKind::LitEventBinding);
        assert!(analysis.in_tagged_template);
        assert_eq!(analysis.sigil, Some('@'));
        assert_eq!(analysis.tag_name.as_deref(), Some("my-el"));
        assert_eq!(analysis.attribute_name, None);
    }

    #[test]
    fn property_binding_with_partial_name() {
        let analysis = analyze_at(
            "file:///a.ts",
            "html`<my-el .activeIn`",
            Position::new(0, 21),
        );
        assert_eq!(analysis.kind, CompletionKind::LitPropertyBinding);
        assert_eq!(analysis.sigil, Some('.'));
        assert_eq!(analysis.attribute_name.as_deref(), Some("activeIn"));
    }

    #[test]
    fn boolean_attribute_binding() {
        let analysis = analyze_at("file:///a.ts", "html`<my-el ?hid`", Position::new(0, 16));
        assert_eq!(analysis.kind, CompletionKind::LitBooleanAttribute);
        assert_eq!(analysis.sigil, Some('?'));
        assert_eq!(analysis.attribute_name.as_deref(), Some("hid"));
    }

    #[test]
    fn sigils_disabled_outside_tagged_templates() {
        // An untagged template string hosts markup but not bindings.
        let analysis = analyze_at(
            "file:///a.ts",
            "el.innerHTML = `<my-el @`;",
            Position::new(0, 24),
        );
        assert_eq!(analysis.kind, CompletionKind::AttributeName);
        assert!(!analysis.in_tagged_template);
        assert_eq!(analysis.sigil, None);
        assert_eq!(analysis.attribute_name.as_deref(), Some("@"));
    }

    #[test]
    fn cursor_outside_any_template_is_unknown() {
        let analysis = analyze_at(
            "file:///a.ts",
            "const x = 1; html`<my-el>`",
            Position::new(0, 8),
        );
        assert_eq!(analysis.kind, CompletionKind::Unknown);
        assert!(!analysis.in_tagged_template);
    }

    #[test]
    fn analysis_is_pure() {
        let store = DocumentStore::new(Arc::new(ParserPool::new()));
        store
            .open("file:///a.html", "<my-el acti".to_string(), 1)
            .unwrap();
        let first = store
            .analyze_completion_context("file:///a.html", Position::new(0, 11))
            .unwrap();
        let second = store
            .analyze_completion_context("file:///a.html", Position::new(0, 11))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn line_content_is_reported() {
        let analysis = analyze_at(
            "file:///a.html",
            "<div>\n<my-el ac\n</div>",
            Position::new(1, 9),
        );
        assert_eq!(analysis.line_content, "<my-el ac");
        assert_eq!(analysis.kind, CompletionKind::AttributeName);
    }
}
