//! Completion context analysis driven through the document store, the way
//! feature handlers use it.

use std::sync::Arc;

use cemls_core::{CompletionKind, DocumentStore, ParserPool, Position};
use pretty_assertions::assert_eq;

fn store() -> DocumentStore {
    DocumentStore::new(Arc::new(ParserPool::new()))
}

#[test]
fn event_binding_after_sigil_in_tagged_template() {
    let store = store();
    let content = "const tpl = html`<my-el @`;";
    store.open("file:///panel.ts", content.to_string(), 1).unwrap();

    let cursor = Position::new(0, 25);
    let analysis = store
        .analyze_completion_context("file:///panel.ts", cursor)
        .unwrap();

    assert_eq!(analysis.kind, CompletionKind::LitEventBinding);
    assert!(analysis.in_tagged_template);
    assert_eq!(analysis.sigil, Some('@'));
    assert_eq!(analysis.tag_name.as_deref(), Some("my-el"));
    assert_eq!(analysis.line_content, content);
}

#[test]
fn kind_table_for_html_document() {
    let store = store();
    let content = "<my-el variant=\"ea\" dis></my-el>";
    store.open("file:///page.html", content.to_string(), 1).unwrap();

    let cases = [
        (Position::new(0, 4), CompletionKind::TagName),
        (Position::new(0, 10), CompletionKind::AttributeName),
        (Position::new(0, 18), CompletionKind::AttributeValue),
        (Position::new(0, 23), CompletionKind::AttributeName),
    ];
    for (position, expected) in cases {
        let analysis = store
            .analyze_completion_context("file:///page.html", position)
            .unwrap();
        assert_eq!(analysis.kind, expected, "at {position:?}");
        assert!(!analysis.in_tagged_template);
    }
}

#[test]
fn analysis_tracks_document_edits() {
    let store = store();
    store.open("file:///a.html", "<my-".to_string(), 1).unwrap();

    let analysis = store
        .analyze_completion_context("file:///a.html", Position::new(0, 4))
        .unwrap();
    assert_eq!(analysis.kind, CompletionKind::TagName);
    assert_eq!(analysis.tag_name.as_deref(), Some("my-"));

    store.update("file:///a.html", "<my-el ".to_string(), 2);
    let analysis = store
        .analyze_completion_context("file:///a.html", Position::new(0, 7))
        .unwrap();
    assert_eq!(analysis.kind, CompletionKind::AttributeName);
    assert_eq!(analysis.tag_name.as_deref(), Some("my-el"));
}

#[test]
fn css_documents_report_unknown() {
    let store = store();
    store
        .open("file:///style.css", ":host { color: var(--x); }".to_string(), 1)
        .unwrap();

    let analysis = store
        .analyze_completion_context("file:///style.css", Position::new(0, 20))
        .unwrap();
    assert_eq!(analysis.kind, CompletionKind::Unknown);
}

#[test]
fn unopened_document_has_no_analysis() {
    let store = store();
    assert!(store
        .analyze_completion_context("file:///ghost.html", Position::new(0, 0))
        .is_none());
}
