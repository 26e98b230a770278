//! Handler pipeline tests: diagnostics with autofix payloads, code
//! actions, and completion against a registry-backed context.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tower_lsp::lsp_types::{CodeActionOrCommand, NumberOrString, Url};

use cemls_core::manifest::{
    CemAttribute, CemDeclaration, CemModule, CemPackage, CemType, LoadedManifest,
};
use cemls_core::{CemRegistry, Position, ServerContext};
use cemls_server::handlers;

fn context() -> ServerContext {
    let manifest = LoadedManifest {
        package_name: Some("@kit/cards".to_string()),
        manifest_path: "custom-elements.json".into(),
        package: CemPackage {
            schema_version: "1.0.0".to_string(),
            readme: None,
            modules: vec![CemModule {
                kind: "javascript-module".to_string(),
                path: "my-card/my-card.js".to_string(),
                declarations: vec![CemDeclaration {
                    kind: "class".to_string(),
                    name: "MyCard".to_string(),
                    tag_name: Some("my-card".to_string()),
                    custom_element: true,
                    description: Some("A card".to_string()),
                    attributes: vec![CemAttribute {
                        name: "variant".to_string(),
                        type_info: Some(CemType {
                            text: "'flat' | 'raised'".to_string(),
                        }),
                        ..Default::default()
                    }],
                    css_properties: vec![cemls_core::manifest::CemCssProperty {
                        name: "--my-card-padding".to_string(),
                        syntax: Some("<length>".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                exports: Vec::new(),
            }],
        },
    };
    let registry = Arc::new(CemRegistry::from_manifests(&[manifest]));
    ServerContext::builder().registry(registry).build()
}

#[test]
fn missing_import_diagnostic_carries_autofix() {
    let context = context();
    context
        .documents()
        .open("file:///ws/page.html", "<my-card></my-card>".to_string(), 1)
        .unwrap();

    let diagnostics = handlers::diagnostics::diagnostics(&context, "file:///ws/page.html");
    // Open and close tag usages both diagnose.
    assert_eq!(diagnostics.len(), 2);
    let diagnostic = &diagnostics[0];
    assert_eq!(
        diagnostic.code,
        Some(NumberOrString::String("missing-import".to_string()))
    );
    assert!(diagnostic.message.contains("<my-card>"));
    assert!(diagnostic.data.is_some());
}

#[test]
fn imported_tag_produces_no_diagnostics() {
    let context = context();
    context
        .documents()
        .open(
            "file:///ws/page.html",
            "<script type=\"module\">import 'my-card/my-card.js';</script><my-card></my-card>"
                .to_string(),
            1,
        )
        .unwrap();

    let diagnostics = handlers::diagnostics::diagnostics(&context, "file:///ws/page.html");
    assert_eq!(diagnostics, vec![]);
}

#[test]
fn unknown_tag_suggests_close_match() {
    let context = context();
    context
        .documents()
        .open("file:///ws/page.html", "<my-carb></my-carb>".to_string(), 1)
        .unwrap();

    let diagnostics = handlers::diagnostics::diagnostics(&context, "file:///ws/page.html");
    assert!(!diagnostics.is_empty());
    assert_eq!(
        diagnostics[0].code,
        Some(NumberOrString::String("unknown-element".to_string()))
    );

    let uri = Url::parse("file:///ws/page.html").unwrap();
    let actions = handlers::code_actions::code_actions(&context, &uri, &diagnostics);
    let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
        panic!("expected a code action");
    };
    assert_eq!(action.title, "Change to <my-card>");
}

#[test]
fn add_import_action_inserts_script_for_html() {
    let context = context();
    context
        .documents()
        .open("file:///ws/page.html", "<my-card></my-card>".to_string(), 1)
        .unwrap();

    let diagnostics = handlers::diagnostics::diagnostics(&context, "file:///ws/page.html");
    let uri = Url::parse("file:///ws/page.html").unwrap();
    let actions = handlers::code_actions::code_actions(&context, &uri, &diagnostics);
    assert!(!actions.is_empty());

    let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
        panic!("expected a code action");
    };
    assert_eq!(action.title, "Import 'my-card/my-card.js'");
    let edit = action.edit.as_ref().unwrap();
    let edits = edit
        .changes
        .as_ref()
        .unwrap()
        .get(&uri)
        .expect("edit targets the document");
    assert!(edits[0].new_text.contains("<script type=\"module\">"));
    assert!(edits[0].new_text.contains("my-card/my-card.js"));
}

#[test]
fn tag_completion_offers_registry_tags() {
    let context = context();
    context
        .documents()
        .open("file:///ws/page.html", "<my-".to_string(), 1)
        .unwrap();

    let items =
        handlers::completion::completion_items(&context, "file:///ws/page.html", Position::new(0, 4));
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "my-card");
}

#[test]
fn unknown_attribute_suggests_declared_one() {
    let context = context();
    context
        .documents()
        .open(
            "file:///ws/page.html",
            "<script type=\"module\">import 'my-card/my-card.js';</script>\n\
             <my-card varient=\"flat\" id=\"hero\" data-index=\"1\"></my-card>"
                .to_string(),
            1,
        )
        .unwrap();

    let diagnostics = handlers::diagnostics::diagnostics(&context, "file:///ws/page.html");
    // The typo diagnoses; the global and data- attributes do not.
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].code,
        Some(NumberOrString::String("unknown-attribute".to_string()))
    );
    assert!(diagnostics[0].message.contains("'varient'"));

    let uri = Url::parse("file:///ws/page.html").unwrap();
    let actions = handlers::code_actions::code_actions(&context, &uri, &diagnostics);
    let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
        panic!("expected a code action");
    };
    assert_eq!(action.title, "Rename attribute to 'variant'");
    let edits = action
        .edit
        .as_ref()
        .unwrap()
        .changes
        .as_ref()
        .unwrap()
        .get(&uri)
        .unwrap();
    assert_eq!(edits[0].new_text, "variant");
}

#[test]
fn css_hover_names_declaring_elements() {
    let context = context();
    context
        .documents()
        .open(
            "file:///ws/theme.css",
            ".card { padding: var(--my-card-padding); }".to_string(),
            1,
        )
        .unwrap();

    let hover = handlers::hover::hover(&context, "file:///ws/theme.css", Position::new(0, 24))
        .expect("hover on the var() usage");
    let tower_lsp::lsp_types::HoverContents::Markup(markup) = hover.contents else {
        panic!("expected markup hover");
    };
    assert!(markup.value.contains("--my-card-padding"));
    assert!(markup.value.contains("<my-card>"));
}

#[test]
fn attribute_value_completion_offers_enum_values() {
    let context = context();
    context
        .documents()
        .open(
            "file:///ws/page.html",
            "<my-card variant=\"".to_string(),
            1,
        )
        .unwrap();

    let items = handlers::completion::completion_items(
        &context,
        "file:///ws/page.html",
        Position::new(0, 18),
    );
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["flat", "raised"]);
}
