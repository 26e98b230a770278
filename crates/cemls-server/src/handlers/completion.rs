//! Completion: map the analyzer's semantic context to completion items.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, MarkupContent, MarkupKind,
};

use cemls_core::{CompletionKind, Position, ServerContext};

/// Completion items for the context at `position`.
pub fn completion_items(
    context: &ServerContext,
    uri: &str,
    position: Position,
) -> Vec<CompletionItem> {
    let Some(analysis) = context.analyze_completion_context(uri, position) else {
        return Vec::new();
    };

    match analysis.kind {
        CompletionKind::TagName => tag_items(context, uri),
        CompletionKind::AttributeName => attribute_items(context, analysis.tag_name.as_deref()),
        CompletionKind::AttributeValue => value_items(
            context,
            analysis.tag_name.as_deref(),
            analysis.attribute_name.as_deref(),
        ),
        CompletionKind::LitEventBinding => event_items(context, analysis.tag_name.as_deref()),
        CompletionKind::LitPropertyBinding => property_items(context, analysis.tag_name.as_deref()),
        CompletionKind::LitBooleanAttribute => {
            boolean_attribute_items(context, analysis.tag_name.as_deref())
        }
        CompletionKind::Unknown => Vec::new(),
    }
}

/// All registry tags, with transitively available ones sorted first.
fn tag_items(context: &ServerContext, uri: &str) -> Vec<CompletionItem> {
    let available = context.tags_available_to_document(uri);

    context
        .registry()
        .all_tag_names()
        .iter()
        .map(|tag| {
            let element = context.element(tag);
            let in_scope = available.binary_search(tag).is_ok();
            CompletionItem {
                label: tag.clone(),
                kind: Some(CompletionItemKind::CLASS),
                detail: element.as_ref().map(|el| el.class_name.clone()),
                documentation: element
                    .as_ref()
                    .and_then(|el| el.description.clone())
                    .map(markdown),
                sort_text: Some(if in_scope {
                    format!("0{tag}")
                } else {
                    format!("1{tag}")
                }),
                ..Default::default()
            }
        })
        .collect()
}

fn attribute_items(context: &ServerContext, tag_name: Option<&str>) -> Vec<CompletionItem> {
    let Some(element) = tag_name.and_then(|tag| context.element(tag)) else {
        return Vec::new();
    };
    element
        .attributes
        .iter()
        .map(|attr| CompletionItem {
            label: attr.name.clone(),
            kind: Some(CompletionItemKind::FIELD),
            detail: attr.type_text.clone(),
            documentation: attr.description.clone().map(markdown),
            ..Default::default()
        })
        .collect()
}

/// Literal values of a union-typed attribute, e.g. `'earth' | 'wind'`.
fn value_items(
    context: &ServerContext,
    tag_name: Option<&str>,
    attribute_name: Option<&str>,
) -> Vec<CompletionItem> {
    let Some(element) = tag_name.and_then(|tag| context.element(tag)) else {
        return Vec::new();
    };
    let Some(attribute) = attribute_name.and_then(|name| element.attribute(name).cloned()) else {
        return Vec::new();
    };
    attribute
        .enum_values()
        .into_iter()
        .map(|value| CompletionItem {
            label: value,
            kind: Some(CompletionItemKind::ENUM_MEMBER),
            detail: attribute.type_text.clone(),
            ..Default::default()
        })
        .collect()
}

fn event_items(context: &ServerContext, tag_name: Option<&str>) -> Vec<CompletionItem> {
    let Some(element) = tag_name.and_then(|tag| context.element(tag)) else {
        return Vec::new();
    };
    element
        .events
        .iter()
        .map(|event| CompletionItem {
            label: event.name.clone(),
            kind: Some(CompletionItemKind::EVENT),
            detail: event.type_text.clone(),
            documentation: event.description.clone().map(markdown),
            ..Default::default()
        })
        .collect()
}

fn property_items(context: &ServerContext, tag_name: Option<&str>) -> Vec<CompletionItem> {
    let Some(element) = tag_name.and_then(|tag| context.element(tag)) else {
        return Vec::new();
    };
    element
        .properties
        .iter()
        .map(|property| CompletionItem {
            label: property.name.clone(),
            kind: Some(CompletionItemKind::PROPERTY),
            detail: property.type_text.clone(),
            documentation: property.description.clone().map(markdown),
            ..Default::default()
        })
        .collect()
}

fn boolean_attribute_items(context: &ServerContext, tag_name: Option<&str>) -> Vec<CompletionItem> {
    let Some(element) = tag_name.and_then(|tag| context.element(tag)) else {
        return Vec::new();
    };
    element
        .attributes
        .iter()
        .filter(|attr| attr.is_boolean())
        .map(|attr| CompletionItem {
            label: attr.name.clone(),
            kind: Some(CompletionItemKind::FIELD),
            detail: attr.type_text.clone(),
            documentation: attr.description.clone().map(markdown),
            ..Default::default()
        })
        .collect()
}

fn markdown(value: String) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}
