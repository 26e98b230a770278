//! Hover: element and attribute documentation from the registry.

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind};

use cemls_core::{ElementDeclaration, Position, ServerContext};

/// Hover content for the element, attribute, or CSS custom property under
/// the cursor.
pub fn hover(context: &ServerContext, uri: &str, position: Position) -> Option<Hover> {
    if uri.ends_with(".css") {
        return css_property_hover(context, uri, position);
    }

    // Attribute name takes priority: its token is inside the element's tag.
    if let Some(attribute) = context.documents().find_attribute_at_position(uri, position) {
        if let Some(element) = attribute.element.as_deref().and_then(|tag| context.element(tag)) {
            if let Some(info) = element.attribute(&attribute.name) {
                let mut text = format!("`{}` — attribute of `<{}>`", info.name, element.tag_name);
                if let Some(type_text) = &info.type_text {
                    text.push_str(&format!("\n\nType: `{type_text}`"));
                }
                if let Some(default) = &info.default {
                    text.push_str(&format!("\n\nDefault: `{default}`"));
                }
                if let Some(description) = &info.description {
                    text.push_str("\n\n");
                    text.push_str(description);
                }
                return Some(markdown_hover(text));
            }
        }
    }

    let found = context.documents().find_element_at_position(uri, position)?;
    let element = context.element(&found.tag_name)?;
    Some(markdown_hover(element_summary(context, &element)))
}

fn element_summary(context: &ServerContext, element: &ElementDeclaration) -> String {
    let mut text = format!("## `<{}>`\n\n`{}`", element.tag_name, element.class_name);
    if let Some(description) = &element.description {
        text.push_str("\n\n");
        text.push_str(description);
    }

    if !element.attributes.is_empty() {
        text.push_str("\n\n### Attributes\n");
        for attr in &element.attributes {
            match &attr.type_text {
                Some(type_text) => {
                    text.push_str(&format!("\n- `{}`: `{}`", attr.name, type_text))
                }
                None => text.push_str(&format!("\n- `{}`", attr.name)),
            }
        }
    }

    if !element.slots.is_empty() {
        text.push_str("\n\n### Slots\n");
        for slot in &element.slots {
            if slot.name.is_empty() {
                text.push_str("\n- *(default)*");
            } else {
                text.push_str(&format!("\n- `{}`", slot.name));
            }
        }
    }

    if !element.events.is_empty() {
        text.push_str("\n\n### Events\n");
        for event in &element.events {
            text.push_str(&format!("\n- `{}`", event.name));
        }
    }

    if !element.css_properties.is_empty() {
        text.push_str("\n\n### CSS Properties\n");
        for property in &element.css_properties {
            text.push_str(&format!("\n- `{}`", property.name));
        }
    }

    let related = context.relationships(&element.tag_name);
    if !related.is_empty() {
        text.push_str("\n\n### Related\n");
        for relationship in related {
            text.push_str(&format!(
                "\n- `<{}>` ({})",
                relationship.target,
                relationship.kind.as_str()
            ));
        }
    }

    text
}

/// Which elements style themselves through the custom property under the
/// cursor.
fn css_property_hover(context: &ServerContext, uri: &str, position: Position) -> Option<Hover> {
    let property = context
        .documents()
        .find_css_custom_properties(uri)
        .into_iter()
        .find(|p| p.range.contains(position))?;

    let tags = context.registry().elements_with_css_property(&property.name);
    if tags.is_empty() {
        return None;
    }

    let mut text = format!("`{}`\n\nDeclared by:", property.name);
    for tag in tags {
        let syntax = context
            .element(&tag)
            .and_then(|el| {
                el.css_properties
                    .iter()
                    .find(|p| p.name == property.name)
                    .and_then(|p| p.syntax.clone())
            })
            .map(|syntax| format!(" — `{syntax}`"))
            .unwrap_or_default();
        text.push_str(&format!("\n- `<{tag}>`{syntax}"));
    }
    Some(markdown_hover(text))
}

fn markdown_hover(value: String) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: None,
    }
}
