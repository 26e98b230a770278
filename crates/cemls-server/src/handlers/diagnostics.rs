//! Diagnostics: unknown tags, tags used without a reachable import, and
//! attributes a known element does not declare.
//!
//! Each diagnostic carries an autofix payload in its `data` field; the code
//! action handler turns it back into an edit.

use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range,
};

use cemls_core::{AutofixData, AutofixKind, ServerContext};

const SOURCE: &str = "cemls";

/// Global HTML attributes valid on any element.
const GLOBAL_ATTRIBUTES: &[&str] = &[
    "accesskey",
    "autofocus",
    "class",
    "contenteditable",
    "dir",
    "draggable",
    "hidden",
    "id",
    "inert",
    "lang",
    "part",
    "popover",
    "role",
    "slot",
    "spellcheck",
    "style",
    "tabindex",
    "title",
    "translate",
];

/// Diagnostics for one document.
pub fn diagnostics(context: &ServerContext, uri: &str) -> Vec<Diagnostic> {
    let registry = context.registry();
    if registry.is_empty() {
        // Without manifests every tag would be "unknown"; stay quiet.
        return Vec::new();
    }

    let used = context.documents().find_custom_elements(uri);
    if used.is_empty() {
        return Vec::new();
    }
    let available = context.tags_available_to_document(uri);

    let mut diagnostics = Vec::new();
    for element in used {
        let range = to_lsp_range(element.range);

        if !registry.has_tag(&element.tag_name) {
            let suggestion = closest_name(registry.all_tag_names(), &element.tag_name);
            let data = suggestion.map(|candidate| AutofixData {
                kind: AutofixKind::RenameTag,
                original: element.tag_name.clone(),
                suggestion: candidate.clone(),
                range: element.range,
                import_path: None,
                tag_name: Some(candidate),
            });

            diagnostics.push(Diagnostic {
                range,
                severity: Some(DiagnosticSeverity::WARNING),
                code: Some(NumberOrString::String("unknown-element".to_string())),
                source: Some(SOURCE.to_string()),
                message: format!("Unknown custom element <{}>", element.tag_name),
                data: data.map(|d| serde_json::Value::Object(d.to_map())),
                ..Default::default()
            });
            continue;
        }

        if available.binary_search(&element.tag_name).is_err() {
            let import_path = context
                .import_paths_for_tag(&element.tag_name)
                .into_iter()
                .next();
            let data = import_path.as_ref().map(|path| AutofixData {
                kind: AutofixKind::AddImport,
                original: element.tag_name.clone(),
                suggestion: format!("import '{path}';"),
                range: element.range,
                import_path: Some(path.clone()),
                tag_name: Some(element.tag_name.clone()),
            });

            diagnostics.push(Diagnostic {
                range,
                severity: Some(DiagnosticSeverity::WARNING),
                code: Some(NumberOrString::String("missing-import".to_string())),
                source: Some(SOURCE.to_string()),
                message: format!(
                    "Custom element <{}> is not imported by this document",
                    element.tag_name
                ),
                data: data.map(|d| serde_json::Value::Object(d.to_map())),
                ..Default::default()
            });
        }
    }

    diagnostics.extend(attribute_diagnostics(context, uri));
    diagnostics
}

/// Attributes on known elements that the manifest does not declare.
fn attribute_diagnostics(context: &ServerContext, uri: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for attribute in context.documents().find_attributes(uri) {
        let Some(element) = attribute
            .element
            .as_deref()
            .and_then(|tag| context.element(tag))
        else {
            continue;
        };
        if is_standard_attribute(&attribute.name)
            || attribute.name.starts_with(['@', '.', '?'])
            || element.attribute(&attribute.name).is_some()
        {
            continue;
        }

        let declared: Vec<String> = element.attributes.iter().map(|a| a.name.clone()).collect();
        let data = closest_name(&declared, &attribute.name).map(|candidate| AutofixData {
            kind: AutofixKind::RenameAttribute,
            original: attribute.name.clone(),
            suggestion: candidate,
            range: attribute.range,
            import_path: None,
            tag_name: Some(element.tag_name.clone()),
        });

        diagnostics.push(Diagnostic {
            range: to_lsp_range(attribute.range),
            severity: Some(DiagnosticSeverity::WARNING),
            code: Some(NumberOrString::String("unknown-attribute".to_string())),
            source: Some(SOURCE.to_string()),
            message: format!(
                "Unknown attribute '{}' on <{}>",
                attribute.name, element.tag_name
            ),
            data: data.map(|d| serde_json::Value::Object(d.to_map())),
            ..Default::default()
        });
    }

    diagnostics
}

/// Attributes that are valid on any element and never diagnosed: HTML
/// global attributes, `data-*`/`aria-*`, and event handler attributes.
fn is_standard_attribute(name: &str) -> bool {
    GLOBAL_ATTRIBUTES.contains(&name)
        || name.starts_with("data-")
        || name.starts_with("aria-")
        || name.starts_with("on")
}

fn to_lsp_range(range: cemls_core::Range) -> Range {
    Range {
        start: Position::new(range.start.line, range.start.character),
        end: Position::new(range.end.line, range.end.character),
    }
}

/// The known name closest to `unknown`, within a small edit distance.
fn closest_name(known: &[String], unknown: &str) -> Option<String> {
    known
        .iter()
        .map(|name| (edit_distance(name, unknown), name))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name.clone())
}

/// Levenshtein distance over a single-row table.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut previous_diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous_diagonal + usize::from(ca != cb);
            previous_diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(previous_diagonal + 1);
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("rh-tab", "rh-tab"), 0);
        assert_eq!(edit_distance("rh-tab", "rh-tap"), 1);
        assert_eq!(edit_distance("rh-tab", "rh-tabs"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn closest_name_respects_threshold() {
        let known = vec!["rh-tab".to_string(), "rh-card".to_string()];
        assert_eq!(closest_name(&known, "rh-tap"), Some("rh-tab".to_string()));
        assert_eq!(closest_name(&known, "completely-else"), None);
    }

    #[test]
    fn standard_attributes_are_never_diagnosed() {
        for name in ["id", "class", "slot", "data-index", "aria-label", "onclick"] {
            assert!(is_standard_attribute(name), "{name}");
        }
        assert!(!is_standard_attribute("varient"));
        assert!(!is_standard_attribute("active"));
    }
}
