//! Code actions: turn diagnostic autofix payloads back into edits.

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Diagnostic, Position, Range, TextEdit, Url,
    WorkspaceEdit,
};

use cemls_core::{AutofixData, AutofixKind, ServerContext};

/// Actions for the diagnostics the editor sent back.
pub fn code_actions(
    context: &ServerContext,
    uri: &Url,
    diagnostics: &[Diagnostic],
) -> Vec<CodeActionOrCommand> {
    diagnostics
        .iter()
        .filter_map(|diagnostic| {
            let data = diagnostic.data.as_ref()?;
            let autofix = AutofixData::from_value(data)?;
            let action = match autofix.kind {
                AutofixKind::AddImport => add_import_action(context, uri, &autofix)?,
                AutofixKind::RenameTag => rename_tag_action(uri, &autofix)?,
                AutofixKind::RenameAttribute => rename_action(
                    uri,
                    &autofix,
                    format!("Rename attribute to '{}'", autofix.suggestion),
                ),
            };
            Some(CodeActionOrCommand::CodeAction(CodeAction {
                diagnostics: Some(vec![diagnostic.clone()]),
                ..action
            }))
        })
        .collect()
}

/// Insert the import that makes the diagnosed tag available.
///
/// TS/JS documents get a bare import statement at the top; HTML documents
/// get a module script.
fn add_import_action(
    context: &ServerContext,
    uri: &Url,
    autofix: &AutofixData,
) -> Option<CodeAction> {
    let import_path = autofix.import_path.as_deref()?;
    let is_html = uri.path().ends_with(".html") || uri.path().ends_with(".htm");

    let new_text = if is_html {
        format!("<script type=\"module\">import '{import_path}';</script>\n")
    } else {
        format!("import '{import_path}';\n")
    };

    // Keep imports grouped: insert after the last existing import line.
    let insert_line = context
        .documents()
        .snapshot(uri.as_str())
        .map(|(content, _)| last_import_line(&content, is_html))
        .unwrap_or(0);

    let edit = TextEdit {
        range: Range::new(
            Position::new(insert_line, 0),
            Position::new(insert_line, 0),
        ),
        new_text,
    };

    Some(action(
        format!("Import '{import_path}'"),
        uri.clone(),
        edit,
        CodeActionKind::QUICKFIX,
    ))
}

fn rename_tag_action(uri: &Url, autofix: &AutofixData) -> Option<CodeAction> {
    Some(rename_action(
        uri,
        autofix,
        format!("Change to <{}>", autofix.suggestion),
    ))
}

/// Replace the diagnosed range with the suggestion.
fn rename_action(uri: &Url, autofix: &AutofixData, title: String) -> CodeAction {
    let edit = TextEdit {
        range: Range::new(
            Position::new(autofix.range.start.line, autofix.range.start.character),
            Position::new(autofix.range.end.line, autofix.range.end.character),
        ),
        new_text: autofix.suggestion.clone(),
    };
    action(title, uri.clone(), edit, CodeActionKind::QUICKFIX)
}

fn action(title: String, uri: Url, edit: TextEdit, kind: CodeActionKind) -> CodeAction {
    let mut changes = HashMap::new();
    changes.insert(uri, vec![edit]);
    CodeAction {
        title,
        kind: Some(kind),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Line number just past the last top-of-file import, so inserted imports
/// stay grouped. Zero for HTML (the script lands before the markup).
fn last_import_line(content: &str, is_html: bool) -> u32 {
    if is_html {
        return 0;
    }
    let mut line = 0;
    for (index, text) in content.lines().enumerate() {
        let trimmed = text.trim_start();
        if trimmed.starts_with("import ") || trimmed.starts_with("import'") {
            line = index as u32 + 1;
        }
    }
    line
}
