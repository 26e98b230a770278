//! Go-to-definition: from a tag usage to the module that declares it.

use tower_lsp::lsp_types::{GotoDefinitionResponse, Location, Range, Url};

use cemls_core::{Position, ServerContext};

/// Definition of the element under the cursor.
///
/// Resolves the element's manifest module path to a workspace source file.
/// Re-export chains are transparent here: the manifest names the defining
/// module, not the re-exporter.
pub fn definition(
    context: &ServerContext,
    uri: &str,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let found = context.documents().find_element_at_position(uri, position)?;
    let file = context.definition_file_for_tag(&found.tag_name)?;
    let target = Url::from_file_path(&file).ok()?;

    Some(GotoDefinitionResponse::Scalar(Location {
        uri: target,
        range: Range::default(),
    }))
}
