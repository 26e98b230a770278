//! The tower-lsp backend.
//!
//! Feature handlers live in [`crate::handlers`] and are thin clients of the
//! core's `ServerContext`; this module owns the protocol lifecycle, the
//! type conversions at the protocol edge, and the recovery boundary around
//! every feature entry point.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{info, warn};

use cemls_config::{CemConfig, ConfigLoader, ConfigOverrides};
use cemls_core::{
    discover_manifests, guarded, CemPackage, CemRegistry, InternalError, LoadedManifest,
    ServerContext, TextChange,
};

use crate::handlers;

/// Languages the server registers interest in.
const SUPPORTED_EXTENSIONS: &[&str] = &["html", "htm", "js", "mjs", "cjs", "ts", "tsx", "css"];

pub struct Backend {
    client: Client,
    context: RwLock<Option<Arc<ServerContext>>>,
    workspace_override: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl Backend {
    pub fn new(
        client: Client,
        workspace_override: Option<PathBuf>,
        overrides: ConfigOverrides,
    ) -> Self {
        Self {
            client,
            context: RwLock::new(None),
            workspace_override,
            overrides,
        }
    }

    fn context(&self) -> Result<Arc<ServerContext>> {
        self.context
            .read()
            .clone()
            .ok_or_else(|| Error::invalid_request())
    }

    /// Load config and manifests and wire the core together.
    fn build_context(&self, workspace_root: &std::path::Path) -> Arc<ServerContext> {
        let config = ConfigLoader::new()
            .load(workspace_root, Some(&self.overrides))
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default configuration");
                CemConfig::default()
            });

        let mut manifests =
            discover_manifests(workspace_root, config.analysis.skip_node_modules);
        for extra in &config.analysis.manifests {
            let path = workspace_root.join(extra);
            match CemPackage::load(&path) {
                Ok(package) => manifests.push(LoadedManifest {
                    package_name: None,
                    manifest_path: path,
                    package,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping configured manifest"),
            }
        }

        let registry = Arc::new(CemRegistry::from_manifests(&manifests));
        info!(
            elements = registry.len(),
            manifests = manifests.len(),
            root = %workspace_root.display(),
            "workspace indexed"
        );

        Arc::new(
            ServerContext::builder()
                .registry(registry)
                .workspace_root(workspace_root.to_path_buf())
                .max_transitive_depth(config.analysis.max_transitive_depth)
                .build(),
        )
    }

    async fn publish_diagnostics(&self, uri: Url) {
        let Ok(context) = self.context() else { return };
        let diagnostics = guarded("textDocument/publishDiagnostics", || {
            handlers::diagnostics::diagnostics(&context, uri.as_str())
        })
        .unwrap_or_default();
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }
}

fn to_core_position(position: Position) -> cemls_core::Position {
    cemls_core::Position::new(position.line, position.character)
}

fn to_core_range(range: Range) -> cemls_core::Range {
    cemls_core::Range::new(to_core_position(range.start), to_core_position(range.end))
}

fn internal_error(err: InternalError) -> Error {
    let mut error = Error::internal_error();
    error.message = err.to_string().into();
    error
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = self
            .workspace_override
            .clone()
            .or_else(|| {
                params
                    .workspace_folders
                    .as_ref()
                    .and_then(|folders| folders.first())
                    .and_then(|folder| folder.uri.to_file_path().ok())
            })
            .or_else(|| {
                #[allow(deprecated)]
                let root = params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok());
                root
            })
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let context = guarded("initialize", || self.build_context(&workspace_root))
            .map_err(internal_error)?;
        *self.context.write() = Some(context);

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "cemls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        ["<", "@", ".", "?", "\"", "'", " ", "/"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    ),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!("cemls initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let Ok(context) = self.context() else { return };
        let doc = params.text_document;
        let uri = doc.uri.clone();

        if !uri_is_supported(&uri) {
            return;
        }
        if let Err(e) = context
            .documents()
            .open(uri.as_str(), doc.text, doc.version)
        {
            warn!(uri = %uri, error = %e, "failed to open document");
            return;
        }
        self.publish_diagnostics(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Ok(context) = self.context() else { return };
        let uri = params.text_document.uri.clone();

        let changes: Vec<TextChange> = params
            .content_changes
            .into_iter()
            .map(|change| TextChange {
                range: change.range.map(to_core_range),
                text: change.text,
            })
            .collect();

        let applied = context.documents().update_with_changes(
            uri.as_str(),
            params.text_document.version,
            &changes,
        );
        if applied {
            self.publish_diagnostics(uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let Ok(context) = self.context() else { return };
        let uri = params.text_document.uri;
        context.documents().close(uri.as_str());
        // Clear stale diagnostics for the closed document.
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let context = self.context()?;
        let uri = params.text_document_position.text_document.uri;
        let position = to_core_position(params.text_document_position.position);

        let items = guarded("textDocument/completion", || {
            handlers::completion::completion_items(&context, uri.as_str(), position)
        })
        .map_err(internal_error)?;

        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let context = self.context()?;
        let uri = params.text_document_position_params.text_document.uri;
        let position = to_core_position(params.text_document_position_params.position);

        guarded("textDocument/hover", || {
            handlers::hover::hover(&context, uri.as_str(), position)
        })
        .map_err(internal_error)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let context = self.context()?;
        let uri = params.text_document_position_params.text_document.uri;
        let position = to_core_position(params.text_document_position_params.position);

        guarded("textDocument/definition", || {
            handlers::definition::definition(&context, uri.as_str(), position)
        })
        .map_err(internal_error)
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let context = self.context()?;
        let uri = params.text_document.uri;

        let actions = guarded("textDocument/codeAction", || {
            handlers::code_actions::code_actions(&context, &uri, &params.context.diagnostics)
        })
        .map_err(internal_error)?;

        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }
}

fn uri_is_supported(uri: &Url) -> bool {
    let path = uri.path();
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{ext}")))
}
