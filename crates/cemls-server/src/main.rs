//! The `cemls` binary: a stdio language server for HTML documents using
//! custom elements declared in Custom Elements Manifests.

use std::path::PathBuf;

use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use cemls_config::ConfigOverrides;
use cemls_server::Backend;

#[derive(Debug, Parser)]
#[command(name = "cemls", version, about = "Custom Elements Manifest language server")]
struct Args {
    /// Workspace root; defaults to the root the editor announces.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, env = "CEMLS_LOG")]
    log_level: Option<String>,

    /// Skip scanning node_modules for installed package manifests.
    #[arg(long)]
    skip_node_modules: bool,

    /// Communicate over stdio (the only supported transport).
    #[arg(long, default_value_t = true)]
    stdio: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if !args.stdio {
        anyhow::bail!("only the stdio transport is supported");
    }

    // The protocol owns stdout, so logs go to stderr.
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let overrides = ConfigOverrides {
        log_level: args.log_level.clone(),
        max_transitive_depth: None,
        skip_node_modules: args.skip_node_modules.then_some(true),
    };

    let (service, socket) = LspService::new(|client| {
        Backend::new(client, args.workspace.clone(), overrides.clone())
    });
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;

    Ok(())
}
