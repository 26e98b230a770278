//! CEM language server: tower-lsp backend and feature handlers.
//!
//! The heavy lifting lives in `cemls-core`; this crate adapts it to the
//! editor protocol.

pub mod handlers;
pub mod server;

pub use server::Backend;
