//! Feature handlers: thin clients of the core's `ServerContext`.

pub mod code_actions;
pub mod completion;
pub mod definition;
pub mod diagnostics;
pub mod hover;
