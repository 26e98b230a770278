//! Export tracking for the module graph.
//!
//! Maps module paths to the custom element exports they surface, and tag
//! names back to the set of modules that expose them (directly or through a
//! re-export). Thread-safe via an internal reader/writer lock; every reader
//! returns a defensive copy so no reference outlives the lock.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ============================================================================
// Module Exports
// ============================================================================

/// How a module surfaces an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// `export class X` / a `customElements.define` registration.
    Named,
    /// `export default X`.
    Default,
    /// `export * as ns from '...'`.
    Namespace,
    /// `export { X } from '...'`.
    Reexport,
}

impl ExportKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Named => "named",
            ExportKind::Default => "default",
            ExportKind::Namespace => "namespace",
            ExportKind::Reexport => "reexport",
        }
    }
}

/// A custom element export surfaced by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleExport {
    /// Exported class name.
    pub element_name: String,
    /// Custom element tag name.
    pub tag_name: String,
    /// Export flavor.
    pub kind: ExportKind,
    /// Module the export is re-exported from. Present iff `kind` is
    /// [`ExportKind::Reexport`].
    pub source_module: Option<String>,
}

// ============================================================================
// Export Tracker
// ============================================================================

#[derive(Debug, Default)]
struct ExportTrackerInner {
    /// module path -> exports surfaced by that module
    module_exports: HashMap<String, Vec<ModuleExport>>,
    /// tag name -> modules that expose the tag (direct or re-export)
    element_sources: HashMap<String, Vec<String>>,
}

/// Thread-safe mapping of modules to their custom element exports.
///
/// All setters are idempotent per `(module, tag)` pair and silently reject
/// empty or blank inputs. All getters return defensive copies.
#[derive(Debug, Default)]
pub struct ExportTracker {
    inner: RwLock<ExportTrackerInner>,
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

impl ExportTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `module` defines `tag_name` with class `class_name`.
    ///
    /// Idempotent: recording the same `(module, tag)` pair again has no
    /// effect. Blank inputs are silently rejected.
    pub fn add_direct_export(&self, module: &str, class_name: &str, tag_name: &str) {
        if is_blank(module) || is_blank(class_name) || is_blank(tag_name) {
            return;
        }

        let mut inner = self.inner.write();
        let exports = inner.module_exports.entry(module.to_string()).or_default();
        if !exports.iter().any(|e| e.tag_name == tag_name) {
            exports.push(ModuleExport {
                element_name: class_name.to_string(),
                tag_name: tag_name.to_string(),
                kind: ExportKind::Named,
                source_module: None,
            });
        }
        push_unique(
            inner.element_sources.entry(tag_name.to_string()).or_default(),
            module,
        );
    }

    /// Record that `re_exporter` surfaces `tag_name` from `source`.
    ///
    /// Both `re_exporter` and `source` become sources for `tag_name`.
    pub fn add_re_export(&self, re_exporter: &str, source: &str, class_name: &str, tag_name: &str) {
        if is_blank(re_exporter) || is_blank(source) || is_blank(class_name) || is_blank(tag_name) {
            return;
        }

        let mut inner = self.inner.write();
        let exports = inner
            .module_exports
            .entry(re_exporter.to_string())
            .or_default();
        if !exports.iter().any(|e| e.tag_name == tag_name) {
            exports.push(ModuleExport {
                element_name: class_name.to_string(),
                tag_name: tag_name.to_string(),
                kind: ExportKind::Reexport,
                source_module: Some(source.to_string()),
            });
        }

        let sources = inner.element_sources.entry(tag_name.to_string()).or_default();
        push_unique(sources, source);
        push_unique(sources, re_exporter);
    }

    /// Record `module` as an additional source for `tag_name`.
    ///
    /// Used by re-export chain resolution; deduplicating append.
    pub fn add_element_source(&self, tag_name: &str, module: &str) {
        if is_blank(tag_name) || is_blank(module) {
            return;
        }

        let mut inner = self.inner.write();
        push_unique(
            inner.element_sources.entry(tag_name.to_string()).or_default(),
            module,
        );
    }

    /// Modules that expose `tag_name`, in insertion order.
    pub fn element_sources(&self, tag_name: &str) -> Vec<String> {
        self.inner
            .read()
            .element_sources
            .get(tag_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Exports surfaced by `module`.
    pub fn module_exports(&self, module: &str) -> Vec<ModuleExport> {
        self.inner
            .read()
            .module_exports
            .get(module)
            .cloned()
            .unwrap_or_default()
    }

    /// All known tag names, sorted.
    pub fn all_tag_names(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.inner.read().element_sources.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// All module paths with recorded exports, sorted.
    pub fn all_module_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.read().module_exports.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether `module` has any recorded exports.
    pub fn has_exports(&self, module: &str) -> bool {
        self.inner
            .read()
            .module_exports
            .get(module)
            .is_some_and(|exports| !exports.is_empty())
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

// ============================================================================
// Tests
// ============================================================================
