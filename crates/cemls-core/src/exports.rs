//! Export Parser
//!
//! Extracts import edges, re-export chains, and `customElements.define`
//! registrations from TypeScript/JavaScript sources and routes them into
//! the module graph trackers. Local export declarations (`export class X`)
//! are recognized but deliberately not routed: the registry is the
//! authority for which class name corresponds to which tag.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use tree_sitter::{QueryCursor, StreamingIterator};

use crate::graph::{normalize_module_path, DependencyTracker, ExportTracker};
use crate::parser::{ParserError, ParserPool, SupportedLanguage};
use crate::queries::{QueryCache, QueryKind};

// ============================================================================
// Parse Mode
// ============================================================================

/// How `customElements.define` registrations are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportParseMode {
    /// A manifest resolver supplies element/module mappings; define calls
    /// are redundant and skipped.
    ManifestDriven,
    /// No manifest available; define calls populate the export tracker.
    Fallback,
}

// ============================================================================
// Parsed Module Info
// ============================================================================

/// A `customElements.define('tag', Class)` registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedTag {
    pub class_name: String,
    pub tag_name: String,
}

/// Everything extracted from one module source.
#[derive(Debug, Clone, Default)]
pub struct ParsedModuleInfo {
    /// Normalized specifiers of static, dynamic, and re-export imports.
    pub imports: Vec<String>,
    /// Normalized source specifiers of `export ... from` statements.
    pub re_exports: Vec<String>,
    /// `customElements.define` registrations found in the module.
    pub defined_tags: Vec<DefinedTag>,
}

// ============================================================================
// Export Parser
// ============================================================================

/// Parses TS/JS modules and feeds the module graph trackers.
pub struct ExportParser {
    pool: Arc<ParserPool>,
    queries: &'static QueryCache,
}

impl ExportParser {
    /// Create a parser backed by `pool` and the process-wide query cache.
    pub fn new(pool: Arc<ParserPool>) -> Self {
        Self {
            pool,
            queries: QueryCache::global(),
        }
    }

    /// Extract dependency and export information without routing it.
    ///
    /// On a tree-sitter parse failure this logs at debug level and returns
    /// a recoverable error; callers skip the module.
    pub fn extract(
        &self,
        module_path: &str,
        source: &str,
    ) -> Result<ParsedModuleInfo, ParserError> {
        let language = SupportedLanguage::from_path(Path::new(module_path))
            .filter(SupportedLanguage::is_script)
            .unwrap_or(SupportedLanguage::TypeScript);

        let tree = {
            let mut parser = self.pool.acquire(language)?;
            match parser.parse(source) {
                Ok(tree) => tree,
                Err(e) => {
                    debug!(module_path, "skipping unparseable module");
                    return Err(e);
                }
            }
        };

        let query = self.queries.matcher(language, QueryKind::Exports)?;
        let capture_names = query.capture_names();
        let source_bytes = source.as_bytes();

        let mut info = ParsedModuleInfo::default();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source_bytes);
        while let Some(match_) = matches.next() {
            // The define pattern carries several captures per match; gather
            // them before routing so the receiver check can see all four.
            let mut define_object = None;
            let mut define_property = None;
            let mut define_tag = None;
            let mut define_class = None;

            for capture in match_.captures {
                let name = capture_names[capture.index as usize];
                let text = capture.node.utf8_text(source_bytes).unwrap_or("");

                match name {
                    "import.source" | "import.dynamic" => {
                        push_specifier(&mut info.imports, text);
                    }
                    "export.source" => {
                        let normalized = normalize_module_path(text);
                        push_specifier(&mut info.imports, text);
                        if !normalized.is_empty() && !info.re_exports.contains(&normalized) {
                            info.re_exports.push(normalized);
                        }
                    }
                    // Graph-level no-ops: the registry is authoritative for
                    // which class name corresponds to which tag.
                    "export.name" | "export.declaration" => {}
                    "define.object" => define_object = Some(text),
                    "define.property" => define_property = Some(text),
                    "define.tag" => define_tag = Some(text.to_string()),
                    "define.class" => define_class = Some(text.to_string()),
                    _ => {}
                }
            }

            if define_object == Some("customElements") && define_property == Some("define") {
                if let (Some(tag_name), Some(class_name)) = (define_tag, define_class) {
                    info.defined_tags.push(DefinedTag {
                        class_name,
                        tag_name,
                    });
                }
            }
        }

        Ok(info)
    }

    /// Extract from `source` and route the results into the trackers.
    ///
    /// Import and re-export edges always go to the dependency tracker.
    /// Define registrations go to the export tracker only in
    /// [`ExportParseMode::Fallback`]; in manifest-driven mode the registry
    /// already knows them.
    pub fn parse_module(
        &self,
        module_path: &str,
        source: &str,
        exports: &ExportTracker,
        dependencies: &DependencyTracker,
        mode: ExportParseMode,
    ) -> Result<ParsedModuleInfo, ParserError> {
        let info = self.extract(module_path, source)?;
        let module = normalize_module_path(module_path);

        for import in &info.imports {
            dependencies.add_dependency(&module, import);
        }
        for source_module in &info.re_exports {
            dependencies.add_re_export_chain(&module, source_module);
        }
        if mode == ExportParseMode::Fallback {
            for defined in &info.defined_tags {
                exports.add_direct_export(&module, &defined.class_name, &defined.tag_name);
            }
        }

        Ok(info)
    }
}

fn push_specifier(specifiers: &mut Vec<String>, raw: &str) {
    let normalized = normalize_module_path(raw);
    if !normalized.is_empty() && !specifiers.contains(&normalized) {
        specifiers.push(normalized);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> ExportParser {
        ExportParser::new(Arc::new(ParserPool::new()))
    }

    #[test]
    fn extracts_static_imports() {
        let info = parser()
            .extract(
                "my-card.js",
                r#"
                import './my-button.js';
                import { MyIcon } from '../icons/my-icon.js';
                import * as helpers from 'my-lib/helpers.js';
                "#,
            )
            .unwrap();

        assert_eq!(
            info.imports,
            vec![
                "my-button.js".to_string(),
                "icons/my-icon.js".to_string(),
                "my-lib/helpers.js".to_string(),
            ]
        );
        assert!(info.re_exports.is_empty());
    }

    #[test]
    fn extracts_dynamic_imports() {
        let info = parser()
            .extract("app.ts", "const mod = await import('./lazy/my-dialog.js');")
            .unwrap();
        assert_eq!(info.imports, vec!["lazy/my-dialog.js".to_string()]);
    }

    #[test]
    fn re_export_records_both_edge_kinds() {
        let info = parser()
            .extract("index.js", "export { MyTab } from './my-tab.js';")
            .unwrap();
        assert_eq!(info.imports, vec!["my-tab.js".to_string()]);
        assert_eq!(info.re_exports, vec!["my-tab.js".to_string()]);
    }

    #[test]
    fn extracts_custom_element_definitions() {
        let info = parser()
            .extract(
                "my-tab.ts",
                r#"
                export class MyTab extends HTMLElement {}
                customElements.define('my-tab', MyTab);
                "#,
            )
            .unwrap();

        assert_eq!(
            info.defined_tags,
            vec![DefinedTag {
                class_name: "MyTab".to_string(),
                tag_name: "my-tab".to_string(),
            }]
        );
    }

    #[test]
    fn unrelated_member_calls_are_not_definitions() {
        let info = parser()
            .extract("m.js", "registry.define('my-el', MyEl); console.log('x');")
            .unwrap();
        assert!(info.defined_tags.is_empty());
    }

    #[test]
    fn fallback_mode_routes_definitions() {
        let exports = ExportTracker::new();
        let dependencies = DependencyTracker::new();

        parser()
            .parse_module(
                "./my-tab.js",
                r#"
                import './my-icon.js';
                customElements.define('my-tab', MyTab);
                "#,
                &exports,
                &dependencies,
                ExportParseMode::Fallback,
            )
            .unwrap();

        assert_eq!(dependencies.dependencies_of("my-tab.js"), vec!["my-icon.js"]);
        assert_eq!(exports.element_sources("my-tab"), vec!["my-tab.js"]);
    }

    #[test]
    fn manifest_mode_skips_definitions() {
        let exports = ExportTracker::new();
        let dependencies = DependencyTracker::new();

        parser()
            .parse_module(
                "my-tab.js",
                "customElements.define('my-tab', MyTab);",
                &exports,
                &dependencies,
                ExportParseMode::ManifestDriven,
            )
            .unwrap();

        assert!(exports.all_tag_names().is_empty());
    }

    #[test]
    fn duplicate_imports_are_deduplicated() {
        let info = parser()
            .extract(
                "m.js",
                "import './a.js'; import { X } from './a.js'; import './b.js';",
            )
            .unwrap();
        assert_eq!(info.imports, vec!["a.js".to_string(), "b.js".to_string()]);
    }

    #[test]
    fn javascript_and_typescript_both_parse() {
        let source = "import './dep.js'; export class X {}";
        for path in ["m.js", "m.ts"] {
            let info = parser().extract(path, source).unwrap();
            assert_eq!(info.imports, vec!["dep.js".to_string()], "path {path}");
        }
    }
}
