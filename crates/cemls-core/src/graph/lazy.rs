//! Lazy graph expansion.
//!
//! The first query for an unknown import path drives the export parser over
//! the matching source files, populating the trackers for that path and its
//! transitive dependencies. Expansion prefers the manifest resolver's view
//! of the world (manifest-level edges) and falls back to plain filesystem
//! resolution. Missing files are logged at debug level and skipped; the
//! module simply stays absent from the graph.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::exports::{ExportParseMode, ExportParser};
use crate::graph::{normalize_module_path, ModuleGraph};
use crate::resolver::ManifestResolver;

/// Directory prefixes tried when locating the source file for a module.
const CANDIDATE_PREFIXES: &[&str] = &["", "elements/", "src/", "lib/", "components/"];

/// Extensions tried for extensionless or `.js`-suffixed specifiers.
const CANDIDATE_EXTENSIONS: &[&str] = &["ts", "js", "mjs"];

impl ModuleGraph {
    /// Expand the graph for `import_path` if it is not yet known.
    ///
    /// No-op when the path already has dependencies or exports recorded,
    /// or when no workspace root is configured.
    pub(crate) fn ensure_loaded(&self, import_path: &str) {
        if import_path.is_empty()
            || self.dependencies().has_dependencies(import_path)
            || self.exports().has_exports(import_path)
        {
            return;
        }
        let Some(root) = self.workspace_root() else {
            return;
        };

        let builder = LazyBuilder {
            graph: self,
            parser: ExportParser::new(Arc::clone(self.pool())),
            root,
        };
        builder.expand(import_path);
        self.resolve_re_export_chains();
    }

    /// Propagate re-export chains into element sources.
    ///
    /// For each recorded `re_exporter -> source` chain, every export of
    /// `source` gains `re_exporter` as an additional source. Idempotent and
    /// safe to run repeatedly.
    pub fn resolve_re_export_chains(&self) {
        for (re_exporter, sources) in self.dependencies().re_export_chains() {
            for source in sources {
                for export in self.exports().module_exports(&source) {
                    self.exports()
                        .add_element_source(&export.tag_name, &re_exporter);
                }
            }
        }
    }
}

struct LazyBuilder<'g> {
    graph: &'g ModuleGraph,
    parser: ExportParser,
    root: PathBuf,
}

impl LazyBuilder<'_> {
    fn expand(&self, import_path: &str) {
        if let Some(resolver) = self.graph.current_resolver() {
            let manifest_modules = resolver.find_manifest_modules_for_import_path(import_path);
            if !manifest_modules.is_empty() {
                let mut visited = HashSet::new();
                for module in manifest_modules {
                    self.expand_manifest_module(&module, resolver.as_ref(), &mut visited);
                }
                return;
            }
        }

        let mut processed = HashSet::new();
        self.expand_source_path(import_path, &mut processed);
    }

    /// Manifest-level expansion: parse the module's source file, map each
    /// import back to a manifest module, record manifest-level edges, and
    /// recurse. The visited set stops cycles.
    fn expand_manifest_module(
        &self,
        module: &str,
        resolver: &dyn ManifestResolver,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(module.to_string()) {
            return;
        }

        let Some(file) = self.find_source_file(module) else {
            debug!(module, "no source file under any candidate prefix");
            return;
        };
        let Some(info) = self.parse_file(module, &file, ExportParseMode::ManifestDriven) else {
            return;
        };

        let file_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        for import in info.imports {
            let mut targets = resolver.find_manifest_modules_for_import_path(&import);
            if targets.is_empty() {
                // A workspace-relative import: resolve it against the file
                // it appears in, then map the file to a manifest module.
                if let Some(target) = resolver.manifest_module_for_file(&file_dir.join(&import)) {
                    targets.push(target);
                }
            }

            if targets.is_empty() {
                self.graph.add_dependency(module, &import);
            } else {
                for target in targets {
                    self.graph.add_dependency(module, &target);
                    self.expand_manifest_module(&target, resolver, visited);
                }
            }
        }
    }

    /// Filesystem expansion for paths the manifest does not know about.
    fn expand_source_path(&self, specifier: &str, processed: &mut HashSet<String>) {
        let module = normalize_module_path(specifier);
        if module.is_empty() || !processed.insert(module.clone()) {
            return;
        }

        let Some(file) = self.find_source_file(&module) else {
            debug!(module = %module, "no source file under any candidate prefix");
            return;
        };
        let mode = if self.graph.has_manifest_resolver() {
            ExportParseMode::ManifestDriven
        } else {
            ExportParseMode::Fallback
        };
        let Some(info) = self.parse_file(&module, &file, mode) else {
            return;
        };

        for import in info.imports {
            self.graph.add_dependency(&module, &import);
            self.expand_source_path(&import, processed);
        }
    }

    fn parse_file(
        &self,
        module: &str,
        file: &Path,
        mode: ExportParseMode,
    ) -> Option<crate::exports::ParsedModuleInfo> {
        let source = match self.graph.fs().read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                debug!(module, error = %e, "failed to read module source");
                return None;
            }
        };

        match self.parser.parse_module(
            module,
            &source,
            self.graph.exports(),
            self.graph.dependencies(),
            mode,
        ) {
            Ok(info) => {
                self.graph.metrics().record_module_parsed();
                Some(info)
            }
            Err(e) => {
                debug!(module, error = %e, "failed to parse module source");
                None
            }
        }
    }

    /// Locate the source file for a module path, trying the common layout
    /// prefixes, TypeScript sources behind `.js`-extension imports, and
    /// extensionless specifiers.
    fn find_source_file(&self, module: &str) -> Option<PathBuf> {
        let fs = self.graph.fs();

        for prefix in CANDIDATE_PREFIXES {
            let candidate = self.root.join(prefix).join(module);
            if fs.exists(&candidate) {
                return Some(candidate);
            }
        }

        // A `.js` import frequently points at TypeScript source.
        if let Some(stem) = module.strip_suffix(".js") {
            for prefix in CANDIDATE_PREFIXES {
                for ext in ["ts", "mjs"] {
                    let candidate = self.root.join(prefix).join(format!("{stem}.{ext}"));
                    if fs.exists(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }

        if Path::new(module).extension().is_none() {
            for prefix in CANDIDATE_PREFIXES {
                for ext in CANDIDATE_EXTENSIONS {
                    let candidate = self.root.join(prefix).join(format!("{module}.{ext}"));
                    if fs.exists(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }

        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::metrics::{CounterMetrics, NoopMetrics};
    use crate::parser::ParserPool;
    use pretty_assertions::assert_eq;

    fn graph_with_fs(fs: Arc<MemoryFileSystem>) -> ModuleGraph {
        let graph = ModuleGraph::with_collaborators(
            Arc::new(ParserPool::new()),
            fs,
            Arc::new(NoopMetrics),
        );
        graph.set_workspace_root("/ws");
        graph
    }

    #[test]
    fn lazy_expansion_discovers_transitive_elements() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert(
            "/ws/elements/my-card.js",
            r#"
            import './my-button.js';
            customElements.define('my-card', MyCard);
            "#,
        );
        fs.insert(
            "/ws/elements/my-button.js",
            r#"
            import './my-icon.js';
            customElements.define('my-button', MyButton);
            "#,
        );
        fs.insert(
            "/ws/elements/my-icon.js",
            "customElements.define('my-icon', MyIcon);",
        );

        let graph = graph_with_fs(fs);
        let tags = graph.transitive_elements("my-card.js");
        assert_eq!(tags, vec!["my-button", "my-card", "my-icon"]);
    }

    #[test]
    fn lazy_expansion_stops_on_cycles() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert(
            "/ws/my-a.js",
            "import './my-b.js'; customElements.define('my-a', MyA);",
        );
        fs.insert(
            "/ws/my-b.js",
            "import './my-a.js'; customElements.define('my-b', MyB);",
        );

        let graph = graph_with_fs(fs);
        let tags = graph.transitive_elements("my-a.js");
        assert_eq!(tags, vec!["my-a", "my-b"]);
    }

    #[test]
    fn missing_file_leaves_module_absent() {
        let fs = Arc::new(MemoryFileSystem::new());
        let graph = graph_with_fs(fs);

        assert!(graph.transitive_elements("nowhere/nothing.js").is_empty());
        assert!(!graph.dependencies().has_dependencies("nowhere/nothing.js"));
    }

    #[test]
    fn js_import_finds_typescript_source() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert(
            "/ws/src/my-tab.ts",
            "customElements.define('my-tab', MyTab);",
        );

        let graph = graph_with_fs(fs);
        assert_eq!(graph.transitive_elements("my-tab.js"), vec!["my-tab"]);
    }

    #[test]
    fn re_export_chain_resolution_is_idempotent() {
        let graph = ModuleGraph::new();
        graph.add_direct_export("my-tab.js", "MyTab", "my-tab");
        graph.add_re_export_chain("index.js", "my-tab.js");

        graph.resolve_re_export_chains();
        graph.resolve_re_export_chains();

        let sources = graph.exports().element_sources("my-tab");
        assert_eq!(sources, vec!["my-tab.js".to_string(), "index.js".to_string()]);
    }

    #[test]
    fn expansion_records_parse_metrics() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert("/ws/my-el.js", "customElements.define('my-el', MyEl);");

        let metrics = Arc::new(CounterMetrics::new());
        let graph = ModuleGraph::with_collaborators(
            Arc::new(ParserPool::new()),
            fs,
            metrics.clone(),
        );
        graph.set_workspace_root("/ws");

        graph.transitive_elements("my-el.js");
        assert_eq!(metrics.modules_parsed(), 1);
    }
}
