//! Manifest Resolver
//!
//! The hinge between the module graph and the registry: converts import
//! paths and workspace file paths into manifest module paths, and manifest
//! modules into tag names. Two implementations: a null object returning
//! empty results (tests, first use before the registry is populated) and a
//! registry-backed resolver that indexes every declaration's module path at
//! load time. The module graph accepts a new resolver at runtime so the
//! graph can be built before the registry is.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::graph::normalize_module_path;
use crate::registry::CemRegistry;

/// Bridges import paths / file paths to manifest module paths.
///
/// Every operation is total: unknown inputs yield empty results, never
/// errors.
pub trait ManifestResolver: Send + Sync {
    /// Manifest module paths matching an import path. May be empty.
    fn find_manifest_modules_for_import_path(&self, import_path: &str) -> Vec<String>;

    /// The manifest module path for a workspace file, if any.
    fn manifest_module_for_file(&self, fs_path: &Path) -> Option<String>;

    /// Tag names defined in a manifest module.
    fn elements_from_manifest_module(&self, manifest_module: &str) -> Vec<String>;
}

// ============================================================================
// Null Object
// ============================================================================

/// Resolver that knows nothing. Used before a registry exists.
#[derive(Debug, Default)]
pub struct NoopManifestResolver;

impl ManifestResolver for NoopManifestResolver {
    fn find_manifest_modules_for_import_path(&self, _import_path: &str) -> Vec<String> {
        Vec::new()
    }

    fn manifest_module_for_file(&self, _fs_path: &Path) -> Option<String> {
        None
    }

    fn elements_from_manifest_module(&self, _manifest_module: &str) -> Vec<String> {
        Vec::new()
    }
}

// ============================================================================
// Registry-Backed Resolver
// ============================================================================

/// Resolver backed by the CEM registry.
///
/// At construction it indexes every manifest module path under its
/// normalized form, so lookups match bare specifiers
/// (`rh-tabs/rh-tabs.js`), `./`-prefixed manifest paths, and
/// workspace-relative suffixes alike.
pub struct RegistryResolver {
    registry: Arc<CemRegistry>,
    /// normalized form -> manifest module paths as written in the manifest
    module_index: HashMap<String, Vec<String>>,
}

impl RegistryResolver {
    /// Build the resolver's index from the registry.
    pub fn new(registry: Arc<CemRegistry>) -> Self {
        let mut module_index: HashMap<String, Vec<String>> = HashMap::new();
        for module_path in registry.module_paths() {
            let normalized = normalize_module_path(&module_path);
            let entry = module_index.entry(normalized).or_default();
            if !entry.contains(&module_path) {
                entry.push(module_path);
            }
        }
        Self {
            registry,
            module_index,
        }
    }

    /// The registry this resolver reads from.
    pub fn registry(&self) -> &Arc<CemRegistry> {
        &self.registry
    }

    fn lookup(&self, normalized: &str) -> Vec<String> {
        if normalized.is_empty() {
            return Vec::new();
        }
        if let Some(matches) = self.module_index.get(normalized) {
            return matches.clone();
        }

        // Suffix matching on path-segment boundaries covers bare specifiers
        // that carry a package prefix the manifest omits, and vice versa.
        let mut matches = Vec::new();
        for (key, modules) in &self.module_index {
            if key.ends_with(normalized)
                && key[..key.len() - normalized.len()].ends_with('/')
            {
                matches.extend(modules.iter().cloned());
            } else if normalized.ends_with(key)
                && normalized[..normalized.len() - key.len()].ends_with('/')
            {
                matches.extend(modules.iter().cloned());
            }
        }
        matches.sort();
        matches.dedup();
        matches
    }
}

impl ManifestResolver for RegistryResolver {
    fn find_manifest_modules_for_import_path(&self, import_path: &str) -> Vec<String> {
        let normalized = normalize_module_path(import_path);
        let mut matches = self.lookup(&normalized);
        if matches.is_empty() {
            // TypeScript sources import with `.js`; manifests mostly list
            // `.js` too, but cover `.ts` specifiers as well.
            if let Some(stem) = normalized.strip_suffix(".ts") {
                matches = self.lookup(&format!("{stem}.js"));
            }
        }
        matches
    }

    fn manifest_module_for_file(&self, fs_path: &Path) -> Option<String> {
        let normalized = normalize_module_path(&fs_path.to_string_lossy());
        let with_js_ext = normalized
            .strip_suffix(".ts")
            .or_else(|| normalized.strip_suffix(".mjs"))
            .map(|stem| format!("{stem}.js"))
            .unwrap_or(normalized);

        // Strip leading path components until a suffix matches the index.
        let mut remainder = with_js_ext.as_str();
        loop {
            let matches = self.lookup(remainder);
            if let Some(first) = matches.into_iter().next() {
                return Some(first);
            }
            match remainder.split_once('/') {
                Some((_, rest)) if !rest.is_empty() => remainder = rest,
                _ => return None,
            }
        }
    }

    fn elements_from_manifest_module(&self, manifest_module: &str) -> Vec<String> {
        let direct = self.registry.elements_in_module(manifest_module);
        if !direct.is_empty() {
            return direct;
        }
        // The graph stores normalized keys; manifests may write `./`
        // prefixes or the other way around.
        let mut tags = Vec::new();
        for module in self.lookup(&normalize_module_path(manifest_module)) {
            for tag in self.registry.elements_in_module(&module) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        tags
    }
}

// ============================================================================
// Tests
// ============================================================================
