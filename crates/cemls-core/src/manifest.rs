//! Custom Elements Manifest model and discovery.
//!
//! A CEM (`custom-elements.json`) is a JSON description of the custom
//! element declarations a package ships: tag names, attributes, slots,
//! events, and CSS custom properties. This module deserializes manifests
//! into an in-memory package object and locates them in a workspace:
//! a `package.json` advertises its manifest through the `customElements`
//! field, both for the workspace package itself and for installed packages
//! under `node_modules`.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while loading manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest JSON did not deserialize
    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Manifest Model
// ============================================================================

/// A parsed `custom-elements.json` package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemPackage {
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    pub modules: Vec<CemModule>,
}

/// A module entry in a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemModule {
    pub kind: String,
    pub path: String,
    pub declarations: Vec<CemDeclaration>,
    pub exports: Vec<CemExport>,
}

/// A declaration in a manifest module.
///
/// All fields are optional to tolerate manifests produced by different
/// generators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemDeclaration {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    pub custom_element: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub attributes: Vec<CemAttribute>,
    pub slots: Vec<CemSlot>,
    pub events: Vec<CemEvent>,
    pub css_properties: Vec<CemCssProperty>,
    pub members: Vec<CemMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<CemReference>,
    pub mixins: Vec<CemReference>,
}

/// An export entry in a manifest module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemExport {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<CemReference>,
}

/// A reference to a declaration, possibly in another module or package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemReference {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

/// The `{ text }` type wrapper the manifest schema uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemType {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemAttribute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_info: Option<CemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemSlot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemEvent {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_info: Option<CemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemCssProperty {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A class member (field or method) declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CemMember {
    pub kind: String,
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_info: Option<CemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
}

impl CemPackage {
    /// Parse a manifest from JSON text.
    pub fn from_json(path_for_errors: &str, json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|source| ManifestError::Parse {
            path: path_for_errors.to_string(),
            source,
        })
    }

    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&path.display().to_string(), &json)
    }

    /// Total number of custom element declarations across all modules.
    pub fn element_count(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| &m.declarations)
            .filter(|d| d.tag_name.is_some())
            .count()
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// A manifest located in the workspace or under `node_modules`.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// npm package name declaring the manifest, when known.
    pub package_name: Option<String>,
    /// Filesystem path of the manifest file.
    pub manifest_path: PathBuf,
    /// The parsed package.
    pub package: CemPackage,
}

/// Minimal view of a `package.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NpmPackage {
    name: Option<String>,
    #[serde(rename = "customElements")]
    custom_elements: Option<String>,
}

/// How deep under `node_modules` package manifests are searched.
/// Two levels covers scoped packages (`@scope/name/package.json`).
const NODE_MODULES_DEPTH: usize = 3;

/// Locate and parse every reachable Custom Elements Manifest.
///
/// Scans the workspace for `package.json` files advertising a manifest via
/// the `customElements` field (honoring ignore rules), then scans installed
/// packages under `node_modules` unless `skip_node_modules` is set.
/// Candidate manifests are parsed in parallel; unreadable or malformed ones
/// are logged and skipped.
pub fn discover_manifests(workspace_root: &Path, skip_node_modules: bool) -> Vec<LoadedManifest> {
    let mut candidates = workspace_package_candidates(workspace_root);
    if !skip_node_modules {
        candidates.extend(node_modules_candidates(workspace_root));
    }

    let manifests: Vec<LoadedManifest> = candidates
        .into_par_iter()
        .filter_map(|(package_name, manifest_path)| {
            match CemPackage::load(&manifest_path) {
                Ok(package) => Some(LoadedManifest {
                    package_name,
                    manifest_path,
                    package,
                }),
                Err(e) => {
                    warn!(path = %manifest_path.display(), error = %e, "skipping manifest");
                    None
                }
            }
        })
        .collect();

    info!(
        count = manifests.len(),
        elements = manifests
            .iter()
            .map(|m| m.package.element_count())
            .sum::<usize>(),
        "loaded custom elements manifests"
    );
    manifests
}

/// Workspace-local `package.json` files, honoring `.gitignore`.
fn workspace_package_candidates(workspace_root: &Path) -> Vec<(Option<String>, PathBuf)> {
    let mut candidates = Vec::new();

    let walker = ignore::WalkBuilder::new(workspace_root).build();
    for entry in walker.into_iter().filter_map(Result::ok) {
        if entry.file_name() != "package.json" {
            continue;
        }
        if let Some(candidate) = manifest_candidate(entry.path()) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Installed package manifests. `node_modules` is gitignored, so this walk
/// uses walkdir with a bounded depth.
fn node_modules_candidates(workspace_root: &Path) -> Vec<(Option<String>, PathBuf)> {
    let node_modules = workspace_root.join("node_modules");
    if !node_modules.is_dir() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&node_modules)
        .max_depth(NODE_MODULES_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_name() != "package.json" {
            continue;
        }
        if let Some(candidate) = manifest_candidate(entry.path()) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Read a `package.json` and return its advertised manifest path, if any.
fn manifest_candidate(package_json: &Path) -> Option<(Option<String>, PathBuf)> {
    let text = std::fs::read_to_string(package_json).ok()?;
    let npm: NpmPackage = match serde_json::from_str(&text) {
        Ok(npm) => npm,
        Err(e) => {
            debug!(path = %package_json.display(), error = %e, "unreadable package.json");
            return None;
        }
    };

    let manifest_rel = npm.custom_elements?;
    let manifest_path = package_json.parent()?.join(manifest_rel);
    if !manifest_path.is_file() {
        debug!(path = %manifest_path.display(), "advertised manifest not found");
        return None;
    }
    Some((npm.name, manifest_path))
}

// ============================================================================
// Tests
// ============================================================================
