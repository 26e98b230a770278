//! CEM Registry
//!
//! The immutable read model of every loaded manifest: tag name to element
//! declaration, manifest module to the tags it defines, and package to the
//! tags it ships. Built once at startup; thereafter read-only, so no
//! synchronization is needed for reads.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::manifest::{CemDeclaration, LoadedManifest};

// ============================================================================
// Tag Validation
// ============================================================================

/// Tag names the HTML specification reserves despite containing a dash.
const RESERVED_TAG_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Whether `name` is a valid custom element tag name: lowercase, starts
/// with an ASCII letter, contains a dash, and is not a reserved name.
pub fn is_valid_custom_element_tag(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }
    if !name.contains('-') || RESERVED_TAG_NAMES.contains(&name) {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}

// ============================================================================
// Element Declaration
// ============================================================================

/// Attribute metadata flattened from a manifest declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub description: Option<String>,
    /// Type expression text, e.g. `boolean` or `'earth' | 'wind'`.
    pub type_text: Option<String>,
    pub default: Option<String>,
    pub field_name: Option<String>,
}

impl AttributeInfo {
    /// Whether the declared type is boolean.
    pub fn is_boolean(&self) -> bool {
        self.type_text
            .as_deref()
            .is_some_and(|t| t.trim() == "boolean")
    }

    /// Literal values of a union type like `'a' | 'b'`, if any.
    pub fn enum_values(&self) -> Vec<String> {
        let Some(text) = self.type_text.as_deref() else {
            return Vec::new();
        };
        text.split('|')
            .map(str::trim)
            .filter(|part| {
                (part.starts_with('\'') && part.ends_with('\''))
                    || (part.starts_with('"') && part.ends_with('"'))
            })
            .map(|part| part[1..part.len() - 1].to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    /// Empty string names the default slot.
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub name: String,
    pub type_text: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssPropertyInfo {
    pub name: String,
    pub syntax: Option<String>,
    pub default: Option<String>,
    pub description: Option<String>,
}

/// A class field usable through a property binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    pub type_text: Option<String>,
    pub description: Option<String>,
}

/// A custom element declaration, immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementDeclaration {
    pub tag_name: String,
    pub class_name: String,
    /// Manifest module path, e.g. `rh-tab/rh-tab.js`.
    pub module_path: String,
    /// npm package that ships the element, when known.
    pub package: Option<String>,
    pub attributes: Vec<AttributeInfo>,
    pub slots: Vec<SlotInfo>,
    pub events: Vec<EventInfo>,
    pub css_properties: Vec<CssPropertyInfo>,
    /// Public class fields, for property bindings.
    pub properties: Vec<PropertyInfo>,
    pub description: Option<String>,
    pub superclass: Option<String>,
    pub mixins: Vec<String>,
}

impl ElementDeclaration {
    /// Find an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Find an event by name.
    pub fn event(&self, name: &str) -> Option<&EventInfo> {
        self.events.iter().find(|e| e.name == name)
    }
}

// ============================================================================
// Relationships
// ============================================================================

/// How two elements relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    Superclass,
    Subclass,
    Mixin,
    Module,
    Package,
}

impl RelationshipKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Superclass => "superclass",
            RelationshipKind::Subclass => "subclass",
            RelationshipKind::Mixin => "mixin",
            RelationshipKind::Module => "module",
            RelationshipKind::Package => "package",
        }
    }
}

/// A detected relationship from one element to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRelationship {
    /// Target element tag name.
    pub target: String,
    pub kind: RelationshipKind,
    /// The shared mixin, module, or package the relationship goes through.
    pub via: Option<String>,
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable read model of all loaded manifests.
#[derive(Debug, Default)]
pub struct CemRegistry {
    /// tag name -> declaration (unique)
    elements: HashMap<String, Arc<ElementDeclaration>>,
    /// manifest module path -> tags defined there
    module_elements: HashMap<String, Vec<String>>,
    /// package name -> tags shipped there
    package_elements: HashMap<String, Vec<String>>,
    /// stable sorted snapshot of every tag
    tag_names: Vec<String>,
}

impl CemRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from loaded manifests. Called once at init.
    pub fn from_manifests(manifests: &[LoadedManifest]) -> Self {
        let mut registry = Self::default();

        for manifest in manifests {
            for module in &manifest.package.modules {
                for declaration in &module.declarations {
                    let Some(tag_name) = effective_tag_name(declaration) else {
                        continue;
                    };
                    if !is_valid_custom_element_tag(&tag_name) {
                        debug!(tag = %tag_name, "skipping invalid tag name");
                        continue;
                    }
                    if registry.elements.contains_key(&tag_name) {
                        warn!(tag = %tag_name, module = %module.path, "duplicate tag declaration ignored");
                        continue;
                    }

                    let element = Arc::new(flatten_declaration(
                        declaration,
                        &tag_name,
                        &module.path,
                        manifest.package_name.as_deref(),
                    ));

                    registry
                        .module_elements
                        .entry(module.path.clone())
                        .or_default()
                        .push(tag_name.clone());
                    if let Some(package) = &manifest.package_name {
                        registry
                            .package_elements
                            .entry(package.clone())
                            .or_default()
                            .push(tag_name.clone());
                    }
                    registry.elements.insert(tag_name, element);
                }
            }
        }

        registry.tag_names = registry.elements.keys().cloned().collect();
        registry.tag_names.sort();
        registry
    }

    /// Look up a declaration by tag name.
    pub fn element(&self, tag_name: &str) -> Option<&Arc<ElementDeclaration>> {
        self.elements.get(tag_name)
    }

    /// Whether `tag_name` is declared by any loaded manifest.
    pub fn has_tag(&self, tag_name: &str) -> bool {
        self.elements.contains_key(tag_name)
    }

    /// Stable snapshot of all tag names, sorted.
    pub fn all_tag_names(&self) -> &[String] {
        &self.tag_names
    }

    /// Tags defined in a manifest module.
    pub fn elements_in_module(&self, module_path: &str) -> Vec<String> {
        self.module_elements
            .get(module_path)
            .cloned()
            .unwrap_or_default()
    }

    /// All manifest module paths that define elements, sorted.
    pub fn module_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.module_elements.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Tags of elements that declare a CSS custom property, sorted.
    pub fn elements_with_css_property(&self, property_name: &str) -> Vec<String> {
        let mut tags: Vec<String> = self
            .elements
            .values()
            .filter(|el| el.css_properties.iter().any(|p| p.name == property_name))
            .map(|el| el.tag_name.clone())
            .collect();
        tags.sort();
        tags
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the registry holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Relationships from `tag_name` to other registered elements.
    ///
    /// Inheritance and mixin relationships take precedence: a module or
    /// package co-location to a target that already has a stronger
    /// relationship is suppressed. Self-relationships are filtered.
    pub fn relationships(&self, tag_name: &str) -> Vec<ElementRelationship> {
        let Some(element) = self.elements.get(tag_name) else {
            return Vec::new();
        };

        let mut related = Vec::new();
        let mut strong_targets: HashSet<String> = HashSet::new();
        let mut push_strong = |related: &mut Vec<ElementRelationship>,
                               strong: &mut HashSet<String>,
                               rel: ElementRelationship| {
            if rel.target != tag_name && strong.insert(rel.target.clone()) {
                related.push(rel);
            }
        };

        // Superclass: the element our class extends.
        if let Some(superclass) = &element.superclass {
            for other in self.elements.values() {
                if &other.class_name == superclass {
                    push_strong(
                        &mut related,
                        &mut strong_targets,
                        ElementRelationship {
                            target: other.tag_name.clone(),
                            kind: RelationshipKind::Superclass,
                            via: Some(superclass.clone()),
                        },
                    );
                }
            }
        }

        // Subclasses: elements extending our class.
        for other in self.elements.values() {
            if other.superclass.as_deref() == Some(element.class_name.as_str()) {
                push_strong(
                    &mut related,
                    &mut strong_targets,
                    ElementRelationship {
                        target: other.tag_name.clone(),
                        kind: RelationshipKind::Subclass,
                        via: Some(element.class_name.clone()),
                    },
                );
            }
        }

        // Mixins: elements sharing a mixin with us.
        for mixin in &element.mixins {
            for other in self.elements.values() {
                if other.tag_name != element.tag_name && other.mixins.contains(mixin) {
                    push_strong(
                        &mut related,
                        &mut strong_targets,
                        ElementRelationship {
                            target: other.tag_name.clone(),
                            kind: RelationshipKind::Mixin,
                            via: Some(mixin.clone()),
                        },
                    );
                }
            }
        }

        // Module co-location, suppressed by stronger relationships.
        for sibling in self.elements_in_module(&element.module_path) {
            if sibling != element.tag_name && !strong_targets.contains(&sibling) {
                related.push(ElementRelationship {
                    target: sibling,
                    kind: RelationshipKind::Module,
                    via: Some(element.module_path.clone()),
                });
            }
        }

        // Package co-location, suppressed by everything above.
        if let Some(package) = &element.package {
            let weak_targets: HashSet<String> =
                related.iter().map(|r| r.target.clone()).collect();
            if let Some(package_tags) = self.package_elements.get(package) {
                for sibling in package_tags {
                    if sibling != &element.tag_name && !weak_targets.contains(sibling) {
                        related.push(ElementRelationship {
                            target: sibling.clone(),
                            kind: RelationshipKind::Package,
                            via: Some(package.clone()),
                        });
                    }
                }
            }
        }

        related
    }
}

/// Tag name a declaration registers under. Declarations without a
/// `tagName` (mixins, base classes) are not elements.
fn effective_tag_name(declaration: &CemDeclaration) -> Option<String> {
    declaration.tag_name.clone().filter(|t| !t.is_empty())
}

fn flatten_declaration(
    declaration: &CemDeclaration,
    tag_name: &str,
    module_path: &str,
    package: Option<&str>,
) -> ElementDeclaration {
    ElementDeclaration {
        tag_name: tag_name.to_string(),
        class_name: declaration.name.clone(),
        module_path: module_path.to_string(),
        package: package.map(str::to_string),
        attributes: declaration
            .attributes
            .iter()
            .map(|a| AttributeInfo {
                name: a.name.clone(),
                description: a.description.clone(),
                type_text: a.type_info.as_ref().map(|t| t.text.clone()),
                default: a.default.clone(),
                field_name: a.field_name.clone(),
            })
            .collect(),
        slots: declaration
            .slots
            .iter()
            .map(|s| SlotInfo {
                name: s.name.clone(),
                description: s.description.clone(),
            })
            .collect(),
        events: declaration
            .events
            .iter()
            .map(|e| EventInfo {
                name: e.name.clone(),
                type_text: e.type_info.as_ref().map(|t| t.text.clone()),
                description: e.description.clone(),
            })
            .collect(),
        css_properties: declaration
            .css_properties
            .iter()
            .map(|c| CssPropertyInfo {
                name: c.name.clone(),
                syntax: c.syntax.clone(),
                default: c.default.clone(),
                description: c.description.clone(),
            })
            .collect(),
        properties: declaration
            .members
            .iter()
            .filter(|m| m.kind == "field" && m.privacy.as_deref() != Some("private"))
            .map(|m| PropertyInfo {
                name: m.name.clone(),
                type_text: m.type_info.as_ref().map(|t| t.text.clone()),
                description: m.description.clone(),
            })
            .collect(),
        description: declaration
            .description
            .clone()
            .or_else(|| declaration.summary.clone()),
        superclass: declaration.superclass.as_ref().map(|s| s.name.clone()),
        mixins: declaration.mixins.iter().map(|m| m.name.clone()).collect(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{CemModule, CemPackage, CemReference};
    use pretty_assertions::assert_eq;

    fn declaration(name: &str, tag: &str) -> CemDeclaration {
        CemDeclaration {
            kind: "class".to_string(),
            name: name.to_string(),
            tag_name: Some(tag.to_string()),
            custom_element: true,
            ..Default::default()
        }
    }

    fn manifest(
        package_name: Option<&str>,
        modules: Vec<(&str, Vec<CemDeclaration>)>,
    ) -> LoadedManifest {
        LoadedManifest {
            package_name: package_name.map(str::to_string),
            manifest_path: "custom-elements.json".into(),
            package: CemPackage {
                schema_version: "1.0.0".to_string(),
                readme: None,
                modules: modules
                    .into_iter()
                    .map(|(path, declarations)| CemModule {
                        kind: "javascript-module".to_string(),
                        path: path.to_string(),
                        declarations,
                        exports: Vec::new(),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn validates_tag_names() {
        assert!(is_valid_custom_element_tag("my-element"));
        assert!(is_valid_custom_element_tag("x-1.2_3"));
        assert!(!is_valid_custom_element_tag(""));
        assert!(!is_valid_custom_element_tag("div"));
        assert!(!is_valid_custom_element_tag("My-Element"));
        assert!(!is_valid_custom_element_tag("1-up"));
        assert!(!is_valid_custom_element_tag("font-face"));
    }

    #[test]
    fn empty_registry_boundaries() {
        let registry = CemRegistry::new();
        assert!(registry.all_tag_names().is_empty());
        assert!(registry.element("rh-tab").is_none());
        assert!(registry.elements_in_module("rh-tab/rh-tab.js").is_empty());
        assert!(registry.relationships("rh-tab").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn builds_indexes_from_manifests() {
        let registry = CemRegistry::from_manifests(&[manifest(
            Some("@rh/tabs"),
            vec![
                ("rh-tab/rh-tab.js", vec![declaration("RhTab", "rh-tab")]),
                ("rh-tabs/rh-tabs.js", vec![declaration("RhTabs", "rh-tabs")]),
            ],
        )]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all_tag_names(), ["rh-tab", "rh-tabs"]);
        assert_eq!(
            registry.elements_in_module("rh-tab/rh-tab.js"),
            vec!["rh-tab".to_string()]
        );
        assert_eq!(
            registry.element("rh-tab").unwrap().package.as_deref(),
            Some("@rh/tabs")
        );
    }

    #[test]
    fn duplicate_tags_keep_first_declaration() {
        let registry = CemRegistry::from_manifests(&[manifest(
            None,
            vec![
                ("first.js", vec![declaration("First", "my-el")]),
                ("second.js", vec![declaration("Second", "my-el")]),
            ],
        )]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.element("my-el").unwrap().class_name, "First");
    }

    #[test]
    fn inheritance_suppresses_colocation() {
        let mut base = declaration("BaseCard", "base-card");
        let mut derived = declaration("FancyCard", "fancy-card");
        derived.superclass = Some(CemReference {
            name: "BaseCard".to_string(),
            ..Default::default()
        });
        base.superclass = None;

        // Both live in the same module, so co-location would also apply.
        let registry = CemRegistry::from_manifests(&[manifest(
            Some("@x/cards"),
            vec![("cards/cards.js", vec![base, derived])],
        )]);

        let rels = registry.relationships("fancy-card");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].kind, RelationshipKind::Superclass);
        assert_eq!(rels[0].target, "base-card");

        let rels = registry.relationships("base-card");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].kind, RelationshipKind::Subclass);
        assert_eq!(rels[0].target, "fancy-card");
    }

    #[test]
    fn shared_mixin_is_detected() {
        let mixin = CemReference {
            name: "Toggleable".to_string(),
            ..Default::default()
        };
        let mut a = declaration("MySwitch", "my-switch");
        a.mixins = vec![mixin.clone()];
        let mut b = declaration("MyCheckbox", "my-checkbox");
        b.mixins = vec![mixin];

        let registry = CemRegistry::from_manifests(&[manifest(
            None,
            vec![("switch.js", vec![a]), ("checkbox.js", vec![b])],
        )]);

        let rels = registry.relationships("my-switch");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].kind, RelationshipKind::Mixin);
        assert_eq!(rels[0].target, "my-checkbox");
        assert_eq!(rels[0].via.as_deref(), Some("Toggleable"));
    }

    #[test]
    fn package_colocation_is_weakest() {
        let registry = CemRegistry::from_manifests(&[manifest(
            Some("@x/kit"),
            vec![
                ("a/a.js", vec![declaration("A", "x-a")]),
                ("b/b.js", vec![declaration("B", "x-b")]),
            ],
        )]);

        let rels = registry.relationships("x-a");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].kind, RelationshipKind::Package);
        assert_eq!(rels[0].target, "x-b");
        assert_eq!(rels[0].via.as_deref(), Some("@x/kit"));
    }

    #[test]
    fn css_property_lookup() {
        let mut tab = declaration("RhTab", "rh-tab");
        tab.css_properties = vec![crate::manifest::CemCssProperty {
            name: "--rh-tab-color".to_string(),
            syntax: Some("<color>".to_string()),
            ..Default::default()
        }];
        let registry =
            CemRegistry::from_manifests(&[manifest(None, vec![("rh-tab/rh-tab.js", vec![tab])])]);

        assert_eq!(
            registry.elements_with_css_property("--rh-tab-color"),
            vec!["rh-tab".to_string()]
        );
        assert!(registry.elements_with_css_property("--unknown").is_empty());
    }

    #[test]
    fn attribute_helpers() {
        let attr = AttributeInfo {
            name: "variant".to_string(),
            type_text: Some("'earth' | 'wind' | 'fire'".to_string()),
            ..Default::default()
        };
        assert_eq!(attr.enum_values(), vec!["earth", "wind", "fire"]);
        assert!(!attr.is_boolean());

        let flag = AttributeInfo {
            name: "active".to_string(),
            type_text: Some("boolean".to_string()),
            ..Default::default()
        };
        assert!(flag.is_boolean());
        assert!(flag.enum_values().is_empty());
    }
}
