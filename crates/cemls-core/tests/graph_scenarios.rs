//! End-to-end module graph scenarios: direct exports, re-exports,
//! transitive resolution, diamonds, cycles, and the depth cap.

use cemls_core::{ModuleGraph, DEFAULT_MAX_TRANSITIVE_DEPTH};
use pretty_assertions::assert_eq;

#[test]
fn basic_direct_export() {
    let graph = ModuleGraph::new();
    graph.add_direct_export("components/rh-tab.js", "RhTab", "rh-tab");

    assert_eq!(
        graph.exports().element_sources("rh-tab"),
        vec!["components/rh-tab.js".to_string()]
    );
    assert_eq!(
        graph.exports().all_tag_names(),
        vec!["rh-tab".to_string()]
    );
}

#[test]
fn re_export_adds_alternate_source() {
    let graph = ModuleGraph::new();
    graph.add_direct_export("components/rh-tab.js", "RhTab", "rh-tab");
    graph.add_re_export(
        "components/rh-tabs.js",
        "components/rh-tab.js",
        "RhTab",
        "rh-tab",
    );

    let mut sources = graph.exports().element_sources("rh-tab");
    sources.sort();
    assert_eq!(
        sources,
        vec![
            "components/rh-tab.js".to_string(),
            "components/rh-tabs.js".to_string(),
        ]
    );
}

#[test]
fn two_level_transitive_in_direct_mode() {
    let graph = ModuleGraph::new();
    graph.add_direct_export("my-icon.js", "MyIcon", "my-icon");
    graph.add_direct_export("my-button.js", "MyButton", "my-button");
    graph.add_direct_export("my-card.js", "MyCard", "my-card");
    graph.add_dependency("my-button.js", "my-icon.js");
    graph.add_dependency("my-card.js", "my-button.js");

    assert_eq!(
        graph.transitive_elements_direct("my-card.js"),
        vec!["my-button", "my-card", "my-icon"]
    );
}

#[test]
fn diamond_dependency_has_no_duplicates() {
    let graph = ModuleGraph::new();
    for (module, class, tag) in [
        ("my-form.js", "MyForm", "my-form"),
        ("my-input.js", "MyInput", "my-input"),
        ("my-button.js", "MyButton", "my-button"),
        ("my-icon.js", "MyIcon", "my-icon"),
    ] {
        graph.add_direct_export(module, class, tag);
    }
    graph.add_dependency("my-form.js", "my-input.js");
    graph.add_dependency("my-form.js", "my-button.js");
    graph.add_dependency("my-input.js", "my-icon.js");
    graph.add_dependency("my-button.js", "my-icon.js");

    let tags = graph.transitive_elements_direct("my-form.js");
    assert_eq!(tags, vec!["my-button", "my-form", "my-icon", "my-input"]);

    let mut deduped = tags.clone();
    deduped.dedup();
    assert_eq!(deduped, tags, "result must be a set");
}

#[test]
fn three_cycle_terminates() {
    let graph = ModuleGraph::new();
    graph.add_direct_export("my-a.js", "MyA", "my-a");
    graph.add_direct_export("my-b.js", "MyB", "my-b");
    graph.add_direct_export("my-c.js", "MyC", "my-c");
    graph.add_dependency("my-a.js", "my-b.js");
    graph.add_dependency("my-b.js", "my-c.js");
    graph.add_dependency("my-c.js", "my-a.js");

    assert_eq!(
        graph.transitive_elements_direct("my-a.js"),
        vec!["my-a", "my-b", "my-c"]
    );
}

#[test]
fn depth_cap_bounds_long_chains() {
    let graph = ModuleGraph::new();
    for i in 1..=10 {
        graph.add_direct_export(&format!("my-{i}.js"), &format!("My{i}"), &format!("my-{i}"));
        if i < 10 {
            graph.add_dependency(&format!("my-{i}.js"), &format!("my-{}.js", i + 1));
        }
    }

    assert_eq!(graph.max_transitive_depth(), DEFAULT_MAX_TRANSITIVE_DEPTH);
    let tags = graph.transitive_elements_direct("my-1.js");
    assert!(tags.len() >= 5, "at least the first five levels: {tags:?}");
    assert!(tags.len() < 10, "not the whole chain: {tags:?}");
}

#[test]
fn chain_within_cap_is_fully_reachable() {
    let graph = ModuleGraph::new();
    for i in 1..=4 {
        graph.add_direct_export(&format!("my-{i}.js"), &format!("My{i}"), &format!("my-{i}"));
        if i < 4 {
            graph.add_dependency(&format!("my-{i}.js"), &format!("my-{}.js", i + 1));
        }
    }

    assert_eq!(
        graph.transitive_elements_direct("my-1.js"),
        vec!["my-1", "my-2", "my-3", "my-4"]
    );
}

#[test]
fn direct_export_twice_equals_once() {
    let once = ModuleGraph::new();
    once.add_direct_export("m.js", "C", "my-el");

    let twice = ModuleGraph::new();
    twice.add_direct_export("m.js", "C", "my-el");
    twice.add_direct_export("m.js", "C", "my-el");

    assert_eq!(once.exports().all_tag_names(), twice.exports().all_tag_names());
    assert_eq!(
        once.exports().element_sources("my-el"),
        twice.exports().element_sources("my-el")
    );
    assert_eq!(
        once.exports().module_exports("m.js").len(),
        twice.exports().module_exports("m.js").len()
    );
}

#[test]
fn empty_graph_boundaries() {
    let graph = ModuleGraph::new();
    assert!(graph.exports().all_tag_names().is_empty());
    assert!(graph.exports().element_sources("any-tag").is_empty());
    assert!(graph.transitive_elements("").is_empty());
    assert!(graph.transitive_elements_direct("unknown.js").is_empty());
}

#[test]
fn eviction_makes_new_edges_observable() {
    let graph = ModuleGraph::new();
    graph.add_direct_export("a.js", "A", "my-a");
    graph.add_direct_export("b.js", "B", "my-b");

    // Prime the cache.
    assert_eq!(graph.transitive_elements("a.js"), vec!["my-a"]);

    // The new edge evicts a.js's entry; the next query reflects b.
    graph.add_dependency("a.js", "b.js");
    assert_eq!(graph.transitive_elements("a.js"), vec!["my-a", "my-b"]);
}

#[test]
fn normalized_and_raw_specifiers_share_edges() {
    let graph = ModuleGraph::new();
    graph.add_direct_export("./my-icon.js", "MyIcon", "my-icon");
    graph.add_direct_export("my-button.js", "MyButton", "my-button");
    graph.add_dependency("my-button.js", "./my-icon.js");

    assert_eq!(
        graph.transitive_elements_direct("my-button.js"),
        vec!["my-button", "my-icon"]
    );
}
