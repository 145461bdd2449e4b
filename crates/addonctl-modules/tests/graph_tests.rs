//! Dependency graph integration tests
//!
//! Tests graph construction including:
//! - Cycle detection over discovered addons
//! - Transitive unresolved dependencies
//! - Topological order soundness and determinism

mod common;

use addonctl_core::types::{DiagnosticCode, Manifest, Severity};
use addonctl_modules::{AddonRegistry, DependencyGraph, Direction};
use common::*;
use proptest::prelude::*;

#[test]
fn test_cycle_over_discovered_addons() {
    let tree = AddonTree::new()
        .addon("base", &[])
        .addon("a", &["b"])
        .addon("b", &["a"]);
    let registry = tree.discover();

    let err = DependencyGraph::build(&registry).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::DependencyCycle);
    assert_eq!(err.context["cycle"], "a,b,a");
    assert!(err.is_fatal());
}

#[test]
fn test_longer_cycle_path() {
    let tree = AddonTree::new()
        .addon("base", &[])
        .addon("x", &["y"])
        .addon("y", &["z"])
        .addon("z", &["x"]);
    let err = DependencyGraph::build(&tree.discover()).unwrap_err();
    assert_eq!(err.context["cycle"], "x,y,z,x");
}

#[test]
fn test_dependency_on_broken_addon_is_unresolved() {
    let tree = AddonTree::new()
        .addon("base", &[])
        .add_in(0, "bad", addonctl_core::types::ManifestFile::Manifest, "{'name': 'bad'")
        .addon("uses_bad", &["bad"])
        .addon("uses_uses_bad", &["uses_bad"]);
    let registry = tree.discover();
    let graph = DependencyGraph::build(&registry).unwrap();

    assert!(graph.is_unresolved("uses_bad"));
    assert!(graph.is_unresolved("uses_uses_bad"));
    assert!(graph.unresolved_reason("uses_bad").unwrap().message.contains("is broken"));
    assert!(graph.contains("base"));
}

#[test]
fn test_unresolved_dependency_is_fatal_for_its_addon_only() {
    let registry = AddonTree::new()
        .addon("base", &[])
        .addon("sale", &[])
        .addon("x", &["sale", "ghost"])
        .discover();
    let graph = DependencyGraph::build(&registry).unwrap();

    let diagnostics = graph.unresolved_diagnostics();
    let unresolved = &diagnostics.with_code(DiagnosticCode::UnresolvedDependency)[0];
    assert_eq!(unresolved.severity, Severity::Fatal);
    assert_eq!(unresolved.addon.as_deref(), Some("x"));
    assert!(diagnostics.has_fatal());
    assert!(!diagnostics.has_blocking());
}

#[test]
fn test_cycle_reported_when_members_reach_missing_addon() {
    let tree = AddonTree::new()
        .addon("base", &[])
        .addon("a", &["b"])
        .addon("b", &["a", "ghost"]);
    let err = DependencyGraph::build(&tree.discover()).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::DependencyCycle);
    assert_eq!(err.context["cycle"], "a,b,a");
}

#[test]
fn test_reverse_closure_of_base_is_everything() {
    let (_, graph) = sales_tree().graph();
    let all: Vec<String> = graph.names().map(str::to_string).collect();
    let reverse = graph.transitive_closure(["base"], Direction::Reverse);
    assert_eq!(reverse.into_iter().collect::<Vec<_>>(), all);
}

/// Random DAG: addon `n{i}` may only depend on addons with a smaller index
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>()
    })
}

fn build(deps: &[Vec<usize>]) -> (AddonRegistry, DependencyGraph) {
    let mut manifests = vec![Manifest::new("base")];
    for (i, d) in deps.iter().enumerate() {
        let mut m = Manifest::new(format!("n{:02}", i));
        m.depends = d
            .iter()
            .filter(|j| **j < i)
            .map(|j| format!("n{:02}", j))
            .collect();
        manifests.push(m);
    }
    let registry = AddonRegistry::from_manifests(manifests);
    let graph = DependencyGraph::build(&registry).unwrap();
    (registry, graph)
}

proptest! {
    #[test]
    fn prop_topological_order_is_sound(deps in dag_strategy()) {
        let (_, graph) = build(&deps);
        let names: Vec<String> = graph.names().map(str::to_string).collect();
        let order = graph.topological_order(&names);

        prop_assert_eq!(order.len(), names.len());
        for (i, name) in order.iter().enumerate() {
            for dep in graph.depends(name) {
                let j = order.iter().position(|n| n == dep).unwrap();
                prop_assert!(j < i, "{} must precede {}", dep, name);
            }
        }
    }

    #[test]
    fn prop_topological_order_ignores_input_order(deps in dag_strategy()) {
        let (_, graph) = build(&deps);
        let names: Vec<String> = graph.names().map(str::to_string).collect();
        let mut reversed = names.clone();
        reversed.reverse();
        prop_assert_eq!(graph.topological_order(&names), graph.topological_order(&reversed));
    }

    #[test]
    fn prop_forward_closure_contains_dependencies(deps in dag_strategy()) {
        let (_, graph) = build(&deps);
        for name in graph.names() {
            let closure = graph.transitive_closure([name], Direction::Forward);
            for dep in graph.depends(name) {
                prop_assert!(closure.contains(dep));
                let sub = graph.transitive_closure([dep], Direction::Forward);
                prop_assert!(sub.is_subset(&closure));
            }
        }
    }
}
