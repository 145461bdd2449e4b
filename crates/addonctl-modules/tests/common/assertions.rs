//! Assertion helpers

#![allow(dead_code)]

use addonctl_core::types::{Diagnostics, DiagnosticCode, Plan};
use addonctl_modules::DependencyGraph;

/// Plan rendered as `"<action> <addon>"` strings
pub fn steps(plan: &Plan) -> Vec<String> {
    plan.iter().map(|s| s.to_string()).collect()
}

/// Assert `first` is planned before `second`
pub fn assert_before(plan: &Plan, first: &str, second: &str) {
    let a = plan
        .position(first)
        .unwrap_or_else(|| panic!("{} not in plan {:?}", first, steps(plan)));
    let b = plan
        .position(second)
        .unwrap_or_else(|| panic!("{} not in plan {:?}", second, steps(plan)));
    assert!(a < b, "expected {} before {} in {:?}", first, second, steps(plan));
}

/// Every install or upgrade follows all of its planned dependencies
pub fn assert_dependency_order(plan: &Plan, graph: &DependencyGraph) {
    for (i, step) in plan.iter().enumerate() {
        for dep in graph.depends(&step.addon) {
            if let Some(j) = plan.position(dep) {
                match step.action {
                    addonctl_core::types::Action::Remove => assert!(
                        j > i,
                        "{} removed before its dependent {} in {:?}",
                        dep,
                        step.addon,
                        steps(plan)
                    ),
                    _ => assert!(
                        j < i,
                        "{} planned after its dependent {} in {:?}",
                        dep,
                        step.addon,
                        steps(plan)
                    ),
                }
            }
        }
    }
}

pub fn assert_has_code(diagnostics: &Diagnostics, code: DiagnosticCode) {
    assert!(
        diagnostics.contains(code),
        "expected {} in {:#?}",
        code,
        diagnostics
    );
}
