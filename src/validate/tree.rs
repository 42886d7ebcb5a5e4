use std::collections::HashSet;

use super::{expected_shape, pattern_error, Finding, FindingKind};
use crate::node::{is_keyword, keyword_applies, SchemaNode, Shape};
use crate::tree::SchemaTree;

/// Report every invariant violation in `tree`. Trees built through the node
/// model come back clean; imported or hand-assembled arenas may not.
pub fn check_tree(tree: &SchemaTree) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut reached = HashSet::new();
    let mut stack = vec![tree.root()];

    while let Some(id) = stack.pop() {
        if !reached.insert(id) {
            continue;
        }
        let Some(node) = tree.get(id) else { continue };
        let path = tree.pointer_of(id).unwrap_or_default();
        let mut report = |kind| findings.push(Finding { path: path.clone(), node: Some(id), kind });

        // ---- structure ----
        let mut seen_names = HashSet::new();
        for child_id in node.shape.children() {
            let Some(child) = tree.get(*child_id) else {
                report(FindingKind::DanglingChild { child: *child_id });
                continue;
            };
            if child.parent != Some(id) {
                report(FindingKind::ParentMismatch { child: *child_id });
            }
            if matches!(node.shape, Shape::Object { .. })
                && !child.has_blank_name()
                && !seen_names.insert(child.name.as_str())
            {
                report(FindingKind::DuplicateName { name: child.name.clone() });
            }
        }
        if matches!(node.shape, Shape::Array { .. }) {
            let count = tree.iter().filter(|n| n.parent == Some(id)).count();
            if count > 1 {
                report(FindingKind::TooManyItems { count });
            }
        }

        // ---- fields ----
        check_constraints(node, &mut report);
        if !node.passthrough.is_verbatim() {
            let ty = node.schema_type();
            for key in node.passthrough.fields.keys().filter(|k| is_keyword(k)) {
                let kind = match expected_shape(key) {
                    Some(expected) if keyword_applies(key, ty) => {
                        FindingKind::InvalidValue { field: key.clone(), expected }
                    }
                    _ if keyword_applies(key, ty) => FindingKind::InvalidValue {
                        field: key.clone(),
                        expected: "a well-formed value",
                    },
                    _ => FindingKind::InapplicableField { field: key.clone(), ty },
                };
                report(kind);
            }
        }

        stack.extend(node.shape.children().iter().rev().copied());
    }

    for node in tree.iter().filter(|n| !reached.contains(&n.id)) {
        findings.push(Finding { path: String::new(), node: Some(node.id), kind: FindingKind::Unreachable });
    }
    findings
}

fn check_constraints(node: &SchemaNode, report: &mut impl FnMut(FindingKind)) {
    match &node.shape {
        Shape::String(c) => {
            if let Some(message) = c.pattern.as_deref().and_then(pattern_error) {
                report(FindingKind::InvalidPattern { message });
            }
            if let (Some(lo), Some(hi)) = (c.min_length, c.max_length) {
                if lo > hi {
                    report(FindingKind::InvertedRange { lower: "minLength".into(), upper: "maxLength".into() });
                }
            }
        }
        Shape::Number(c) => {
            let bounds = (c.minimum.as_ref().and_then(|n| n.as_f64()), c.maximum.as_ref().and_then(|n| n.as_f64()));
            if let (Some(lo), Some(hi)) = bounds {
                if lo > hi {
                    report(FindingKind::InvertedRange { lower: "minimum".into(), upper: "maximum".into() });
                }
            }
        }
        _ => {}
    }
}
