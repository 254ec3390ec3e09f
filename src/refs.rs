//! Reference and call-graph analysis for a single function
//!
//! External references: every identifier a function reads that is not
//! declared inside it, grouped by the scope that declares it (parent,
//! grand-parent, … or global). Outgoing calls: callee names used inside
//! the function body. Incoming calls: textual occurrences of the
//! function's name followed by `(` elsewhere in the buffer, attributed
//! to their enclosing functions.

use std::collections::BTreeMap;

use serde::Serialize;
use tree_sitter::{Node, Tree};

use crate::boundary::FunctionIndex;
use crate::error::{BundleError, Result};
use crate::parse::{is_function_kind, narrowest_function_at, node_text};
use crate::scope::{BindingKind, ScopeTree};
use crate::text::{context_window, single_line, truncate_to_char_boundary};

/// Context bytes around an incoming call site
const CALL_CONTEXT: usize = 40;

/// Tolerance when matching a scope span to its tree node
const NODE_MATCH_TOLERANCE: usize = 10;

/// One external name with its occurrences
#[derive(Debug, Clone, Serialize)]
pub struct ExternalRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration_kind: Option<BindingKind>,
    pub count: usize,
    pub offsets: Vec<usize>,
}

/// External refs declared by one source scope
#[derive(Debug, Clone, Serialize)]
pub struct RefGroup {
    /// Upward distance from the target function; `None` means no
    /// declaring scope was found (global)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    pub scope_label: String,
    pub refs: Vec<ExternalRef>,
}

/// Full external-reference report
#[derive(Debug, Clone, Serialize)]
pub struct RefReport {
    pub function: String,
    pub function_start: usize,
    pub function_end: usize,
    pub groups: Vec<RefGroup>,
}

/// An outgoing callee with its call count
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingCall {
    pub name: String,
    pub count: usize,
}

/// One caller of the target function
#[derive(Debug, Clone, Serialize)]
pub struct IncomingCall {
    pub caller_signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_start: Option<usize>,
    pub call_offset: usize,
    pub context: String,
}

/// Incoming-call report
#[derive(Debug, Clone, Serialize)]
pub struct IncomingReport {
    pub name: String,
    /// Set when the name is short enough that textual matching is
    /// likely to produce false positives
    pub ambiguous: bool,
    pub calls: Vec<IncomingCall>,
}

/// Locate the tree node backing a function scope.
///
/// Scope spans and node spans should coincide; in practice parser
/// punctuation can shift the start by a few bytes, so the match allows
/// a small tolerance.
fn find_func_node_at<'t>(tree: &'t Tree, start: usize) -> Option<Node<'t>> {
    let probe = start.saturating_add(1);
    let node = narrowest_function_at(tree, probe)?;
    if node.start_byte().abs_diff(start) <= NODE_MATCH_TOLERANCE {
        Some(node)
    } else {
        None
    }
}

/// Resolve the target function scope for a deep analysis at `offset`
fn target_function<'t>(
    tree: &'t Tree,
    scopes: &ScopeTree,
    offset: usize,
) -> Result<(usize, Node<'t>)> {
    let at = scopes.find_scope_at(offset);
    let target = scopes
        .nearest_function_scope(at)
        .ok_or(BundleError::OffsetOutsideFunction { offset })?;
    let node = find_func_node_at(tree, scopes.scope(target).start)
        .or_else(|| narrowest_function_at(tree, offset))
        .ok_or(BundleError::OffsetOutsideFunction { offset })?;
    Ok((target, node))
}

/// Collect identifier reads in a function subtree, stopping descent at
/// nested function-like nodes and skipping member-property and
/// object-key positions.
fn collect_identifiers(root: Node, source: &str, out: &mut Vec<(String, usize)>) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if is_function_kind(child.kind()) {
            continue;
        }
        match child.kind() {
            "identifier" | "shorthand_property_identifier" => {
                if !is_excluded_position(&child) {
                    out.push((node_text(&child, source).to_string(), child.start_byte()));
                }
            }
            _ => collect_identifiers(child, source, out),
        }
    }
}

fn is_excluded_position(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        // non-computed property access: `obj.prop` — prop is a
        // property_identifier and never reaches here, but guard anyway
        "member_expression" => parent
            .child_by_field_name("property")
            .map(|p| p.id() == node.id())
            .unwrap_or(false),
        "pair" => parent
            .child_by_field_name("key")
            .map(|k| k.id() == node.id())
            .unwrap_or(false),
        // the function's own name in its declaration
        kind if is_function_kind(kind) => parent
            .child_by_field_name("name")
            .map(|n| n.id() == node.id())
            .unwrap_or(false),
        _ => false,
    }
}

/// External references of the function enclosing `offset`
pub fn external_refs(
    source: &str,
    tree: &Tree,
    scopes: &ScopeTree,
    offset: usize,
) -> Result<RefReport> {
    let (target, node) = target_function(tree, scopes, offset)?;
    let target_scope = scopes.scope(target);

    let mut identifiers = Vec::new();
    // walk the body and parameters, not the name
    collect_identifiers(node, source, &mut identifiers);

    // group key: declaring scope index, or None for global
    let mut groups: BTreeMap<Option<usize>, BTreeMap<String, ExternalRef>> = BTreeMap::new();

    for (name, off) in identifiers {
        let occ_scope = scopes.find_scope_at(off);
        let resolved = scopes.resolve(&name, occ_scope);
        match resolved {
            Some((decl_scope, _)) if scopes.is_within(decl_scope, target) => {
                // declared inside the function: local, not external
            }
            Some((decl_scope, binding)) => {
                let entry = groups
                    .entry(Some(decl_scope))
                    .or_default()
                    .entry(name.clone())
                    .or_insert_with(|| ExternalRef {
                        name,
                        declaration_kind: Some(binding.kind),
                        count: 0,
                        offsets: Vec::new(),
                    });
                entry.count += 1;
                entry.offsets.push(off);
            }
            None => {
                let entry = groups
                    .entry(None)
                    .or_default()
                    .entry(name.clone())
                    .or_insert_with(|| ExternalRef {
                        name,
                        declaration_kind: None,
                        count: 0,
                        offsets: Vec::new(),
                    });
                entry.count += 1;
                entry.offsets.push(off);
            }
        }
    }

    let mut out_groups: Vec<RefGroup> = Vec::new();
    for (decl_scope, refs) in groups {
        let (depth, scope_label) = match decl_scope {
            Some(s) => {
                let depth = scopes.depth_to(target, s);
                (depth, scopes.scope(s).kind.label().to_string())
            }
            None => (None, "global".to_string()),
        };
        out_groups.push(RefGroup {
            depth,
            scope_label,
            refs: refs.into_values().collect(),
        });
    }
    // nearest scopes first, global last
    out_groups.sort_by_key(|g| g.depth.unwrap_or(usize::MAX));

    let buf = source.as_bytes();
    let span = crate::boundary::enclosing_at(buf, offset)
        .ok()
        .map(|s| (s.sig_start, s.body_end));
    let function = function_display_name(source, &node);

    Ok(RefReport {
        function,
        function_start: span.map(|s| s.0).unwrap_or_else(|| node.start_byte()),
        function_end: span.map(|s| s.1).unwrap_or_else(|| node.end_byte()),
        groups: out_groups,
    })
}

/// Declared or inferred display name for a function node
pub fn function_display_name(source: &str, node: &Node) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        return node_text(&name, source).to_string();
    }
    if let Some(parent) = node.parent() {
        match parent.kind() {
            "variable_declarator" => {
                if let Some(name) = parent.child_by_field_name("name") {
                    return node_text(&name, source).to_string();
                }
            }
            "pair" => {
                if let Some(key) = parent.child_by_field_name("key") {
                    return node_text(&key, source).to_string();
                }
            }
            "assignment_expression" => {
                if let Some(left) = parent.child_by_field_name("left") {
                    return node_text(&left, source).to_string();
                }
            }
            _ => {}
        }
    }
    "<anonymous>".to_string()
}

/// Dotted callee name for a call expression's function child
fn callee_name(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "member_expression" => {
            let prop = node.child_by_field_name("property")?;
            let prop_text = node_text(&prop, source);
            match node.child_by_field_name("object") {
                Some(obj) => match callee_name(&obj, source) {
                    Some(base) => Some(format!("{}.{}", base, prop_text)),
                    None => Some(prop_text.to_string()),
                },
                None => Some(prop_text.to_string()),
            }
        }
        _ => None,
    }
}

fn collect_calls(root: Node, source: &str, out: &mut BTreeMap<String, usize>) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if is_function_kind(child.kind()) {
            continue;
        }
        if child.kind() == "call_expression" {
            if let Some(func) = child.child_by_field_name("function") {
                if let Some(name) = callee_name(&func, source) {
                    *out.entry(name).or_insert(0) += 1;
                }
            }
        }
        collect_calls(child, source, out);
    }
}

/// Outgoing calls of the function enclosing `offset`, de-duplicated and
/// sorted by occurrence count descending.
pub fn outgoing_calls(
    source: &str,
    tree: &Tree,
    scopes: &ScopeTree,
    offset: usize,
) -> Result<Vec<OutgoingCall>> {
    let (_, node) = target_function(tree, scopes, offset)?;
    let mut counts = BTreeMap::new();
    collect_calls(node, source, &mut counts);

    let mut out: Vec<OutgoingCall> = counts
        .into_iter()
        .map(|(name, count)| OutgoingCall { name, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    Ok(out)
}

/// Incoming calls: literal scan for `name(` outside the function span
pub fn incoming_calls(
    source: &str,
    tree: &Tree,
    scopes: &ScopeTree,
    offset: usize,
) -> Result<IncomingReport> {
    let (_, node) = target_function(tree, scopes, offset)?;
    let name = function_display_name(source, &node);
    if name == "<anonymous>" {
        return Ok(IncomingReport {
            name: "[anonymous]".to_string(),
            ambiguous: false,
            calls: Vec::new(),
        });
    }

    let fn_start = node.start_byte();
    let fn_end = node.end_byte();
    let needle = format!("{}(", name);
    let buf = source.as_bytes();
    let index = FunctionIndex::build(buf);

    let mut calls = Vec::new();
    let mut from = 0;
    while let Some(found) = source[from..].find(&needle) {
        let at = from + found;
        from = at + 1;
        if at >= fn_start && at < fn_end {
            continue;
        }
        // word boundary on the left so `doFetch(` does not match `etch(`
        if at > 0 {
            let prev = buf[at - 1];
            if prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'$' || prev == b'.' {
                continue;
            }
        }
        let (window, _) = context_window(source, at, at + needle.len(), CALL_CONTEXT, CALL_CONTEXT);
        let caller = index.enclosing_span(buf, at);
        calls.push(IncomingCall {
            caller_signature: caller
                .as_ref()
                .map(|s| truncate_to_char_boundary(&s.signature_text, 120).to_string())
                .unwrap_or_else(|| "(module scope)".to_string()),
            caller_start: caller.as_ref().map(|s| s.sig_start),
            call_offset: at,
            context: single_line(window),
        });
    }

    Ok(IncomingReport {
        ambiguous: name.len() <= 2,
        name,
        calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;

    fn setup(src: &str) -> (Tree, ScopeTree) {
        let tree = parse_source(src).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        (tree, scopes)
    }

    #[test]
    fn test_external_refs_parent_and_global() {
        let src = "var shared=1;function outer(){var mid=2;function inner(){return shared+mid+inner_local;var inner_local}}";
        let (tree, scopes) = setup(src);
        let offset = src.find("shared+mid").unwrap();
        let report = external_refs(src, &tree, &scopes, offset).unwrap();

        let all_names: Vec<&str> = report
            .groups
            .iter()
            .flat_map(|g| g.refs.iter().map(|r| r.name.as_str()))
            .collect();
        assert!(all_names.contains(&"shared"));
        assert!(all_names.contains(&"mid"));
        assert!(!all_names.contains(&"inner_local"));
    }

    #[test]
    fn test_locals_are_filtered() {
        let src = "function f(a){var b=2;return a+b+ext}";
        let (tree, scopes) = setup(src);
        let report = external_refs(src, &tree, &scopes, src.find("return").unwrap()).unwrap();
        let names: Vec<&str> = report
            .groups
            .iter()
            .flat_map(|g| g.refs.iter().map(|r| r.name.as_str()))
            .collect();
        assert_eq!(names, vec!["ext"]);
        assert!(report.groups[0].depth.is_none());
        assert_eq!(report.groups[0].scope_label, "global");
    }

    #[test]
    fn test_member_property_not_a_ref() {
        let src = "function f(o){return o.length+window.top}";
        let (tree, scopes) = setup(src);
        let report = external_refs(src, &tree, &scopes, src.find("return").unwrap()).unwrap();
        let names: Vec<&str> = report
            .groups
            .iter()
            .flat_map(|g| g.refs.iter().map(|r| r.name.as_str()))
            .collect();
        assert_eq!(names, vec!["window"]);
    }

    #[test]
    fn test_nested_function_bodies_skipped() {
        let src = "function f(){var cb=[1].map(function(x){return deep_ref});return cb}";
        let (tree, scopes) = setup(src);
        let report = external_refs(src, &tree, &scopes, src.find("var cb").unwrap()).unwrap();
        let names: Vec<&str> = report
            .groups
            .iter()
            .flat_map(|g| g.refs.iter().map(|r| r.name.as_str()))
            .collect();
        assert!(!names.contains(&"deep_ref"));
    }

    #[test]
    fn test_refs_at_module_scope_errors() {
        let src = "var a=1;";
        let (tree, scopes) = setup(src);
        let err = external_refs(src, &tree, &scopes, 2).unwrap_err();
        assert!(matches!(err, BundleError::OffsetOutsideFunction { .. }));
    }

    #[test]
    fn test_outgoing_calls_sorted_by_count() {
        let src = "function f(){a();b();a();obj.method();a()}";
        let (tree, scopes) = setup(src);
        let calls = outgoing_calls(src, &tree, &scopes, src.find("a()").unwrap()).unwrap();
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[0].count, 3);
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"b"));
        assert!(names.contains(&"obj.method"));
    }

    #[test]
    fn test_chained_member_callee() {
        let src = "function f(){a.b.c()}";
        let (tree, scopes) = setup(src);
        let calls = outgoing_calls(src, &tree, &scopes, src.find("a.b").unwrap()).unwrap();
        assert_eq!(calls[0].name, "a.b.c");
    }

    #[test]
    fn test_incoming_calls_exclude_own_span() {
        let src = "function target(){target()}function caller(){target();target()}";
        let (tree, scopes) = setup(src);
        let report = incoming_calls(src, &tree, &scopes, src.find("){target()}").unwrap()).unwrap();
        assert_eq!(report.name, "target");
        assert!(!report.ambiguous);
        assert_eq!(report.calls.len(), 2);
        assert!(report.calls[0].caller_signature.contains("caller"));
    }

    #[test]
    fn test_incoming_short_name_flagged_ambiguous() {
        let src = "function q(){return 1}var r=q();";
        let (tree, scopes) = setup(src);
        let report = incoming_calls(src, &tree, &scopes, src.find("return").unwrap()).unwrap();
        assert!(report.ambiguous);
        assert_eq!(report.calls.len(), 1);
    }

    #[test]
    fn test_incoming_anonymous() {
        let src = "[1].forEach(function(x){use(x)});";
        let (tree, scopes) = setup(src);
        let report = incoming_calls(src, &tree, &scopes, src.find("use").unwrap()).unwrap();
        assert_eq!(report.name, "[anonymous]");
        assert!(report.calls.is_empty());
    }
}
