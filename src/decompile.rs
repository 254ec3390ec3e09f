//! Decompile annotator: readable-name proposals for one function
//!
//! Minified identifiers carry no meaning, but their usage does: the key
//! they were destructured from, the initialiser they came out of, the
//! properties accessed on them, the string literals they are compared
//! against, the calls they are passed into. This module collects those
//! contexts for a single extracted
//! function, proposes readable alternatives for identifiers of three
//! characters or fewer, and expands the common minification idioms
//! (`!0`, `!1`, `void 0`) in the beautified output. Renames are
//! suggested, never applied; annotations do not alter semantics.

use std::collections::BTreeMap;

use serde::Serialize;
use tree_sitter::{Node, Tree};

use crate::beautify::beautify;
use crate::boundary;
use crate::error::Result;
use crate::parse::{self, node_text};
use crate::scan::{ScanMode, Scanner};

/// Identifiers longer than this are left alone
const SHORT_IDENT_LEN: usize = 3;

/// A proposed rename with the evidence behind it
#[derive(Debug, Clone, Serialize)]
pub struct RenameProposal {
    pub identifier: String,
    pub suggestion: String,
    pub reason: String,
}

/// Annotated output for one function
#[derive(Debug, Clone, Serialize)]
pub struct DecompileResult {
    pub function_name: String,
    pub sig_start: usize,
    pub body_end: usize,
    pub short_identifier_count: usize,
    pub annotated_count: usize,
    /// `annotated_count / short_identifier_count`
    pub confidence: f64,
    pub proposals: Vec<RenameProposal>,
    /// Beautified source with idiom expansions
    pub text: String,
}

#[derive(Default)]
struct IdentUsage {
    from_key: Option<String>,
    init_desc: Option<String>,
    props: Vec<String>,
    comparisons: Vec<String>,
    /// Callees this identifier was passed to as an argument
    call_args: Vec<String>,
}

/// Annotate the function enclosing `offset`.
pub fn decompile_function(source: &str, offset: usize) -> Result<DecompileResult> {
    let span = match boundary::enclosing_at(source.as_bytes(), offset) {
        Ok(span) => span,
        Err(_) => parse::tree_fallback_span(source, offset)?,
    };
    let fn_src = &source[span.sig_start..span.body_end];
    let name = boundary::infer_name(source.as_bytes(), &span)
        .unwrap_or_else(|| "<anonymous>".to_string());

    let (tree, wrapped) = parse_snippet(fn_src)?;
    let mut usages: BTreeMap<String, IdentUsage> = BTreeMap::new();
    collect_usages(tree.root_node(), &wrapped, &mut usages);

    let short_identifier_count = usages.len();
    let mut proposals = Vec::new();
    for (ident, usage) in &usages {
        if let Some((suggestion, reason)) = propose(usage) {
            proposals.push(RenameProposal {
                identifier: ident.clone(),
                suggestion,
                reason,
            });
        }
    }
    let annotated_count = proposals.len();
    let confidence = if short_identifier_count == 0 {
        1.0
    } else {
        annotated_count as f64 / short_identifier_count as f64
    };

    let pretty = beautify(fn_src.as_bytes());
    let mut text = String::new();
    for p in &proposals {
        text.push_str(&format!(
            "/* {} -> {} ({}) */\n",
            p.identifier, p.suggestion, p.reason
        ));
    }
    // call-argument context still orients the reader when no rename
    // could be derived from it
    for (ident, usage) in &usages {
        if usage.call_args.is_empty() || proposals.iter().any(|p| &p.identifier == ident) {
            continue;
        }
        let mut callees: Vec<&str> = usage.call_args.iter().map(String::as_str).collect();
        callees.sort_unstable();
        callees.dedup();
        text.push_str(&format!("/* {} passed to {} */\n", ident, callees.join(", ")));
    }
    text.push_str(&expand_idioms(&pretty.text));

    Ok(DecompileResult {
        function_name: name,
        sig_start: span.sig_start,
        body_end: span.body_end,
        short_identifier_count,
        annotated_count,
        confidence,
        proposals,
        text,
    })
}

/// Parse an extracted function snippet, wrapping it when the bare form
/// is not a valid statement (anonymous expressions, method shorthand).
fn parse_snippet(fn_src: &str) -> Result<(Tree, String)> {
    let candidates = [
        fn_src.to_string(),
        format!("var _w={};", fn_src),
        format!("var _w={{{}}};", fn_src),
    ];
    let mut first: Option<(Tree, String)> = None;
    for candidate in candidates {
        let tree = parse::parse_source(&candidate)?;
        if !tree.root_node().has_error() {
            return Ok((tree, candidate));
        }
        if first.is_none() {
            first = Some((tree, candidate));
        }
    }
    // tolerate a partial tree rather than refusing to annotate
    match first {
        Some(pair) => Ok(pair),
        None => Ok((parse::parse_source(fn_src)?, fn_src.to_string())),
    }
}

fn is_short_ident(node: &Node, source: &str) -> Option<String> {
    if node.kind() != "identifier" {
        return None;
    }
    let text = node_text(node, source);
    if text.is_empty() || text.len() > SHORT_IDENT_LEN || text == "_w" {
        return None;
    }
    Some(text.to_string())
}

fn collect_usages(node: Node, source: &str, usages: &mut BTreeMap<String, IdentUsage>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            // `{key: x}` in a pattern: x was destructured from key
            "pair_pattern" => {
                if let (Some(key), Some(value)) = (
                    child.child_by_field_name("key"),
                    child.child_by_field_name("value"),
                ) {
                    if let Some(name) = is_short_ident(&value, source) {
                        usages.entry(name).or_default().from_key =
                            Some(node_text(&key, source).to_string());
                    }
                }
            }
            "variable_declarator" => {
                if let (Some(name_node), Some(value)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("value"),
                ) {
                    if let Some(name) = is_short_ident(&name_node, source) {
                        let entry = usages.entry(name).or_default();
                        if entry.init_desc.is_none() {
                            entry.init_desc = describe_initializer(&value, source);
                        }
                    }
                }
            }
            "member_expression" => {
                if let (Some(object), Some(prop)) = (
                    child.child_by_field_name("object"),
                    child.child_by_field_name("property"),
                ) {
                    if let Some(name) = is_short_ident(&object, source) {
                        usages
                            .entry(name)
                            .or_default()
                            .props
                            .push(node_text(&prop, source).to_string());
                    }
                }
            }
            "binary_expression" => {
                collect_comparison(&child, source, usages);
            }
            // a short identifier in call-argument position
            "call_expression" => {
                if let (Some(callee), Some(arguments)) = (
                    child.child_by_field_name("function"),
                    child.child_by_field_name("arguments"),
                ) {
                    let callee_text = node_text(&callee, source);
                    let mut args_cursor = arguments.walk();
                    for arg in arguments.children(&mut args_cursor) {
                        if let Some(name) = is_short_ident(&arg, source) {
                            usages
                                .entry(name)
                                .or_default()
                                .call_args
                                .push(callee_text.to_string());
                        }
                    }
                }
            }
            "identifier" => {
                // a bare use still counts toward the short-ident
                // census; the function's own declared name does not
                if !is_declaration_name(&child) {
                    if let Some(name) = is_short_ident(&child, source) {
                        usages.entry(name).or_default();
                    }
                }
            }
            _ => {}
        }
        collect_usages(child, source, usages);
    }
}

fn is_declaration_name(node: &Node) -> bool {
    node.parent()
        .filter(|p| crate::parse::is_function_kind(p.kind()))
        .and_then(|p| p.child_by_field_name("name"))
        .map(|n| n.id() == node.id())
        .unwrap_or(false)
}

fn collect_comparison(node: &Node, source: &str, usages: &mut BTreeMap<String, IdentUsage>) {
    let Some(op) = node.child_by_field_name("operator") else {
        return;
    };
    if !matches!(node_text(&op, source), "===" | "==" | "!==" | "!=") {
        return;
    }
    let left = node.child_by_field_name("left");
    let right = node.child_by_field_name("right");
    let (ident, literal) = match (&left, &right) {
        (Some(l), Some(r)) if l.kind() == "identifier" && r.kind() == "string" => (l, r),
        (Some(l), Some(r)) if r.kind() == "identifier" && l.kind() == "string" => (r, l),
        _ => return,
    };
    if let Some(name) = is_short_ident(ident, source) {
        let text = node_text(literal, source);
        if text.len() >= 2 {
            usages
                .entry(name)
                .or_default()
                .comparisons
                .push(text[1..text.len() - 1].to_string());
        }
    }
}

fn describe_initializer(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "call_expression" => {
            let callee = node.child_by_field_name("function")?;
            let last = node_text(&callee, source).rsplit('.').next()?.to_string();
            Some(to_camel_case(&format!("{}_result", last)))
        }
        "new_expression" => {
            let ctor = node.child_by_field_name("constructor")?;
            let last = node_text(&ctor, source).rsplit('.').next()?.to_string();
            Some(to_camel_case(&format!("{}_instance", last)))
        }
        "member_expression" => {
            let prop = node.child_by_field_name("property")?;
            Some(to_camel_case(node_text(&prop, source)))
        }
        "string" => {
            let text = node_text(node, source);
            let inner = text.get(1..text.len().saturating_sub(1))?;
            let words: Vec<&str> = inner.split_whitespace().take(3).collect();
            if words.is_empty() {
                None
            } else {
                Some(to_camel_case(&words.join("_")))
            }
        }
        _ => None,
    }
}

/// Pick a proposal by priority: destructured key, initialiser
/// description, property suffix, comparison suffix.
fn propose(usage: &IdentUsage) -> Option<(String, String)> {
    if let Some(key) = &usage.from_key {
        return Some((to_camel_case(key), "destructured key".to_string()));
    }
    if let Some(desc) = &usage.init_desc {
        return Some((desc.clone(), "initialiser".to_string()));
    }
    if !usage.props.is_empty() {
        let mut counts: BTreeMap<&String, usize> = BTreeMap::new();
        for p in &usage.props {
            *counts.entry(p).or_insert(0) += 1;
        }
        // first maximum wins, so ties resolve deterministically
        let mut top: Option<(&String, usize)> = None;
        for (name, count) in counts {
            if top.map_or(true, |(_, c)| count > c) {
                top = Some((name, count));
            }
        }
        let top = top?.0;
        return Some((
            to_camel_case(&format!("with_{}", top)),
            "property access".to_string(),
        ));
    }
    if let Some(first) = usage.comparisons.first() {
        return Some((
            to_camel_case(&format!("{}_value", first)),
            "string comparison".to_string(),
        ));
    }
    None
}

/// Convert a word sequence to camelCase
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::new();
    for (i, word) in s
        .split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        match chars.next() {
            None => {}
            Some(first) if i == 0 => {
                out.extend(first.to_lowercase());
                out.push_str(chars.as_str());
            }
            Some(first) => {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Expand `!0`, `!1` and `void 0` in code context, keeping the original
/// text in a trailing comment.
fn expand_idioms(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut scanner = Scanner::new(bytes);
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut skip = 0usize;

    while let Some((pos, ch, mode)) = scanner.step() {
        if skip > 0 {
            skip -= 1;
            continue;
        }
        if mode == ScanMode::Normal {
            if ch == b'!' && terminated_digit(bytes, pos + 1) {
                match bytes[pos + 1] {
                    b'0' => {
                        out.extend_from_slice(b"true /* !0 */");
                        skip = 1;
                        continue;
                    }
                    b'1' => {
                        out.extend_from_slice(b"false /* !1 */");
                        skip = 1;
                        continue;
                    }
                    _ => {}
                }
            }
            if ch == b'v' && bytes[pos..].starts_with(b"void 0") && terminated_at(bytes, pos + 6) {
                let preceded_ok = pos == 0 || !is_ident_byte(bytes[pos - 1]);
                if preceded_ok {
                    out.extend_from_slice(b"undefined /* void 0 */");
                    skip = 5;
                    continue;
                }
            }
        }
        out.push(ch);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn terminated_digit(bytes: &[u8], pos: usize) -> bool {
    matches!(bytes.get(pos), Some(b'0') | Some(b'1')) && terminated_at(bytes, pos + 1)
}

fn terminated_at(bytes: &[u8], pos: usize) -> bool {
    match bytes.get(pos) {
        None => true,
        Some(&b) => !is_ident_byte(b) && b != b'.',
    }
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructured_key_proposal() {
        let src = "function f(A){var {queuedCommands:q}=A;return q.length}";
        let result = decompile_function(src, 30).unwrap();
        let p = result
            .proposals
            .iter()
            .find(|p| p.identifier == "q")
            .unwrap();
        assert_eq!(p.suggestion, "queuedCommands");
        assert_eq!(p.reason, "destructured key");
    }

    #[test]
    fn test_initializer_proposal() {
        let src = "function f(){var c=getConfig();return c}";
        let result = decompile_function(src, 20).unwrap();
        let p = result
            .proposals
            .iter()
            .find(|p| p.identifier == "c")
            .unwrap();
        assert_eq!(p.suggestion, "getConfigResult");
        assert_eq!(p.reason, "initialiser");
    }

    #[test]
    fn test_property_access_proposal() {
        let src = "function f(el){el.style;el.style;el.remove()}";
        let result = decompile_function(src, 20).unwrap();
        let p = result
            .proposals
            .iter()
            .find(|p| p.identifier == "el")
            .unwrap();
        assert_eq!(p.suggestion, "withStyle");
        assert_eq!(p.reason, "property access");
    }

    #[test]
    fn test_comparison_proposal() {
        let src = r#"function f(st){if(st==="pending")return 1;return 0}"#;
        let result = decompile_function(src, 25).unwrap();
        let p = result
            .proposals
            .iter()
            .find(|p| p.identifier == "st")
            .unwrap();
        assert_eq!(p.suggestion, "pendingValue");
        assert_eq!(p.reason, "string comparison");
    }

    #[test]
    fn test_call_argument_context_annotated() {
        let src = "function f(ab){doWork(ab);emit(ab);return 1}";
        let result = decompile_function(src, 20).unwrap();
        assert!(result.text.contains("/* ab passed to doWork, emit */"));
        // call-argument context alone proposes no rename
        assert!(!result.proposals.iter().any(|p| p.identifier == "ab"));
        assert_eq!(result.short_identifier_count, 1);
    }

    #[test]
    fn test_idiom_expansion() {
        let expanded = expand_idioms("a=!0;b=!1;c=void 0;");
        assert!(expanded.contains("true /* !0 */"));
        assert!(expanded.contains("false /* !1 */"));
        assert!(expanded.contains("undefined /* void 0 */"));
    }

    #[test]
    fn test_idiom_expansion_skips_strings_and_numbers() {
        let expanded = expand_idioms(r#"s="!0";n=!0.5;m=10;"#);
        assert!(expanded.contains(r#"s="!0""#));
        assert!(expanded.contains("!0.5"));
        assert!(expanded.contains("m=10"));
    }

    #[test]
    fn test_confidence_ratio() {
        let src = "function f(a,b){var c=getItems();return a+b+c}";
        let result = decompile_function(src, 25).unwrap();
        assert_eq!(result.short_identifier_count, 3);
        assert_eq!(result.annotated_count, 1);
        assert!((result.confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_identifiers_untouched() {
        let src = "function f(longName){return longName+1}";
        let result = decompile_function(src, 25).unwrap();
        assert!(!result.proposals.iter().any(|p| p.identifier == "longName"));
    }

    #[test]
    fn test_output_is_beautified() {
        let src = "function f(x){if(x){return !0}return !1}";
        let result = decompile_function(src, 20).unwrap();
        assert!(result.text.lines().count() > 1);
        assert!(result.text.contains("true /* !0 */"));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("queued_commands"), "queuedCommands");
        assert_eq!(to_camel_case("with_style"), "withStyle");
        assert_eq!(to_camel_case("single"), "single");
    }
}
