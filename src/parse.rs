//! Full-syntax parser seam
//!
//! Deep-path analyses (scope, refs, map, diff, decompile) need a real
//! syntax tree. This module owns parser construction and the handful of
//! tree helpers the rest of the crate uses; everything else treats the
//! tree as an opaque value with byte spans.

use tree_sitter::{Node, Parser, Tree};

use crate::boundary::FunctionSpan;
use crate::error::{BundleError, Result};
use crate::text::truncate_to_char_boundary;

/// Maximum signature-prefix length carried in fallback spans and maps
pub const SIGNATURE_PREFIX_LEN: usize = 120;

/// Tree node kinds that introduce a function body
pub const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "generator_function_declaration",
    "arrow_function",
    "method_definition",
];

#[inline]
pub fn is_function_kind(kind: &str) -> bool {
    FUNCTION_KINDS.contains(&kind)
}

/// Parse a JavaScript buffer into a syntax tree.
///
/// tree-sitter is error-tolerant; a tree with localized ERROR nodes is
/// still useful for navigating a huge bundle, so only a wholesale
/// parser failure is reported as an error.
pub fn parse_source(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|e| BundleError::ParseFailed {
            message: format!("grammar load failed: {}", e),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| BundleError::ParseFailed {
            message: "parser returned no tree".to_string(),
        })?;

    if tree.root_node().has_error() {
        tracing::debug!("syntax tree contains ERROR nodes; results may be partial");
    }
    Ok(tree)
}

/// Text of a node's span
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Narrowest function-like node containing `offset`
pub fn narrowest_function_at<'t>(tree: &'t Tree, offset: usize) -> Option<Node<'t>> {
    let root = tree.root_node();
    let mut node = root.descendant_for_byte_range(offset, offset)?;
    loop {
        if is_function_kind(node.kind()) {
            return Some(node);
        }
        node = node.parent()?;
    }
}

/// Tree-based fallback for the boundary scanner.
///
/// Returns the node's span and a signature prefix but no parsed
/// parameter list; callers that need parameters must go through the
/// scanner path.
pub fn tree_fallback_span(source: &str, offset: usize) -> Result<FunctionSpan> {
    let tree = parse_source(source)?;
    let node =
        narrowest_function_at(&tree, offset).ok_or(BundleError::OffsetOutsideFunction { offset })?;

    let start = node.start_byte();
    let end = node.end_byte();
    let body_open = source[start..end]
        .find('{')
        .map(|i| start + i)
        .unwrap_or(start);
    let prefix = truncate_to_char_boundary(&source[start..body_open.max(start)], SIGNATURE_PREFIX_LEN);

    Ok(FunctionSpan {
        sig_start: start,
        body_open_brace: body_open,
        body_end: end,
        signature_text: prefix.replace('\n', " "),
        parameter_list: Vec::new(),
        param_count: 0,
    })
}
