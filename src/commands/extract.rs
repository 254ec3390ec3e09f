//! extract-fn command

use console::style;
use serde::Serialize;

use crate::boundary::{self, FunctionSpan};
use crate::cli::ExtractFnArgs;
use crate::commands::{to_json, CommandContext};
use crate::error::{BundleError, Result};
use crate::fs_utils::read_source;
use crate::parse::tree_fallback_span;

#[derive(Serialize)]
struct Extraction<'a> {
    offset: usize,
    depth: usize,
    used_tree_fallback: bool,
    function: &'a FunctionSpan,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    text: &'a str,
}

pub fn run_extract_fn(args: &ExtractFnArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let buf = source.as_bytes();

    let mut used_fallback = false;
    let stack = match boundary::nesting_stack_at(buf, args.offset) {
        Ok(stack) => stack,
        Err(e @ BundleError::InvalidInput { .. }) => return Err(e),
        Err(e) => {
            if args.no_ast_fallback {
                return Err(e);
            }
            tracing::debug!("scanner failed ({}), trying tree fallback", e);
            used_fallback = true;
            vec![tree_fallback_span(&source, args.offset)?]
        }
    };

    if args.stack {
        if ctx.json() {
            return to_json(&stack);
        }
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} levels at offset {}\n",
            style("nesting").bold(),
            stack.len(),
            args.offset
        ));
        for (depth, span) in stack.iter().enumerate() {
            out.push_str(&format!(
                "  depth {}: [{}..{}] ({} bytes) {}\n",
                depth,
                span.sig_start,
                span.body_end,
                span.len(),
                span.signature_text
            ));
        }
        return Ok(out);
    }

    let depth = args.depth.unwrap_or(0);
    let span = stack.get(depth).ok_or_else(|| BundleError::InvalidInput {
        message: format!(
            "depth {} out of range; nesting stack has {} entries",
            depth,
            stack.len()
        ),
    })?;
    let text = &source[span.sig_start..span.body_end];
    let name = boundary::infer_name(buf, span);

    if ctx.json() {
        return to_json(&Extraction {
            offset: args.offset,
            depth,
            used_tree_fallback: used_fallback,
            function: span,
            name,
            text,
        });
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {} [{}..{}] ({} bytes, {} params)\n",
        style("function").bold(),
        style(name.as_deref().unwrap_or("<anonymous>")).cyan(),
        span.sig_start,
        span.body_end,
        span.len(),
        span.param_count,
    ));
    if used_fallback {
        out.push_str("resolved via tree fallback; parameter list unavailable\n");
    }
    if !span.parameter_list.is_empty() {
        out.push_str(&format!("params: {}\n", span.parameter_list.join(", ")));
    }
    out.push('\n');
    out.push_str(text);
    out.push('\n');
    Ok(out)
}
