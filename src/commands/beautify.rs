//! beautify, slice and context commands

use console::style;
use serde::Serialize;

use crate::beautify::{beautify, beautify_slice};
use crate::boundary;
use crate::cli::{BeautifyArgs, ContextArgs, SliceArgs};
use crate::commands::{to_json, CommandContext};
use crate::error::{BundleError, Result};
use crate::fs_utils::{derived_path, read_source, write_atomic};
use crate::landmarks::{collect_landmarks, LandmarkQuery};
use crate::text::{ceil_char_boundary, floor_char_boundary, truncate_to_char_boundary};

/// Landmark radius for the context command
const CONTEXT_LANDMARK_RADIUS: usize = 2_000;

/// Bytes on each side of the offset in the context window
const CONTEXT_WINDOW: usize = 200;

pub fn run_beautify(args: &BeautifyArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    tracing::debug!(bytes = source.len(), "beautifying {}", args.file.display());

    let result = beautify(source.as_bytes());

    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| derived_path(&args.file, ".beautified.js"));
    let map_path = derived_path(args.output.as_ref().unwrap_or(&args.file), ".offsetmap.json");

    write_atomic(&out_path, &result.text)?;
    write_atomic(&map_path, &serde_json::to_string(&result.line_offsets).map_err(io_err)?)?;

    if ctx.json() {
        #[derive(Serialize)]
        struct Written {
            output: String,
            offset_map: String,
            lines: usize,
            input_bytes: usize,
        }
        return to_json(&Written {
            output: out_path.display().to_string(),
            offset_map: map_path.display().to_string(),
            lines: result.line_offsets.len(),
            input_bytes: source.len(),
        });
    }

    Ok(format!(
        "{} {} ({} lines)\n{} {}\n",
        style("wrote").green(),
        out_path.display(),
        result.line_offsets.len(),
        style("wrote").green(),
        map_path.display(),
    ))
}

fn io_err(e: serde_json::Error) -> BundleError {
    BundleError::InvalidInput {
        message: format!("JSON serialization failed: {}", e),
    }
}

pub fn run_slice(args: &SliceArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    if args.offset >= source.len() {
        return Err(BundleError::InvalidInput {
            message: format!(
                "offset {} is past the end of the buffer ({})",
                args.offset,
                source.len()
            ),
        });
    }

    let start = floor_char_boundary(&source, args.offset.saturating_sub(args.before));
    let end = ceil_char_boundary(
        &source,
        args.offset.saturating_add(args.length).saturating_add(args.after),
    );

    let body = if args.beautify {
        beautify_slice(source.as_bytes(), start, end).text
    } else {
        source[start..end].to_string()
    };

    if ctx.json() {
        #[derive(Serialize)]
        struct Slice {
            start: usize,
            end: usize,
            text: String,
        }
        return to_json(&Slice {
            start,
            end,
            text: body,
        });
    }

    Ok(format!(
        "{} bytes {}..{}\n{}\n",
        style("slice").bold(),
        start,
        end,
        body
    ))
}

pub fn run_context(args: &ContextArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    if args.offset >= source.len() {
        return Err(BundleError::InvalidInput {
            message: format!(
                "offset {} is past the end of the buffer ({})",
                args.offset,
                source.len()
            ),
        });
    }
    let buf = source.as_bytes();

    // enclosing function, if any
    let enclosing = boundary::enclosing_at(buf, args.offset).ok();

    // nearby landmarks
    let landmarks = LandmarkQuery::new()
        .with_near(args.offset, CONTEXT_LANDMARK_RADIUS)
        .apply(collect_landmarks(buf));

    // beautified window with a marker on the offset's line
    let win_start = floor_char_boundary(&source, args.offset.saturating_sub(CONTEXT_WINDOW));
    let win_end = ceil_char_boundary(&source, args.offset + CONTEXT_WINDOW);
    let pretty = beautify_slice(buf, win_start, win_end);
    let marker_line = pretty
        .line_offsets
        .iter()
        .rposition(|&off| off <= args.offset)
        .unwrap_or(0);

    if ctx.json() {
        #[derive(Serialize)]
        struct Context<'a> {
            offset: usize,
            enclosing: Option<&'a crate::boundary::FunctionSpan>,
            landmarks: &'a [crate::landmarks::StringLiteral],
            window: &'a str,
            marker_line: usize,
        }
        return to_json(&Context {
            offset: args.offset,
            enclosing: enclosing.as_ref(),
            landmarks: &landmarks,
            window: &pretty.text,
            marker_line,
        });
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} offset {}\n",
        style("context").bold(),
        args.offset
    ));
    match &enclosing {
        Some(span) => {
            let name = boundary::infer_name(buf, span).unwrap_or_else(|| "<anonymous>".to_string());
            out.push_str(&format!(
                "enclosing: {} [{}..{}] {}\n",
                style(&name).cyan(),
                span.sig_start,
                span.body_end,
                truncate_to_char_boundary(&span.signature_text, 80),
            ));
        }
        None => out.push_str("enclosing: (module scope)\n"),
    }

    if landmarks.is_empty() {
        out.push_str("landmarks: none nearby\n");
    } else {
        out.push_str(&format!("landmarks ({} nearby):\n", landmarks.len()));
        for l in landmarks.iter().take(10) {
            out.push_str(&format!(
                "  {:>10}  {:?}\n",
                l.offset,
                truncate_to_char_boundary(&l.content, 60)
            ));
        }
    }

    out.push('\n');
    for (i, line) in pretty.text.lines().enumerate() {
        if i == marker_line {
            out.push_str(&format!("{} {}\n", style(">>>").red().bold(), line));
        } else {
            out.push_str(&format!("    {}\n", line));
        }
    }
    Ok(out)
}
