//! strings command: landmark listing and cross-version string diff

use console::style;

use crate::boundary::FunctionIndex;
use crate::cli::StringsArgs;
use crate::commands::{to_json, CommandContext};
use crate::error::Result;
use crate::fnmap::{diff_strings, StringsDiffOptions};
use crate::fs_utils::read_source;
use crate::landmarks::{collect_landmarks, LandmarkQuery, DEFAULT_NEAR_RADIUS};
use crate::text::truncate_to_char_boundary;

/// Enclosing-name enrichment is skipped above this result count to keep
/// the command fast on giant bundles
const ENRICH_LIMIT: usize = 500;

/// Default display limit per side in diff mode
const DIFF_DISPLAY_LIMIT: usize = 50;

pub fn run_strings(args: &StringsArgs, ctx: &CommandContext) -> Result<String> {
    match &args.diff {
        Some(file2) => run_strings_diff(args, file2, ctx),
        None => run_strings_list(args, ctx),
    }
}

fn run_strings_list(args: &StringsArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let buf = source.as_bytes();

    let mut query = LandmarkQuery::new();
    if let Some(filter) = &args.filter {
        query = query.with_filter(filter.clone());
    }
    if let Some(near) = args.near {
        query = query.with_near(near, DEFAULT_NEAR_RADIUS);
    }

    let mut landmarks = query.apply(collect_landmarks(buf));
    let total = landmarks.len();

    if total <= ENRICH_LIMIT {
        let index = FunctionIndex::build(buf);
        for landmark in &mut landmarks {
            landmark.enclosing_function_name = index.enclosing_name(buf, landmark.offset);
        }
    } else {
        tracing::debug!(total, "skipping function-name enrichment");
    }

    if let Some(limit) = args.limit {
        if !args.all {
            landmarks.truncate(limit);
        }
    }

    if ctx.json() {
        return to_json(&landmarks);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {} string landmarks\n",
        style("strings").bold(),
        total
    ));
    for l in &landmarks {
        let func = l
            .enclosing_function_name
            .as_deref()
            .map(|n| format!("  in {}", n))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:>10}  {:?}{}\n",
            l.offset,
            truncate_to_char_boundary(&l.content, 80),
            func
        ));
    }
    if landmarks.len() < total {
        out.push_str(&format!("... and {} more\n", total - landmarks.len()));
    }
    Ok(out)
}

fn run_strings_diff(
    args: &StringsArgs,
    file2: &std::path::Path,
    ctx: &CommandContext,
) -> Result<String> {
    let v1 = read_source(&args.file)?;
    let v2 = read_source(file2)?;

    let opts = StringsDiffOptions {
        min_length: args.min_length,
        limit: if args.all {
            None
        } else {
            Some(args.limit.unwrap_or(DIFF_DISPLAY_LIMIT))
        },
        raw: args.raw,
    };
    let diff = diff_strings(v1.as_bytes(), v2.as_bytes(), &opts);

    if ctx.json() {
        return to_json(&diff);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} only in {} ({} shown, {} filtered):\n",
        style("v1").bold(),
        args.file.display(),
        diff.only_in_v1.len(),
        diff.filtered_v1
    ));
    for s in &diff.only_in_v1 {
        out.push_str(&format!("  - {:?}\n", truncate_to_char_boundary(s, 100)));
    }
    if diff.truncated_v1 > 0 {
        out.push_str(&format!("  ... and {} more\n", diff.truncated_v1));
    }

    out.push_str(&format!(
        "{} only in {} ({} shown, {} filtered):\n",
        style("v2").bold(),
        file2.display(),
        diff.only_in_v2.len(),
        diff.filtered_v2
    ));
    for s in &diff.only_in_v2 {
        out.push_str(&format!("  + {:?}\n", truncate_to_char_boundary(s, 100)));
    }
    if diff.truncated_v2 > 0 {
        out.push_str(&format!("  ... and {} more\n", diff.truncated_v2));
    }
    Ok(out)
}
