//! find, match and patch-check commands

use console::style;

use crate::cli::{FindArgs, MatchArgs, PatchCheckArgs};
use crate::commands::{to_json, CommandContext};
use crate::error::{BundleError, Result};
use crate::fs_utils::read_source;
use crate::patch::{patch_check, PatchResult, PatchStatus, PatchWarning};
use crate::search::{search, SearchOptions};
use crate::text::truncate_to_char_boundary;

pub fn run_find(args: &FindArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;

    let mut opts = SearchOptions::new(&args.pattern)
        .with_regex(args.regex)
        .with_captures(args.captures);
    if let Some(near) = args.near {
        opts = opts.with_near(near);
    }
    if let Some(limit) = args.limit {
        opts = opts.with_limit(limit);
    }

    let report = search(&source, &opts)?;
    tracing::debug!(total = report.total, "search complete");

    if ctx.json() {
        return to_json(&report);
    }

    if report.total == 0 {
        return Ok(format!("no matches for {:?}\n", args.pattern));
    }

    let mut out = String::new();
    if args.count {
        out.push_str(&format!(
            "{} {} matches in {} functions\n",
            style("count").bold(),
            report.total,
            report.groups.len()
        ));
        for group in &report.groups {
            out.push_str(&format!("{:>6}  {}\n", group.hits.len(), group.function));
        }
        return Ok(out);
    }

    for group in &report.groups {
        let loc = group
            .function_start
            .map(|s| format!(" @{}", s))
            .unwrap_or_default();
        out.push_str(&format!(
            "{}{}\n",
            style(&group.function).cyan().bold(),
            loc
        ));
        for hit in &group.hits {
            if args.compact {
                out.push_str(&format!(
                    "  {:>10}  {}\n",
                    hit.offset,
                    truncate_to_char_boundary(&hit.context, 100)
                ));
            } else {
                out.push_str(&format!("  offset {}\n    {}\n", hit.offset, hit.context));
                if !hit.captures.is_empty() {
                    for (i, cap) in hit.captures.iter().enumerate() {
                        out.push_str(&format!("    ${} = {:?}\n", i + 1, cap));
                    }
                }
                for (name, value) in &hit.named_captures {
                    out.push_str(&format!("    ${{{}}} = {:?}\n", name, value));
                }
            }
        }
    }

    if report.truncated > 0 {
        out.push_str(&format!("... and {} more\n", report.truncated));
    }
    Ok(out)
}

pub fn run_match(args: &MatchArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let result = patch_check(&source, &args.pattern, true, args.replace.as_deref())?;
    finish_uniqueness_command(&args.pattern, result, ctx)
}

pub fn run_patch_check(args: &PatchCheckArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let result = patch_check(
        &source,
        &args.pattern,
        args.regex,
        args.replacement.as_deref(),
    )?;
    finish_uniqueness_command(&args.pattern, result, ctx)
}

/// Render a patch result; non-unique statuses print the report and then
/// surface the documented error so main maps the exit code.
fn finish_uniqueness_command(
    pattern: &str,
    result: PatchResult,
    ctx: &CommandContext,
) -> Result<String> {
    let rendered = if ctx.json() {
        to_json(&result)?
    } else {
        render_patch_result(&result)
    };

    match result.status {
        PatchStatus::Unique => Ok(rendered),
        PatchStatus::NotFound => {
            print!("{}", rendered);
            Err(BundleError::PatternNotFound {
                pattern: pattern.to_string(),
            })
        }
        PatchStatus::Ambiguous => {
            print!("{}", rendered);
            Err(BundleError::PatternAmbiguous {
                pattern: pattern.to_string(),
                count: result.matches.len(),
            })
        }
    }
}

fn render_patch_result(result: &PatchResult) -> String {
    let mut out = String::new();
    let status = match result.status {
        PatchStatus::Unique => style("UNIQUE").green().bold(),
        PatchStatus::NotFound => style("NOT FOUND").red().bold(),
        PatchStatus::Ambiguous => style("AMBIGUOUS").yellow().bold(),
    };
    out.push_str(&format!("{} ({} matches)\n", status, result.matches.len()));

    for warning in &result.warnings {
        let text = match warning {
            PatchWarning::ShortIdentifier { identifier } => format!(
                "short-identifier: {:?} is a weak anchor (3 chars or fewer)",
                identifier
            ),
            PatchWarning::NonCodeContext { context } => {
                format!("non-code-context: match is not in code: {}", context)
            }
        };
        out.push_str(&format!("{} {}\n", style("warning").yellow(), text));
    }

    for m in result.matches.iter().take(10) {
        out.push_str(&format!("  offset {}\n    {}\n", m.offset, m.context));
        for (i, cap) in m.captures.iter().enumerate() {
            out.push_str(&format!("    ${} = {:?}\n", i + 1, cap));
        }
        for (name, value) in &m.named_captures {
            out.push_str(&format!("    ${{{}}} = {:?}\n", name, value));
        }
    }
    if result.matches.len() > 10 {
        out.push_str(&format!("  ... and {} more\n", result.matches.len() - 10));
    }

    if let Some(preview) = &result.preview {
        out.push_str(&format!(
            "{}\n  {}{}{}\n",
            style("preview").bold(),
            preview.before_window,
            style(&preview.replacement).green().underlined(),
            preview.after_window
        ));
    }
    out
}
