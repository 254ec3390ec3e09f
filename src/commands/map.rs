//! map and diff-fns commands (deep path)

use console::style;

use crate::cli::{DiffFnsArgs, MapArgs};
use crate::commands::{to_json, CommandContext};
use crate::error::{BundleError, Result};
use crate::fnmap::{
    categorize, collect_functions, diff_maps, diff_strings, DiffResult, FunctionEntry,
    StringsDiffOptions,
};
use crate::fs_utils::{derived_path, read_source, write_atomic};
use crate::parse::parse_source;
use crate::text::truncate_to_char_boundary;

/// Default display limit per diff list
const DIFF_DISPLAY_LIMIT: usize = 50;

pub fn run_map(args: &MapArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let tree = parse_source(&source)?;
    let map = collect_functions(&tree, &source, args.strings);
    tracing::debug!(functions = map.len(), "map complete");

    if args.json {
        let path = derived_path(&args.file, ".map.json");
        let payload = serde_json::to_string_pretty(&map).map_err(|e| BundleError::InvalidInput {
            message: format!("JSON serialization failed: {}", e),
        })?;
        write_atomic(&path, &payload)?;
        return Ok(format!(
            "{} {} ({} functions)\n",
            style("wrote").green(),
            path.display(),
            map.len()
        ));
    }

    if ctx.json() {
        return to_json(&map);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {} functions\n",
        style("map").bold(),
        map.len()
    ));
    out.push_str(&format!(
        "{:>10} {:>10} {:>6} {:>5} {:>4}  {}\n",
        "start", "end", "size", "param", "flag", "signature"
    ));
    for entry in &map {
        let mut flags = String::new();
        if entry.is_async {
            flags.push('a');
        }
        if entry.is_generator {
            flags.push('g');
        }
        out.push_str(&format!(
            "{:>10} {:>10} {:>6} {:>5} {:>4}  {} {}\n",
            entry.start,
            entry.end,
            entry.size(),
            entry.param_count,
            flags,
            entry.name,
            truncate_to_char_boundary(&entry.signature_prefix, 60),
        ));
    }
    Ok(out)
}

pub fn run_diff_fns(args: &DiffFnsArgs, ctx: &CommandContext) -> Result<String> {
    if args.strings_only {
        return run_strings_only_diff(args, ctx);
    }

    let v1 = read_source(&args.file1)?;
    let v2 = read_source(&args.file2)?;
    let tree1 = parse_source(&v1)?;
    let tree2 = parse_source(&v2)?;
    let map1 = collect_functions(&tree1, &v1, true);
    let map2 = collect_functions(&tree2, &v2, true);
    tracing::debug!(v1 = map1.len(), v2 = map2.len(), "maps collected");

    let mut diff = diff_maps(&map1, &map2);
    apply_display_filters(&mut diff, args)?;

    if args.json || ctx.json() {
        return to_json(&diff);
    }

    let limit = args.limit.unwrap_or(DIFF_DISPLAY_LIMIT);
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} unchanged, {} modified, {} added, {} removed\n",
        style("diff").bold(),
        diff.unchanged.len(),
        diff.modified.len(),
        diff.added.len(),
        diff.removed.len()
    ));

    if args.all {
        out.push_str(&format!("\n{}:\n", style("unchanged").bold()));
        for u in diff.unchanged.iter().take(limit) {
            out.push_str(&format!(
                "  {} shift {:+} [{} -> {}]\n",
                u.v1.name, u.shift, u.v1.start, u.v2.start
            ));
        }
        if diff.unchanged.len() > limit {
            out.push_str(&format!("  ... and {} more\n", diff.unchanged.len() - limit));
        }
    }

    out.push_str(&format!("\n{}:\n", style("modified").yellow().bold()));
    for m in diff.modified.iter().take(limit) {
        out.push_str(&format!(
            "  {} -> {} (similarity {:.2}, size {:+})\n",
            m.v1.name, m.v2.name, m.similarity, m.size_diff
        ));
        for s in &m.added_strings {
            out.push_str(&format!("    + {:?}\n", truncate_to_char_boundary(s, 80)));
        }
        for s in &m.removed_strings {
            out.push_str(&format!("    - {:?}\n", truncate_to_char_boundary(s, 80)));
        }
        if args.body {
            out.push_str(&format!(
                "    v1: {}\n    v2: {}\n",
                truncate_to_char_boundary(&m.v1.signature_prefix, 100),
                truncate_to_char_boundary(&m.v2.signature_prefix, 100)
            ));
        }
    }

    out.push_str(&format!("\n{}:\n", style("added").green().bold()));
    for f in diff.added.iter().take(limit) {
        out.push_str(&format!("  {} [{}..{}]\n", f.name, f.start, f.end));
    }
    out.push_str(&format!("\n{}:\n", style("removed").red().bold()));
    for f in diff.removed.iter().take(limit) {
        out.push_str(&format!("  {} [{}..{}]\n", f.name, f.start, f.end));
    }

    if args.summary {
        let summary = categorize(&diff);
        out.push_str(&format!("\n{}:\n", style("summary").bold()));
        for (category, functions) in &summary.buckets {
            out.push_str(&format!(
                "  {}: {} ({})\n",
                category.label(),
                functions.len(),
                truncate_to_char_boundary(&functions.join(", "), 120)
            ));
        }
    }
    Ok(out)
}

/// Display-level filters; the underlying diff sets are computed over
/// the full maps so matching quality never depends on filters.
fn apply_display_filters(diff: &mut DiffResult, args: &DiffFnsArgs) -> Result<()> {
    if let Some(name) = &args.name {
        let keep = |f: &FunctionEntry| f.name.contains(name.as_str());
        diff.unchanged.retain(|u| keep(&u.v1) || keep(&u.v2));
        diff.modified.retain(|m| keep(&m.v1) || keep(&m.v2));
        diff.added.retain(keep);
        diff.removed.retain(keep);
    }
    if let Some(pattern) = &args.filter {
        let re = regex::Regex::new(pattern).map_err(|e| BundleError::PatternInvalid {
            message: e.to_string(),
        })?;
        let matches_entry = |f: &FunctionEntry| {
            f.strings_used
                .as_ref()
                .map(|s| s.iter().any(|x| re.is_match(x)))
                .unwrap_or(false)
        };
        diff.modified.retain(|m| {
            m.added_strings.iter().any(|s| re.is_match(s))
                || m.removed_strings.iter().any(|s| re.is_match(s))
        });
        diff.added.retain(&matches_entry);
        diff.removed.retain(&matches_entry);
        diff.unchanged.retain(|u| matches_entry(&u.v1));
    }
    Ok(())
}

fn run_strings_only_diff(args: &DiffFnsArgs, ctx: &CommandContext) -> Result<String> {
    let v1 = read_source(&args.file1)?;
    let v2 = read_source(&args.file2)?;
    let opts = StringsDiffOptions {
        limit: if args.all { None } else { args.limit },
        raw: args.raw,
        ..Default::default()
    };
    let diff = diff_strings(v1.as_bytes(), v2.as_bytes(), &opts);

    if args.json || ctx.json() {
        return to_json(&diff);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} strings only in v1 ({}), only in v2 ({})\n",
        style("strings diff").bold(),
        diff.only_in_v1.len(),
        diff.only_in_v2.len()
    ));
    for s in &diff.only_in_v1 {
        out.push_str(&format!("  - {:?}\n", truncate_to_char_boundary(s, 100)));
    }
    for s in &diff.only_in_v2 {
        out.push_str(&format!("  + {:?}\n", truncate_to_char_boundary(s, 100)));
    }
    Ok(out)
}
