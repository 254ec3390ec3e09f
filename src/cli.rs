//! CLI argument definitions using clap with subcommand architecture
//!
//! Fast-path commands (beautify, slice, find, strings, extract-fn,
//! patch-check, trace-io) run on the character scanner alone; deep-path
//! commands (scope, refs, calls, map, diff-fns, decompile) parse the
//! bundle first.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Reverse-engineering toolkit for large minified JavaScript bundles
#[derive(Parser, Debug)]
#[command(name = "bundlescope")]
#[command(about = "Locate, extract and diff code inside minified JS bundles")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reformat a one-line bundle into indented lines with an offset map
    Beautify(BeautifyArgs),

    /// Print a byte range of the bundle
    Slice(SliceArgs),

    /// Search for a pattern, grouped by enclosing function
    #[command(visible_alias = "f")]
    Find(FindArgs),

    /// Regex match with captures and a uniqueness check
    Match(MatchArgs),

    /// Validate that a patch pattern is uniquely anchored in code context
    #[command(name = "patch-check")]
    PatchCheck(PatchCheckArgs),

    /// Extract the function enclosing an offset
    #[command(name = "extract-fn", visible_alias = "x")]
    ExtractFn(ExtractFnArgs),

    /// One-shot orientation: enclosing function, nearby strings, window
    Context(ContextArgs),

    /// List string landmarks, or diff the string sets of two bundles
    Strings(StringsArgs),

    /// Show the scope chain at an offset
    Scope(ScopeArgs),

    /// External references of the function at an offset
    Refs(RefsArgs),

    /// Outgoing and incoming calls of the function at an offset
    Calls(CallsArgs),

    /// Enumerate all functions with fingerprint metadata
    Map(MapArgs),

    /// Match functions across two bundle versions
    #[command(name = "diff-fns")]
    DiffFns(DiffFnsArgs),

    /// Classify writers and readers of an I/O channel
    #[command(name = "trace-io")]
    TraceIo(TraceIoArgs),

    /// Annotate a function with readable-name proposals
    Decompile(DecompileArgs),
}

/// Arguments for the beautify command
#[derive(Args, Debug)]
pub struct BeautifyArgs {
    /// Path to the bundle
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output path (default: FILE.beautified.js next to the input)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the slice command
#[derive(Args, Debug)]
pub struct SliceArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Byte offset to slice at
    #[arg(value_name = "OFFSET")]
    pub offset: usize,

    /// Slice length in bytes
    #[arg(value_name = "LENGTH", default_value = "500")]
    pub length: usize,

    /// Extra bytes before the offset
    #[arg(long, value_name = "N", default_value = "0")]
    pub before: usize,

    /// Extra bytes after the slice
    #[arg(long, value_name = "N", default_value = "0")]
    pub after: usize,

    /// Beautify the slice before printing
    #[arg(long)]
    pub beautify: bool,
}

/// Arguments for the find command
#[derive(Args, Debug)]
pub struct FindArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Literal pattern, or regex with --regex (%V% and %S% expand)
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Treat the pattern as a regex
    #[arg(long)]
    pub regex: bool,

    /// Report capture groups (numbered and named)
    #[arg(long, requires = "regex")]
    pub captures: bool,

    /// Compact single-line rendering
    #[arg(long)]
    pub compact: bool,

    /// Keep only matches near this byte offset
    #[arg(long, value_name = "OFFSET")]
    pub near: Option<usize>,

    /// Print match counts per function only
    #[arg(long)]
    pub count: bool,

    /// Maximum matches to show
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Arguments for the match command
#[derive(Args, Debug)]
pub struct MatchArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Regex pattern (%V% and %S% expand)
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Replacement to preview on a unique match
    #[arg(long, value_name = "STR")]
    pub replace: Option<String>,
}

/// Arguments for the patch-check command
#[derive(Args, Debug)]
pub struct PatchCheckArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Treat the pattern as a regex
    #[arg(long)]
    pub regex: bool,

    /// Replacement to preview on a unique match
    #[arg(long, value_name = "STR")]
    pub replacement: Option<String>,
}

/// Arguments for the extract-fn command
#[derive(Args, Debug)]
pub struct ExtractFnArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Byte offset inside the function
    #[arg(value_name = "OFFSET")]
    pub offset: usize,

    /// Print the whole nesting stack instead of one function
    #[arg(long)]
    pub stack: bool,

    /// Pick nesting-stack entry N (0 = tightest)
    #[arg(long, value_name = "N")]
    pub depth: Option<usize>,

    /// Fail instead of falling back to the tree-based resolver
    #[arg(long = "no-ast-fallback")]
    pub no_ast_fallback: bool,
}

/// Arguments for the context command
#[derive(Args, Debug)]
pub struct ContextArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "OFFSET")]
    pub offset: usize,
}

/// Arguments for the strings command
#[derive(Args, Debug)]
pub struct StringsArgs {
    /// Bundle to scan; with --diff, the first of two versions
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Second bundle: diff the two string sets instead of listing
    #[arg(long, value_name = "FILE2")]
    pub diff: Option<PathBuf>,

    /// Keep only strings near this byte offset
    #[arg(long, value_name = "OFFSET")]
    pub near: Option<usize>,

    /// Keep only strings containing this substring
    #[arg(long, value_name = "S")]
    pub filter: Option<String>,

    /// Minimum string length in diff mode
    #[arg(long, value_name = "N", default_value = "20")]
    pub min_length: usize,

    /// Maximum strings to show per side
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Disable the code-likeness filter in diff mode
    #[arg(long)]
    pub raw: bool,

    /// Show all results, ignoring the display limit
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the scope command
#[derive(Args, Debug)]
pub struct ScopeArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "OFFSET")]
    pub offset: usize,

    /// Print every scope on the chain with all bindings
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the refs command
#[derive(Args, Debug)]
pub struct RefsArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "OFFSET")]
    pub offset: usize,
}

/// Arguments for the calls command
#[derive(Args, Debug)]
pub struct CallsArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "OFFSET")]
    pub offset: usize,
}

/// Arguments for the map command
#[derive(Args, Debug)]
pub struct MapArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Write FILE.map.json instead of printing a table
    #[arg(long)]
    pub json: bool,

    /// Collect each function's string-literal set
    #[arg(long)]
    pub strings: bool,
}

/// Arguments for the diff-fns command
#[derive(Args, Debug)]
pub struct DiffFnsArgs {
    #[arg(value_name = "FILE1")]
    pub file1: PathBuf,

    #[arg(value_name = "FILE2")]
    pub file2: PathBuf,

    /// Emit the four-list diff as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum entries to show per list
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Show all entries, including unchanged
    #[arg(long)]
    pub all: bool,

    /// Keep only functions whose name contains this string
    #[arg(long, value_name = "X")]
    pub name: Option<String>,

    /// Show body previews for modified functions
    #[arg(long)]
    pub body: bool,

    /// Keep only entries whose strings match this regex
    #[arg(long, value_name = "PAT")]
    pub filter: Option<String>,

    /// Append the advisory category summary
    #[arg(long)]
    pub summary: bool,

    /// Diff the raw string sets only, skipping the parse
    #[arg(long)]
    pub strings_only: bool,

    /// Disable the code-likeness filter (with --strings-only)
    #[arg(long)]
    pub raw: bool,
}

/// Arguments for the trace-io command
#[derive(Args, Debug)]
pub struct TraceIoArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Channel pattern, e.g. `process.stdout.write`
    #[arg(value_name = "CHANNEL_PATTERN")]
    pub channel: String,
}

/// Arguments for the decompile command
#[derive(Args, Debug)]
pub struct DecompileArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(value_name = "OFFSET")]
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_find_flags() {
        let cli = Cli::try_parse_from([
            "bundlescope",
            "find",
            "bundle.js",
            "pattern",
            "--regex",
            "--captures",
            "--limit",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Find(args) => {
                assert!(args.regex && args.captures);
                assert_eq!(args.limit, Some(5));
            }
            _ => panic!("expected find"),
        }
    }

    #[test]
    fn test_parse_diff_fns() {
        let cli = Cli::try_parse_from([
            "bundlescope",
            "diff-fns",
            "v1.js",
            "v2.js",
            "--summary",
            "--strings-only",
        ])
        .unwrap();
        match cli.command {
            Commands::DiffFns(args) => {
                assert!(args.summary && args.strings_only);
            }
            _ => panic!("expected diff-fns"),
        }
    }

    #[test]
    fn test_captures_requires_regex() {
        let err = Cli::try_parse_from(["bundlescope", "find", "b.js", "p", "--captures"]);
        assert!(err.is_err());
    }
}
