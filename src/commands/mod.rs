//! Command modules for the bundlescope CLI
//!
//! Each module implements one subcommand family and returns the final
//! output as a string; printing and exit-code mapping happen in main.
//! Fast-path commands drive the character scanner directly; deep-path
//! commands parse the bundle first.

pub mod beautify;
pub mod decompile;
pub mod extract;
pub mod find;
pub mod map;
pub mod scope;
pub mod strings;
pub mod trace;

pub use beautify::{run_beautify, run_context, run_slice};
pub use decompile::run_decompile;
pub use extract::run_extract_fn;
pub use find::{run_find, run_match, run_patch_check};
pub use map::{run_diff_fns, run_map};
pub use scope::{run_calls, run_refs, run_scope};
pub use strings::run_strings;
pub use trace::run_trace_io;

use crate::cli::OutputFormat;

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub verbose: bool,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            verbose: false,
        }
    }
}

impl CommandContext {
    pub fn from_cli(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// Serialize a value for `--format json` output
pub fn to_json<T: serde::Serialize>(value: &T) -> crate::error::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| crate::error::BundleError::InvalidInput {
        message: format!("JSON serialization failed: {}", e),
    })
}
