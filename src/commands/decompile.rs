//! decompile command

use console::style;

use crate::cli::DecompileArgs;
use crate::commands::{to_json, CommandContext};
use crate::decompile::decompile_function;
use crate::error::Result;
use crate::fs_utils::read_source;

pub fn run_decompile(args: &DecompileArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let result = decompile_function(&source, args.offset)?;

    if ctx.json() {
        return to_json(&result);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {} [{}..{}]\n",
        style("decompile").bold(),
        style(&result.function_name).cyan(),
        result.sig_start,
        result.body_end
    ));
    out.push_str(&format!(
        "confidence {:.0}% ({} of {} short identifiers annotated)\n\n",
        result.confidence * 100.0,
        result.annotated_count,
        result.short_identifier_count
    ));
    out.push_str(&result.text);
    out.push('\n');
    Ok(out)
}
