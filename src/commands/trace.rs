//! trace-io command

use console::style;

use crate::cli::TraceIoArgs;
use crate::commands::{to_json, CommandContext};
use crate::error::Result;
use crate::fs_utils::read_source;
use crate::text::truncate_to_char_boundary;
use crate::trace_io::trace_channel;

pub fn run_trace_io(args: &TraceIoArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let report = trace_channel(&source, &args.channel);

    if ctx.json() {
        return to_json(&report);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        style("channel").bold(),
        report.channel
    ));

    out.push_str(&format!("writers ({}):\n", report.writers.len()));
    for w in &report.writers {
        let func = w.function.as_deref().unwrap_or("(module scope)");
        out.push_str(&format!(
            "  {:>10}  {:<32} in {}\n      {}\n",
            w.offset,
            w.transport.label(),
            func,
            truncate_to_char_boundary(&w.context, 100)
        ));
    }

    out.push_str(&format!("readers ({}):\n", report.readers.len()));
    for r in &report.readers {
        let func = r.function.as_deref().unwrap_or("(module scope)");
        out.push_str(&format!(
            "  {:>10}  {:<32} {} in {}\n",
            r.offset,
            r.kind.label(),
            r.pattern,
            func
        ));
    }

    for warning in &report.warnings {
        out.push_str(&format!("{} {}\n", style("warning").yellow().bold(), warning));
    }
    Ok(out)
}
