//! bundlescope CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bundlescope::commands::{self, CommandContext};
use bundlescope::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> bundlescope::Result<String> {
    let ctx = CommandContext::from_cli(cli.format, cli.verbose);

    match &cli.command {
        Commands::Beautify(args) => commands::run_beautify(args, &ctx),
        Commands::Slice(args) => commands::run_slice(args, &ctx),
        Commands::Find(args) => commands::run_find(args, &ctx),
        Commands::Match(args) => commands::run_match(args, &ctx),
        Commands::PatchCheck(args) => commands::run_patch_check(args, &ctx),
        Commands::ExtractFn(args) => commands::run_extract_fn(args, &ctx),
        Commands::Context(args) => commands::run_context(args, &ctx),
        Commands::Strings(args) => commands::run_strings(args, &ctx),
        Commands::Scope(args) => commands::run_scope(args, &ctx),
        Commands::Refs(args) => commands::run_refs(args, &ctx),
        Commands::Calls(args) => commands::run_calls(args, &ctx),
        Commands::Map(args) => commands::run_map(args, &ctx),
        Commands::DiffFns(args) => commands::run_diff_fns(args, &ctx),
        Commands::TraceIo(args) => commands::run_trace_io(args, &ctx),
        Commands::Decompile(args) => commands::run_decompile(args, &ctx),
    }
}
