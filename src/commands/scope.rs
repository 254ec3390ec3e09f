//! scope, refs and calls commands (deep path)

use console::style;
use serde::Serialize;

use crate::cli::{CallsArgs, RefsArgs, ScopeArgs};
use crate::commands::{to_json, CommandContext};
use crate::error::Result;
use crate::fs_utils::read_source;
use crate::parse::parse_source;
use crate::refs::{external_refs, incoming_calls, outgoing_calls};
use crate::scope::{Scope, ScopeTree};

pub fn run_scope(args: &ScopeArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let tree = parse_source(&source)?;
    let scopes = ScopeTree::build(&tree, &source);

    let at = scopes.find_scope_at(args.offset);
    let chain = scopes.chain(at);

    if ctx.json() {
        #[derive(Serialize)]
        struct ScopeChain<'a> {
            offset: usize,
            chain: Vec<&'a Scope>,
        }
        return to_json(&ScopeChain {
            offset: args.offset,
            chain: chain.iter().map(|&i| scopes.scope(i)).collect(),
        });
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} chain at offset {} ({} scopes)\n",
        style("scope").bold(),
        args.offset,
        chain.len()
    ));
    for (depth, &idx) in chain.iter().enumerate() {
        let scope = scopes.scope(idx);
        out.push_str(&format!(
            "{}[{}] {} [{}..{}] {} bindings\n",
            "  ".repeat(depth),
            depth,
            style(scope.kind.label()).cyan(),
            scope.start,
            scope.end,
            scope.bindings.len()
        ));
        if args.all || depth == 0 {
            for b in &scope.bindings {
                out.push_str(&format!(
                    "{}    {} {} @{}\n",
                    "  ".repeat(depth),
                    b.kind.label(),
                    b.name,
                    b.offset
                ));
            }
        }
    }
    Ok(out)
}

pub fn run_refs(args: &RefsArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let tree = parse_source(&source)?;
    let scopes = ScopeTree::build(&tree, &source);

    let report = external_refs(&source, &tree, &scopes, args.offset)?;

    if ctx.json() {
        return to_json(&report);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} of {} [{}..{}]\n",
        style("external refs").bold(),
        style(&report.function).cyan(),
        report.function_start,
        report.function_end
    ));
    if report.groups.is_empty() {
        out.push_str("  none: the function is self-contained\n");
        return Ok(out);
    }
    for group in &report.groups {
        let origin = match group.depth {
            Some(d) => format!("{} (depth {})", group.scope_label, d),
            None => "global".to_string(),
        };
        out.push_str(&format!("{}:\n", style(origin).yellow()));
        for r in &group.refs {
            let kind = r
                .declaration_kind
                .map(|k| k.label())
                .unwrap_or("undeclared");
            out.push_str(&format!(
                "  {} ({}, {} uses) at {:?}\n",
                r.name, kind, r.count, r.offsets
            ));
        }
    }
    Ok(out)
}

pub fn run_calls(args: &CallsArgs, ctx: &CommandContext) -> Result<String> {
    let source = read_source(&args.file)?;
    let tree = parse_source(&source)?;
    let scopes = ScopeTree::build(&tree, &source);

    let outgoing = outgoing_calls(&source, &tree, &scopes, args.offset)?;
    let incoming = incoming_calls(&source, &tree, &scopes, args.offset)?;

    if ctx.json() {
        #[derive(Serialize)]
        struct Calls<'a> {
            outgoing: &'a [crate::refs::OutgoingCall],
            incoming: &'a crate::refs::IncomingReport,
        }
        return to_json(&Calls {
            outgoing: &outgoing,
            incoming: &incoming,
        });
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} for {}\n",
        style("calls").bold(),
        style(&incoming.name).cyan()
    ));

    out.push_str(&format!("outgoing ({}):\n", outgoing.len()));
    for call in &outgoing {
        out.push_str(&format!("  {:>4}x {}\n", call.count, call.name));
    }

    let flag = if incoming.ambiguous {
        " (name too short; expect false positives)"
    } else {
        ""
    };
    out.push_str(&format!("incoming ({}){}:\n", incoming.calls.len(), flag));
    for call in &incoming.calls {
        out.push_str(&format!(
            "  at {} in {}\n    {}\n",
            call.call_offset, call.caller_signature, call.context
        ));
    }
    Ok(out)
}
