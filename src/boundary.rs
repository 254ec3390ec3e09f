//! Function-boundary scanner
//!
//! Finds enclosing functions, signatures and parameter lists at a byte
//! offset without a full parse. A single forward pass drives the
//! character scanner, maintains a stack of pending function openings and
//! records every completed function body; the enclosing function at an
//! offset is the recorded span with the smallest extent containing it.
//!
//! Recognized forms: regular and async function declarations and
//! expressions, generators, arrow functions (with or without a
//! parenthesized parameter list), and async method shorthand. Offsets
//! inside a brace-less single-statement arrow body resolve to the
//! surrounding braced function.

use serde::Serialize;

use crate::error::{BundleError, Result};
use crate::scan::{ScanMode, Scanner};

/// Locality window: the scan runs to `target + SCAN_HORIZON` at most
pub const SCAN_HORIZON: usize = 500_000;

/// How far behind an arrow's parameter list an `async` keyword may sit
const ASYNC_LOOKBEHIND: usize = 10;

/// Cap on the backward scan for an arrow's parameter list
const ARROW_BACKSCAN_LIMIT: usize = 10_000;

/// A resolved function span with signature and parameters
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpan {
    /// Byte offset where the signature starts
    pub sig_start: usize,
    /// Byte offset of the body's opening brace
    pub body_open_brace: usize,
    /// One past the body's closing brace
    pub body_end: usize,
    /// Signature text, `sig_start` up to the opening brace
    pub signature_text: String,
    /// Parameters split on top-level commas
    pub parameter_list: Vec<String>,
    pub param_count: usize,
}

impl FunctionSpan {
    /// Extent of the whole function form in bytes
    pub fn len(&self) -> usize {
        self.body_end - self.sig_start
    }

    pub fn is_empty(&self) -> bool {
        self.body_end == self.sig_start
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.sig_start <= offset && offset < self.body_end
    }
}

/// Raw span recorded by the scan pass, before parameter derivation
#[derive(Debug, Clone, Copy)]
pub struct RawSpan {
    pub sig_start: usize,
    pub body_open: usize,
    /// Offset of the closing brace (inclusive)
    pub body_close: usize,
}

impl RawSpan {
    pub fn contains(&self, offset: usize) -> bool {
        self.sig_start <= offset && offset <= self.body_close
    }

    pub fn extent(&self) -> usize {
        self.body_close - self.sig_start
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    sig_start: usize,
    paren_depth: u32,
    ready: bool,
    /// Arrow pendings are dropped when the body turns out brace-less
    await_brace: bool,
}

struct StackEntry {
    brace_offset: usize,
    sig_start: Option<usize>,
}

impl StackEntry {
    fn origin(&self) -> usize {
        self.sig_start.unwrap_or(self.brace_offset)
    }
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Check for `word` at `pos` with identifier boundaries on both sides
fn word_at(buf: &[u8], pos: usize, word: &[u8]) -> bool {
    if pos + word.len() > buf.len() || &buf[pos..pos + word.len()] != word {
        return false;
    }
    if pos > 0 && is_ident_byte(buf[pos - 1]) {
        return false;
    }
    match buf.get(pos + word.len()) {
        Some(&b) => !is_ident_byte(b),
        None => true,
    }
}

/// If the non-whitespace text ending just before `pos` is the `async`
/// keyword, return its start offset.
fn async_prefix_start(buf: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos;
    while i > 0 && buf[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i >= 5 && word_at(buf, i - 5, b"async") && pos - (i - 5) <= ASYNC_LOOKBEHIND {
        Some(i - 5)
    } else {
        None
    }
}

/// Does `async` at `pos` start a method-shorthand signature
/// (`async name(...)`)
fn async_method_ahead(buf: &[u8], pos: usize) -> bool {
    let mut i = pos + 5;
    let ws_start = i;
    while i < buf.len() && buf[i].is_ascii_whitespace() {
        i += 1;
    }
    if i == ws_start || i >= buf.len() || !is_ident_byte(buf[i]) || buf[i].is_ascii_digit() {
        return false;
    }
    while i < buf.len() && is_ident_byte(buf[i]) {
        i += 1;
    }
    i < buf.len() && buf[i] == b'('
}

/// Backward paren match for an arrow parameter list ending at `close`
fn match_paren_backwards(buf: &[u8], close: usize) -> Option<usize> {
    let floor = close.saturating_sub(ARROW_BACKSCAN_LIMIT);
    let mut depth = 0i32;
    let mut i = close;
    loop {
        match buf[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        if i == floor {
            return None;
        }
        i -= 1;
    }
}

/// Locate the signature start of an arrow whose `=>` sits at `arrow_pos`
fn arrow_sig_start(buf: &[u8], arrow_pos: usize) -> Option<usize> {
    let mut j = arrow_pos;
    while j > 0 && buf[j - 1].is_ascii_whitespace() {
        j -= 1;
    }
    if j == 0 {
        return None;
    }
    let sig = match buf[j - 1] {
        b')' => match_paren_backwards(buf, j - 1)?,
        b if is_ident_byte(b) => {
            let mut i = j - 1;
            while i > 0 && is_ident_byte(buf[i - 1]) {
                i -= 1;
            }
            i
        }
        _ => return None,
    };
    Some(async_prefix_start(buf, sig).unwrap_or(sig))
}

/// Scan pass output
struct ScanOutcome {
    spans: Vec<RawSpan>,
    horizon_exceeded: bool,
}

/// Single forward pass collecting completed function spans.
///
/// With a `target`, the scan is bounded by `target + SCAN_HORIZON` and
/// stops early once no open construct can still contain the target.
fn scan_spans(buf: &[u8], target: Option<usize>) -> ScanOutcome {
    let limit = match target {
        Some(t) => buf.len().min(t.saturating_add(SCAN_HORIZON)),
        None => buf.len(),
    };

    let mut scanner = Scanner::new(buf);
    let mut pending: Option<Pending> = None;
    let mut stack: Vec<StackEntry> = Vec::new();
    let mut spans: Vec<RawSpan> = Vec::new();
    let mut skip_next = false;

    while let Some((pos, ch, mode)) = scanner.step() {
        if pos >= limit {
            break;
        }
        if mode != ScanMode::Normal {
            continue;
        }
        if skip_next {
            skip_next = false;
            continue;
        }

        // An arrow whose next code character is not `{` has an
        // expression body; it cannot be tracked by brace matching.
        if let Some(p) = pending {
            if p.await_brace && !ch.is_ascii_whitespace() && ch != b'{' {
                pending = None;
            }
        }

        match ch {
            b'f' if word_at(buf, pos, b"function") => {
                if pending.map_or(true, |p| p.ready) {
                    let sig_start = async_prefix_start(buf, pos).unwrap_or(pos);
                    pending = Some(Pending {
                        sig_start,
                        paren_depth: 0,
                        ready: false,
                        await_brace: false,
                    });
                }
            }
            b'a' if word_at(buf, pos, b"async") && async_method_ahead(buf, pos) => {
                if pending.is_none() {
                    pending = Some(Pending {
                        sig_start: pos,
                        paren_depth: 0,
                        ready: false,
                        await_brace: false,
                    });
                }
            }
            b'=' if buf.get(pos + 1) == Some(&b'>') => {
                if pending.is_none() {
                    if let Some(sig_start) = arrow_sig_start(buf, pos) {
                        pending = Some(Pending {
                            sig_start,
                            paren_depth: 0,
                            ready: true,
                            await_brace: true,
                        });
                    }
                }
                skip_next = true;
            }
            b'(' => {
                if let Some(p) = pending.as_mut() {
                    if !p.ready {
                        p.paren_depth += 1;
                    }
                }
            }
            b')' => {
                if let Some(p) = pending.as_mut() {
                    if !p.ready && p.paren_depth > 0 {
                        p.paren_depth -= 1;
                        if p.paren_depth == 0 {
                            p.ready = true;
                        }
                    }
                }
            }
            b'{' => {
                let sig = match pending {
                    Some(p) if p.ready => {
                        pending = None;
                        Some(p.sig_start)
                    }
                    _ => None,
                };
                stack.push(StackEntry {
                    brace_offset: pos,
                    sig_start: sig,
                });
            }
            b'}' => {
                if let Some(entry) = stack.pop() {
                    if let Some(sig_start) = entry.sig_start {
                        spans.push(RawSpan {
                            sig_start,
                            body_open: entry.brace_offset,
                            body_close: pos,
                        });
                    }
                }
                if let Some(t) = target {
                    let open_covers = stack.iter().any(|e| e.origin() <= t)
                        || pending.map_or(false, |p| p.sig_start <= t);
                    if pos > t && !open_covers {
                        return ScanOutcome {
                            spans,
                            horizon_exceeded: false,
                        };
                    }
                }
            }
            _ => {}
        }
    }

    let horizon_exceeded = match target {
        Some(t) if limit < buf.len() => stack
            .iter()
            .any(|e| e.sig_start.is_some() && e.origin() <= t),
        _ => false,
    };

    ScanOutcome {
        spans,
        horizon_exceeded,
    }
}

/// Split a parameter-list body on top-level commas, preserving balanced
/// `{ } [ ] ( )` and string contents.
pub fn split_params(buf: &[u8]) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut scanner = Scanner::new(buf);
    while let Some((pos, ch, mode)) = scanner.step() {
        if mode != ScanMode::Normal {
            continue;
        }
        match ch {
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth -= 1,
            b',' if depth == 0 => {
                push_param(&mut params, &buf[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    push_param(&mut params, &buf[start..]);
    params
}

fn push_param(params: &mut Vec<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw).trim().to_string();
    if !text.is_empty() {
        params.push(text);
    }
}

/// Derive the full [`FunctionSpan`] from a raw span: signature text and
/// the parameter list with destructuring kept intact.
fn derive_span(buf: &[u8], raw: &RawSpan) -> FunctionSpan {
    let signature = &buf[raw.sig_start..raw.body_open];
    let signature_text = String::from_utf8_lossy(signature).trim_end().to_string();

    // parameter parens within the signature; destructured `{...}` inside
    // must not be confused with the body brace, which is why the search
    // runs over the signature slice only
    let mut parameter_list = Vec::new();
    let mut scanner = Scanner::new(signature);
    let mut open: Option<usize> = None;
    let mut depth = 0i32;
    while let Some((pos, ch, mode)) = scanner.step() {
        if mode != ScanMode::Normal {
            continue;
        }
        match ch {
            b'(' => {
                if open.is_none() {
                    open = Some(pos);
                }
                depth += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(o) = open {
                        parameter_list = split_params(&signature[o + 1..pos]);
                    }
                    break;
                }
            }
            _ => {}
        }
    }

    if open.is_none() {
        // single-identifier arrow: `x=>{...}`
        let arrow = signature_text.find("=>").unwrap_or(signature_text.len());
        let ident = signature_text[..arrow].trim();
        let ident = ident.strip_prefix("async").unwrap_or(ident).trim();
        if !ident.is_empty() {
            parameter_list.push(ident.to_string());
        }
    }

    FunctionSpan {
        sig_start: raw.sig_start,
        body_open_brace: raw.body_open,
        body_end: raw.body_close + 1,
        param_count: parameter_list.len(),
        parameter_list,
        signature_text,
    }
}

/// Every function whose body the scan could complete, ordered by start
pub fn function_spans(buf: &[u8]) -> Vec<FunctionSpan> {
    let mut outcome = scan_spans(buf, None);
    outcome.spans.sort_by_key(|s| s.sig_start);
    outcome.spans.iter().map(|r| derive_span(buf, r)).collect()
}

/// Nesting stack of functions containing `offset`, tightest first
/// (depth 0 = the enclosing function).
pub fn nesting_stack_at(buf: &[u8], offset: usize) -> Result<Vec<FunctionSpan>> {
    if offset >= buf.len() {
        return Err(BundleError::InvalidInput {
            message: format!("offset {} is past the end of the buffer ({})", offset, buf.len()),
        });
    }
    let outcome = scan_spans(buf, Some(offset));
    let mut candidates: Vec<&RawSpan> = outcome
        .spans
        .iter()
        .filter(|s| s.contains(offset))
        .collect();

    if candidates.is_empty() {
        if outcome.horizon_exceeded {
            return Err(BundleError::BoundaryScanExceeded {
                offset,
                limit: SCAN_HORIZON,
            });
        }
        return Err(BundleError::OffsetOutsideFunction { offset });
    }

    candidates.sort_by_key(|s| s.extent());
    Ok(candidates.iter().map(|r| derive_span(buf, r)).collect())
}

/// The smallest function form containing `offset`
pub fn enclosing_at(buf: &[u8], offset: usize) -> Result<FunctionSpan> {
    let mut stack = nesting_stack_at(buf, offset)?;
    Ok(stack.remove(0))
}

/// Infer the declared or assigned name of a function from its signature
/// and the bytes just before it. Returns `None` for anonymous forms.
pub fn infer_name(buf: &[u8], span: &FunctionSpan) -> Option<String> {
    // `function name(...)` or `async function name(...)`
    let sig = span.signature_text.as_str();
    if let Some(kw) = sig.find("function") {
        let after = sig[kw + 8..].trim_start().trim_start_matches('*').trim_start();
        let end = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(after.len());
        if end > 0 {
            return Some(after[..end].to_string());
        }
        return backward_assigned_name(buf, span.sig_start);
    }

    // `async name(...)` method shorthand
    if let Some(rest) = sig.strip_prefix("async") {
        let rest = rest.trim_start();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        if end > 0 && !rest.starts_with('(') {
            return Some(rest[..end].to_string());
        }
    }

    // arrows: the name sits before the signature as `name = (...)` or
    // `name: (...)`
    backward_assigned_name(buf, span.sig_start)
}

fn backward_assigned_name(buf: &[u8], sig_start: usize) -> Option<String> {
    let mut i = sig_start;
    while i > 0 && buf[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == 0 {
        return None;
    }
    match buf[i - 1] {
        b'=' => {
            // reject `==`, `=>`, `<=` and friends
            if i >= 2 && matches!(buf[i - 2], b'=' | b'!' | b'<' | b'>') {
                return None;
            }
            i -= 1;
        }
        b':' => i -= 1,
        _ => return None,
    }
    while i > 0 && buf[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    let end = i;
    while i > 0 && is_ident_byte(buf[i - 1]) {
        i -= 1;
    }
    if i == end {
        return None;
    }
    Some(String::from_utf8_lossy(&buf[i..end]).into_owned())
}

/// Precomputed span index for commands that resolve many offsets
/// against the same buffer.
pub struct FunctionIndex {
    spans: Vec<RawSpan>,
}

impl FunctionIndex {
    /// Full scan over the buffer, one pass
    pub fn build(buf: &[u8]) -> Self {
        let mut outcome = scan_spans(buf, None);
        outcome.spans.sort_by_key(|s| s.sig_start);
        Self {
            spans: outcome.spans,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Smallest recorded span containing `offset`
    pub fn enclosing(&self, offset: usize) -> Option<&RawSpan> {
        self.spans
            .iter()
            .filter(|s| s.contains(offset))
            .min_by_key(|s| s.extent())
    }

    /// Enclosing span resolved to a full [`FunctionSpan`]
    pub fn enclosing_span(&self, buf: &[u8], offset: usize) -> Option<FunctionSpan> {
        self.enclosing(offset).map(|r| derive_span(buf, r))
    }

    /// Name of the enclosing function, `None` at module scope
    pub fn enclosing_name(&self, buf: &[u8], offset: usize) -> Option<String> {
        let span = self.enclosing_span(buf, offset)?;
        Some(infer_name(buf, &span).unwrap_or_else(|| "<anonymous>".to_string()))
    }
}
