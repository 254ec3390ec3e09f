//! Patch validator: uniqueness check and replacement preview
//!
//! Textual patching of a minified bundle is only safe when the anchor
//! pattern matches exactly once and the match sits in true code context
//! (not inside a string, comment or regex literal). This module checks
//! both, warns about weak anchors, and renders a replacement preview.
//! It never applies the replacement; that is the caller's job.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{BundleError, Result};
use crate::scan::Scanner;
use crate::search::expand_shorthand;
use crate::text::{context_window, single_line};

/// Context bytes carried by each match
const MATCH_CONTEXT: usize = 200;

/// Context bytes on each side of the replacement preview
const PREVIEW_CONTEXT: usize = 60;

/// How far behind the match the code-context scan starts
const CODE_CONTEXT_LOOKBEHIND: usize = 50_000;

/// Identifiers this short are reserved words, not weak anchors
const RESERVED_SHORT_WORDS: &[&str] = &["var", "let", "for", "if", "of", "in", "do", "new"];

/// Outcome of the uniqueness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PatchStatus {
    NotFound,
    Unique,
    Ambiguous,
}

/// Warnings attached to a patch check
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PatchWarning {
    /// The pattern leans on an identifier of three characters or fewer
    ShortIdentifier { identifier: String },
    /// The unique match does not sit in code context
    NonCodeContext { context: String },
}

/// A single occurrence of the pattern
#[derive(Debug, Clone, Serialize)]
pub struct PatchMatch {
    pub offset: usize,
    pub match_text: String,
    pub context: String,
    pub context_offset: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub named_captures: BTreeMap<String, String>,
}

/// Replacement preview, rendered only for a unique match
#[derive(Debug, Clone, Serialize)]
pub struct PatchPreview {
    pub before_window: String,
    pub replacement: String,
    pub after_window: String,
}

/// Full result of a patch check
#[derive(Debug, Clone, Serialize)]
pub struct PatchResult {
    pub status: PatchStatus,
    pub matches: Vec<PatchMatch>,
    pub warnings: Vec<PatchWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PatchPreview>,
}

/// Validate a literal or regex pattern against the buffer.
pub fn patch_check(
    source: &str,
    pattern: &str,
    regex_mode: bool,
    replacement: Option<&str>,
) -> Result<PatchResult> {
    let matches = if regex_mode {
        regex_matches(source, pattern)?
    } else {
        literal_matches(source, pattern)
    };

    let status = match matches.len() {
        0 => PatchStatus::NotFound,
        1 => PatchStatus::Unique,
        _ => PatchStatus::Ambiguous,
    };

    let mut warnings = Vec::new();
    for ident in short_identifiers(pattern) {
        warnings.push(PatchWarning::ShortIdentifier { identifier: ident });
    }

    if status == PatchStatus::Unique && !offset_in_code(source, matches[0].offset) {
        let (window, _) = context_window(source, matches[0].offset, matches[0].offset, 40, 40);
        warnings.push(PatchWarning::NonCodeContext {
            context: single_line(window),
        });
    }

    let preview = match (status, replacement) {
        (PatchStatus::Unique, Some(replacement)) => {
            Some(build_preview(source, &matches[0], replacement, regex_mode))
        }
        _ => None,
    };

    Ok(PatchResult {
        status,
        matches,
        warnings,
        preview,
    })
}

fn literal_matches(source: &str, pattern: &str) -> Vec<PatchMatch> {
    let mut out = Vec::new();
    if pattern.is_empty() {
        return out;
    }
    let mut from = 0;
    while let Some(found) = source[from..].find(pattern) {
        let offset = from + found;
        out.push(make_match(source, offset, offset + pattern.len()));
        from = offset + pattern.len();
    }
    out
}

fn regex_matches(source: &str, pattern: &str) -> Result<Vec<PatchMatch>> {
    let expanded = expand_shorthand(pattern);
    let re = regex::Regex::new(&expanded).map_err(|e| BundleError::PatternInvalid {
        message: e.to_string(),
    })?;

    let mut out = Vec::new();
    for caps in re.captures_iter(source) {
        let Some(m) = caps.get(0) else { continue };
        let mut pm = make_match(source, m.start(), m.end());
        pm.captures = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|g| g.as_str().to_string()).unwrap_or_default())
            .collect();
        for name in re.capture_names().flatten() {
            if let Some(g) = caps.name(name) {
                pm.named_captures
                    .insert(name.to_string(), g.as_str().to_string());
            }
        }
        out.push(pm);
    }
    Ok(out)
}

fn make_match(source: &str, start: usize, end: usize) -> PatchMatch {
    let (window, window_off) = context_window(source, start, end, MATCH_CONTEXT, MATCH_CONTEXT);
    PatchMatch {
        offset: start,
        match_text: source[start..end].to_string(),
        context: single_line(window),
        context_offset: window_off,
        captures: Vec::new(),
        named_captures: BTreeMap::new(),
    }
}

/// Word-boundary identifiers of three characters or fewer in the
/// pattern, excluding reserved words, regex escape letters, and the
/// `%V%`/`%S%` shorthands.
fn short_identifiers(pattern: &str) -> Vec<String> {
    let pattern = pattern
        .replace(crate::search::VAR_SHORTHAND, " ")
        .replace(crate::search::STR_SHORTHAND, " ");
    let pattern = pattern.as_str();
    let bytes = pattern.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if is_word_byte(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            let word = &pattern[start..i];
            let escaped = start > 0 && bytes[start - 1] == b'\\';
            if !escaped
                && word.len() <= 3
                && word.chars().any(|c| c.is_ascii_alphabetic())
                && !RESERVED_SHORT_WORDS.contains(&word)
                && !out.contains(&word.to_string())
            {
                out.push(word.to_string());
            }
        } else {
            i += 1;
        }
    }
    out
}

#[inline]
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Drive the scanner from shortly before the offset to decide whether
/// the match lands in code context.
fn offset_in_code(source: &str, offset: usize) -> bool {
    let start = offset.saturating_sub(CODE_CONTEXT_LOOKBEHIND);
    let start = crate::text::floor_char_boundary(source, start);
    let mut scanner = Scanner::anchored_at(source.as_bytes(), start);
    scanner.mode_at(offset) == crate::scan::ScanMode::Normal
}

fn build_preview(
    source: &str,
    m: &PatchMatch,
    replacement: &str,
    regex_mode: bool,
) -> PatchPreview {
    let expanded = if regex_mode {
        expand_replacement(replacement, &m.captures, &m.named_captures)
    } else {
        replacement.to_string()
    };
    let (before, _) = context_window(source, m.offset, m.offset, PREVIEW_CONTEXT, 0);
    let end = m.offset + m.match_text.len();
    let (after, _) = context_window(source, end, end, 0, PREVIEW_CONTEXT);
    PatchPreview {
        before_window: single_line(before),
        replacement: expanded,
        after_window: single_line(after),
    }
}

/// Expand `$1`, `$2`, … and `${name}` references in a replacement
fn expand_replacement(
    replacement: &str,
    captures: &[String],
    named: &BTreeMap<String, String>,
) -> String {
    let mut out = String::with_capacity(replacement.len());
    let bytes = replacement.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'{' {
                if let Some(close) = replacement[i + 2..].find('}') {
                    let name = &replacement[i + 2..i + 2 + close];
                    if let Some(value) = named.get(name) {
                        out.push_str(value);
                    } else if let Ok(n) = name.parse::<usize>() {
                        if n >= 1 {
                            if let Some(v) = captures.get(n - 1) {
                                out.push_str(v);
                            }
                        }
                    }
                    i += close + 3;
                    continue;
                }
            } else if bytes[i + 1].is_ascii_digit() {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if let Ok(n) = replacement[start..j].parse::<usize>() {
                    if n >= 1 {
                        if let Some(v) = captures.get(n - 1) {
                            out.push_str(v);
                        }
                    }
                }
                i = j;
                continue;
            }
        }
        let ch_len = replacement[i..]
            .chars()
            .next()
            .map(|c| c.len_utf8())
            .unwrap_or(1);
        out.push_str(&replacement[i..i + ch_len]);
        i += ch_len;
    }
    out
}
