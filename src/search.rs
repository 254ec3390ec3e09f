//! Pattern search grouped by enclosing function
//!
//! Literal byte-substring and regex search over the raw buffer, with two
//! fixed shorthand expansions tuned for minified code: `%V%` matches a
//! minified identifier and `%S%` a double-quoted string with escapes.
//! Every match is attributed to its enclosing function so results read
//! as "which functions touch this pattern" rather than raw offsets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::boundary::FunctionIndex;
use crate::error::{BundleError, Result};
use crate::text::{context_window, single_line};

/// Context bytes attached to each match on either side
const MATCH_CONTEXT: usize = 80;

/// Shorthand for a minified identifier rune sequence
pub const VAR_SHORTHAND: &str = "%V%";
/// Shorthand for a double-quoted string literal with escapes
pub const STR_SHORTHAND: &str = "%S%";

/// Expand the fixed shorthands into their regex equivalents.
///
/// Applies to regex patterns only, before compilation; literal-mode
/// search never expands them.
pub fn expand_shorthand(pattern: &str) -> String {
    pattern
        .replace(VAR_SHORTHAND, r"[\w$]+")
        .replace(STR_SHORTHAND, r#""(?:[^"\\]|\\.)*""#)
}

/// Search configuration
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub pattern: String,
    pub regex: bool,
    pub captures: bool,
    /// Keep only matches within `near_radius` of this offset
    pub near: Option<usize>,
    pub near_radius: usize,
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex: false,
            captures: false,
            near: None,
            near_radius: crate::landmarks::DEFAULT_NEAR_RADIUS,
            limit: None,
        }
    }

    pub fn with_regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn with_captures(mut self, captures: bool) -> Self {
        self.captures = captures;
        self
    }

    pub fn with_near(mut self, offset: usize) -> Self {
        self.near = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A single match with its context window
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub offset: usize,
    pub match_text: String,
    pub context: String,
    pub context_offset: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub named_captures: BTreeMap<String, String>,
}

/// Matches grouped under one enclosing function
#[derive(Debug, Clone, Serialize)]
pub struct FunctionGroup {
    /// Inferred function name, or `(module scope)` for top-level hits
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub hits: Vec<SearchHit>,
}

/// Full search report
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub total: usize,
    /// Matches dropped by the result limit ("and N more")
    pub truncated: usize,
    pub groups: Vec<FunctionGroup>,
}

/// Run a search over the buffer and group matches by function.
pub fn search(source: &str, opts: &SearchOptions) -> Result<SearchReport> {
    let mut hits = if opts.regex {
        regex_hits(source, opts)?
    } else {
        literal_hits(source, opts)
    };

    if let Some(target) = opts.near {
        hits.retain(|h| h.offset.abs_diff(target) <= opts.near_radius);
    }

    let total = hits.len();
    let mut truncated = 0;
    if let Some(limit) = opts.limit {
        if hits.len() > limit {
            truncated = hits.len() - limit;
            hits.truncate(limit);
        }
    }

    Ok(SearchReport {
        total,
        truncated,
        groups: group_by_function(source, hits),
    })
}

fn literal_hits(source: &str, opts: &SearchOptions) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if opts.pattern.is_empty() {
        return hits;
    }
    let mut from = 0;
    while let Some(found) = source[from..].find(&opts.pattern) {
        let offset = from + found;
        hits.push(make_hit(source, offset, offset + opts.pattern.len()));
        from = offset + opts.pattern.len().max(1);
    }
    hits
}

fn regex_hits(source: &str, opts: &SearchOptions) -> Result<Vec<SearchHit>> {
    let expanded = expand_shorthand(&opts.pattern);
    let re = regex::Regex::new(&expanded).map_err(|e| BundleError::PatternInvalid {
        message: e.to_string(),
    })?;

    let mut hits = Vec::new();
    for caps in re.captures_iter(source) {
        let Some(m) = caps.get(0) else { continue };
        let mut hit = make_hit(source, m.start(), m.end());
        if opts.captures {
            hit.captures = caps
                .iter()
                .skip(1)
                .map(|g| g.map(|g| g.as_str().to_string()).unwrap_or_default())
                .collect();
            for name in re.capture_names().flatten() {
                if let Some(g) = caps.name(name) {
                    hit.named_captures
                        .insert(name.to_string(), g.as_str().to_string());
                }
            }
        }
        hits.push(hit);
    }
    Ok(hits)
}

fn make_hit(source: &str, start: usize, end: usize) -> SearchHit {
    let (window, window_off) = context_window(source, start, end, MATCH_CONTEXT, MATCH_CONTEXT);
    SearchHit {
        offset: start,
        match_text: source[start..end].to_string(),
        context: single_line(window),
        context_offset: window_off,
        captures: Vec::new(),
        named_captures: BTreeMap::new(),
    }
}

fn group_by_function(source: &str, hits: Vec<SearchHit>) -> Vec<FunctionGroup> {
    let index = FunctionIndex::build(source.as_bytes());
    let buf = source.as_bytes();

    // keyed by function start so groups sort by position
    let mut grouped: BTreeMap<Option<usize>, FunctionGroup> = BTreeMap::new();
    for hit in hits {
        let span = index.enclosing_span(buf, hit.offset);
        let key = span.as_ref().map(|s| s.sig_start);
        let entry = grouped.entry(key).or_insert_with(|| match &span {
            Some(s) => FunctionGroup {
                function: crate::boundary::infer_name(buf, s)
                    .unwrap_or_else(|| "<anonymous>".to_string()),
                function_start: Some(s.sig_start),
                signature: Some(s.signature_text.clone()),
                hits: Vec::new(),
            },
            None => FunctionGroup {
                function: "(module scope)".to_string(),
                function_start: None,
                signature: None,
                hits: Vec::new(),
            },
        });
        entry.hits.push(hit);
    }

    // module-scope group first is what BTreeMap<None, ..> gives; keep
    // function groups ordered by start after it
    grouped.into_values().collect()
}
