//! Function map, fingerprinting and cross-version diff
//!
//! Enumerates every function in a parsed bundle with a version-stable
//! fingerprint (parameter count, async/generator flags, quantized body
//! size, string-literal set) and matches functions across two bundle
//! versions despite total identifier renaming. A faster string-set diff
//! works directly over the landmark indexes of two buffers without a
//! parse.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tree_sitter::{Node, Tree};

use crate::landmarks::collect_landmarks;
use crate::parse::{is_function_kind, node_text, SIGNATURE_PREFIX_LEN};
use crate::refs::function_display_name;
use crate::text::truncate_to_char_boundary;

/// Minimum Jaccard similarity for the fuzzy diff pass
const FUZZY_THRESHOLD: f64 = 0.5;

/// Default minimum length for the string-set diff
pub const STRINGS_DIFF_MIN_LEN: usize = 20;

/// Share of JS syntax characters above which a string is considered
/// code-like and dropped from the string-set diff
const CODE_CHAR_RATIO: f64 = 0.05;

/// Keyword fragments that mark a string as code-like
const CODE_KEYWORDS: &[&str] = &["function", "=>", "return ", "if(", "else{", "catch("];

const SYNTAX_CHARS: &[char] = &[
    '{', '}', '(', ')', '[', ']', ';', '=', '<', '>', '&', '|', '!', '?', ':', '+', '*', '\\',
];

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(v?\d+(\.\d+)+|\d{4}-\d{2}|v\d+)$").unwrap());
static UI_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z]+\b").unwrap());
static CONFIG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(config|settings|option|\.json|env)").unwrap());
static ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(error|failed|exception|cannot|unable|invalid)").unwrap());

/// Telemetry event-name prefixes seen in production bundles
const TELEMETRY_PREFIXES: &[&str] = &["tengu_", "cli_", "telemetry_"];

/// One function in the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionEntry {
    /// Declared name, assigned-to variable, object key, or `<anonymous>`
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub param_count: usize,
    pub is_async: bool,
    pub is_generator: bool,
    /// Signature prefix, newlines replaced by spaces, at most 120 bytes
    pub signature_prefix: String,
    /// Sorted unique string literals in the subtree, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strings_used: Option<BTreeSet<String>>,
}

impl FunctionEntry {
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    fn strings(&self) -> Option<&BTreeSet<String>> {
        self.strings_used.as_ref().filter(|s| !s.is_empty())
    }
}

/// Enumerate every function-like node in the tree, in start order.
pub fn collect_functions(tree: &Tree, source: &str, with_strings: bool) -> Vec<FunctionEntry> {
    let mut out = Vec::new();
    collect_into(tree.root_node(), source, with_strings, &mut out);
    out.sort_by_key(|e| e.start);
    out
}

fn collect_into(node: Node, source: &str, with_strings: bool, out: &mut Vec<FunctionEntry>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if is_function_kind(child.kind()) {
            out.push(entry_for(&child, source, with_strings));
        }
        collect_into(child, source, with_strings, out);
    }
}

fn entry_for(node: &Node, source: &str, with_strings: bool) -> FunctionEntry {
    let start = node.start_byte();
    let end = node.end_byte();

    let sig_end = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or(end)
        .min(start + SIGNATURE_PREFIX_LEN)
        .max(start);
    let sig_end = crate::text::floor_char_boundary(source, sig_end).max(start);
    let signature_prefix =
        truncate_to_char_boundary(&source[start..sig_end], SIGNATURE_PREFIX_LEN)
            .replace('\n', " ")
            .trim_end()
            .to_string();

    FunctionEntry {
        name: function_display_name(source, node),
        start,
        end,
        param_count: count_params(node),
        is_async: has_token(node, "async"),
        is_generator: node.kind().contains("generator") || has_token(node, "*"),
        signature_prefix,
        strings_used: with_strings.then(|| {
            let mut strings = BTreeSet::new();
            collect_strings(*node, source, &mut strings);
            strings
        }),
    }
}

fn count_params(node: &Node) -> usize {
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        return params
            .children(&mut cursor)
            .filter(|c| c.is_named() && c.kind() != "comment")
            .count();
    }
    if node.child_by_field_name("parameter").is_some() {
        return 1;
    }
    0
}

fn has_token(node: &Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

/// Gather string-literal contents in the subtree, template quasis
/// included.
fn collect_strings(node: Node, source: &str, out: &mut BTreeSet<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string" => {
                let text = node_text(&child, source);
                if text.len() >= 2 {
                    out.insert(text[1..text.len() - 1].to_string());
                }
            }
            "template_string" => {
                let mut inner = child.walk();
                for quasi in child.children(&mut inner) {
                    if matches!(quasi.kind(), "string_fragment" | "template_chars") {
                        out.insert(node_text(&quasi, source).to_string());
                    }
                }
                collect_strings(child, source, out);
            }
            _ => collect_strings(child, source, out),
        }
    }
}

/// Quantize a body size to the nearest 10%
pub fn size_bin(size: usize) -> usize {
    let bin = ((size as f64) * 0.1).round().max(1.0);
    ((size as f64 / bin).round() * bin) as usize
}

/// Version-stable, identifier-insensitive digest of a function's shape
pub fn fingerprint(entry: &FunctionEntry) -> String {
    let strings = entry
        .strings_used
        .as_ref()
        .map(|s| s.iter().cloned().collect::<Vec<_>>().join("\u{1f}"))
        .unwrap_or_default();
    format!(
        "{}|{}|{}|{}|{}",
        entry.param_count,
        entry.is_async as u8,
        entry.is_generator as u8,
        size_bin(entry.size()),
        strings
    )
}

/// A function present in both versions with an unchanged fingerprint
#[derive(Debug, Clone, Serialize)]
pub struct UnchangedEntry {
    pub v1: FunctionEntry,
    pub v2: FunctionEntry,
    /// Byte-offset displacement across versions
    pub shift: i64,
}

/// A fuzzy-matched function with its string-set delta
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedEntry {
    pub v1: FunctionEntry,
    pub v2: FunctionEntry,
    pub size_diff: i64,
    pub similarity: f64,
    pub added_strings: Vec<String>,
    pub removed_strings: Vec<String>,
}

/// Four disjoint lists over the two maps
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    pub unchanged: Vec<UnchangedEntry>,
    pub modified: Vec<ModifiedEntry>,
    pub added: Vec<FunctionEntry>,
    pub removed: Vec<FunctionEntry>,
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// Three-pass match of two function maps.
///
/// 1. Exact-fingerprint match, nearest unclaimed start wins.
/// 2. Fuzzy match over string-set similarity for the remainder.
/// 3. Leftovers become `removed` (v1) and `added` (v2).
pub fn diff_maps(map1: &[FunctionEntry], map2: &[FunctionEntry]) -> DiffResult {
    let mut result = DiffResult::default();
    let mut claimed2 = vec![false; map2.len()];
    let mut matched1 = vec![false; map1.len()];

    // pass 1: exact fingerprints
    let mut by_fp: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, f2) in map2.iter().enumerate() {
        by_fp.entry(fingerprint(f2)).or_default().push(i);
    }
    for (i, f1) in map1.iter().enumerate() {
        let fp = fingerprint(f1);
        let Some(candidates) = by_fp.get(&fp) else {
            continue;
        };
        let best = candidates
            .iter()
            .filter(|&&j| !claimed2[j])
            .min_by_key(|&&j| map2[j].start.abs_diff(f1.start));
        if let Some(&j) = best {
            claimed2[j] = true;
            matched1[i] = true;
            result.unchanged.push(UnchangedEntry {
                v1: f1.clone(),
                v2: map2[j].clone(),
                shift: map2[j].start as i64 - f1.start as i64,
            });
        }
    }

    // pass 2: fuzzy string-set match
    for (i, f1) in map1.iter().enumerate() {
        if matched1[i] {
            continue;
        }
        let Some(s1) = f1.strings() else { continue };
        let mut best: Option<(usize, f64)> = None;
        for (j, f2) in map2.iter().enumerate() {
            if claimed2[j] || f2.param_count != f1.param_count {
                continue;
            }
            let Some(s2) = f2.strings() else { continue };
            let sim = jaccard(s1, s2);
            if sim >= FUZZY_THRESHOLD && best.map_or(true, |(_, b)| sim > b) {
                best = Some((j, sim));
            }
        }
        if let Some((j, similarity)) = best {
            claimed2[j] = true;
            matched1[i] = true;
            let f2 = &map2[j];
            let s2 = f2.strings_used.clone().unwrap_or_default();
            let s1 = f1.strings_used.clone().unwrap_or_default();
            result.modified.push(ModifiedEntry {
                size_diff: f2.size() as i64 - f1.size() as i64,
                similarity,
                added_strings: s2.difference(&s1).cloned().collect(),
                removed_strings: s1.difference(&s2).cloned().collect(),
                v1: f1.clone(),
                v2: f2.clone(),
            });
        }
    }

    // pass 3: leftovers
    for (i, f1) in map1.iter().enumerate() {
        if !matched1[i] {
            result.removed.push(f1.clone());
        }
    }
    for (j, f2) in map2.iter().enumerate() {
        if !claimed2[j] {
            result.added.push(f2.clone());
        }
    }

    result
}

/// Advisory change category, derived from the diff sets without
/// altering them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ChangeCategory {
    VersionBump,
    Telemetry,
    UiUx,
    Configuration,
    ErrorHandling,
    Other,
}

impl ChangeCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::VersionBump => "version bump",
            Self::Telemetry => "telemetry",
            Self::UiUx => "UI/UX",
            Self::Configuration => "configuration",
            Self::ErrorHandling => "error handling",
            Self::Other => "other",
        }
    }
}

/// Category summary over the diff
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub buckets: BTreeMap<ChangeCategory, Vec<String>>,
}

fn categorize_strings(strings: &[String]) -> ChangeCategory {
    if !strings.is_empty() && strings.iter().all(|s| VERSION_RE.is_match(s)) {
        return ChangeCategory::VersionBump;
    }
    if strings
        .iter()
        .any(|s| TELEMETRY_PREFIXES.iter().any(|p| s.starts_with(p)))
    {
        return ChangeCategory::Telemetry;
    }
    if strings.iter().any(|s| s.len() > 30 && UI_WORD_RE.is_match(s)) {
        return ChangeCategory::UiUx;
    }
    if strings.iter().any(|s| CONFIG_RE.is_match(s)) {
        return ChangeCategory::Configuration;
    }
    if strings.iter().any(|s| ERROR_RE.is_match(s)) {
        return ChangeCategory::ErrorHandling;
    }
    ChangeCategory::Other
}

/// Bucket the modified/added/removed functions by change category.
pub fn categorize(diff: &DiffResult) -> CategorySummary {
    let mut buckets: BTreeMap<ChangeCategory, Vec<String>> = BTreeMap::new();

    for m in &diff.modified {
        let mut changed: Vec<String> = m.added_strings.clone();
        changed.extend(m.removed_strings.iter().cloned());
        let cat = categorize_strings(&changed);
        buckets.entry(cat).or_default().push(m.v1.name.clone());
    }
    for f in diff.added.iter().chain(diff.removed.iter()) {
        let strings: Vec<String> = f
            .strings_used
            .as_ref()
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        let cat = categorize_strings(&strings);
        buckets.entry(cat).or_default().push(f.name.clone());
    }

    CategorySummary { buckets }
}

/// Options for the landmark-based string-set diff
#[derive(Debug, Clone)]
pub struct StringsDiffOptions {
    pub min_length: usize,
    pub limit: Option<usize>,
    /// Disable the code-likeness filter
    pub raw: bool,
}

impl Default for StringsDiffOptions {
    fn default() -> Self {
        Self {
            min_length: STRINGS_DIFF_MIN_LEN,
            limit: None,
            raw: false,
        }
    }
}

/// Symmetric difference of two buffers' string sets
#[derive(Debug, Clone, Serialize)]
pub struct StringsDiff {
    pub only_in_v1: Vec<String>,
    pub only_in_v2: Vec<String>,
    /// Strings dropped by length or code-likeness filters
    pub filtered_v1: usize,
    pub filtered_v2: usize,
    pub truncated_v1: usize,
    pub truncated_v2: usize,
}

/// True when a string looks like a fragment of JS rather than content
pub fn looks_like_code(s: &str) -> bool {
    if CODE_KEYWORDS.iter().any(|k| s.contains(k)) {
        return true;
    }
    if s.is_empty() {
        return false;
    }
    let syntax = s.chars().filter(|c| SYNTAX_CHARS.contains(c)).count();
    syntax as f64 / s.chars().count() as f64 >= CODE_CHAR_RATIO
}

/// Fast cross-version diff over landmark sets, no parse required.
pub fn diff_strings(buf1: &[u8], buf2: &[u8], opts: &StringsDiffOptions) -> StringsDiff {
    let set1: BTreeSet<String> = collect_landmarks(buf1)
        .into_iter()
        .map(|l| l.content)
        .collect();
    let set2: BTreeSet<String> = collect_landmarks(buf2)
        .into_iter()
        .map(|l| l.content)
        .collect();

    let select = |only: Vec<String>| -> (Vec<String>, usize, usize) {
        let before = only.len();
        let mut kept: Vec<String> = only
            .into_iter()
            .filter(|s| s.len() >= opts.min_length)
            .filter(|s| opts.raw || !looks_like_code(s))
            .collect();
        let filtered = before - kept.len();
        let mut truncated = 0;
        if let Some(limit) = opts.limit {
            if kept.len() > limit {
                truncated = kept.len() - limit;
                kept.truncate(limit);
            }
        }
        (kept, filtered, truncated)
    };

    let (only_in_v1, filtered_v1, truncated_v1) =
        select(set1.difference(&set2).cloned().collect());
    let (only_in_v2, filtered_v2, truncated_v2) =
        select(set2.difference(&set1).cloned().collect());

    StringsDiff {
        only_in_v1,
        only_in_v2,
        filtered_v1,
        filtered_v2,
        truncated_v1,
        truncated_v2,
    }
}
