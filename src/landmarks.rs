//! Landmark index: string literals as navigation anchors
//!
//! String literals survive minification untouched, which makes them the
//! most reliable way to locate code in a renamed, single-line bundle.
//! A single streaming pass over the scanner records every string and
//! template literal with its byte offset; template literals containing
//! interpolation are discarded because their text is not stable.

use serde::Serialize;

use crate::scan::{ScanMode, Scanner};

/// Default proximity radius for `--near` queries, in bytes
pub const DEFAULT_NEAR_RADIUS: usize = 5_000;

/// A string literal landmark
#[derive(Debug, Clone, Serialize)]
pub struct StringLiteral {
    /// Literal content without the surrounding quotes
    pub content: String,
    /// Byte offset of the opening quote
    pub offset: usize,
    /// Span length including both quotes
    pub length: usize,
    /// Name of the enclosing function, when enrichment ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing_function_name: Option<String>,
}

/// Enumerate all string landmarks in a single scanner pass
pub fn collect_landmarks(buf: &[u8]) -> Vec<StringLiteral> {
    let mut scanner = Scanner::new(buf);
    let mut landmarks = Vec::new();
    let mut open: Option<usize> = None;

    while let Some((pos, ch, mode)) = scanner.step() {
        match mode {
            ScanMode::Normal => {
                if matches!(ch, b'\'' | b'"' | b'`') {
                    // quote may also open a regex-adjacent state; confirm
                    if matches!(
                        scanner.mode(),
                        ScanMode::StringSingle | ScanMode::StringDouble | ScanMode::Template
                    ) {
                        open = Some(pos);
                    }
                }
            }
            ScanMode::StringSingle | ScanMode::StringDouble | ScanMode::Template => {
                if scanner.mode() == ScanMode::Normal {
                    if let Some(start) = open.take() {
                        let content =
                            String::from_utf8_lossy(&buf[start + 1..pos]).into_owned();
                        // interpolated templates are not stable anchors
                        if !(mode == ScanMode::Template && content.contains("${")) {
                            landmarks.push(StringLiteral {
                                content,
                                offset: start,
                                length: pos - start + 1,
                                enclosing_function_name: None,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
    landmarks
}

/// Filter and proximity options for landmark queries
#[derive(Debug, Clone, Default)]
pub struct LandmarkQuery {
    filter: Option<String>,
    near: Option<(usize, usize)>,
}

impl LandmarkQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only landmarks whose content contains `substring`
    pub fn with_filter(mut self, substring: impl Into<String>) -> Self {
        self.filter = Some(substring.into());
        self
    }

    /// Keep only landmarks within `radius` bytes of `offset`
    pub fn with_near(mut self, offset: usize, radius: usize) -> Self {
        self.near = Some((offset, radius));
        self
    }

    /// Apply the query to a landmark list
    pub fn apply(&self, landmarks: Vec<StringLiteral>) -> Vec<StringLiteral> {
        landmarks
            .into_iter()
            .filter(|l| {
                if let Some(ref f) = self.filter {
                    if !l.content.contains(f.as_str()) {
                        return false;
                    }
                }
                if let Some((target, radius)) = self.near {
                    let dist = l.offset.abs_diff(target);
                    if dist > radius {
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}
