//! Streaming character state machine for minified JavaScript
//!
//! Classifies every byte of a source buffer as code, string, template,
//! regex, or comment without building a syntax tree. This is the shared
//! substrate for every fast-path command: the beautifier, the landmark
//! index, the boundary scanner, pattern search, and the patch validator
//! all drive this machine over the raw buffer.
//!
//! The machine is deterministic and never backtracks. It is exact for
//! syntactically valid programs and conservatively safe otherwise: a
//! misclassification stays local because callers re-anchor at well-known
//! landmarks (string literals, function keywords).

use serde::Serialize;

/// Characters that put a following `/` into regex context.
///
/// From `Normal` mode a `/` opens a regex literal only when the last
/// non-whitespace character is one of these, a newline, or absent
/// (start of buffer). Anything else means division.
const REGEX_CONTEXT_CHARS: &[u8] = b"=(:;,!&|?{[+->~%^";

/// Lexical mode of the scanner at a given position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanMode {
    Normal,
    StringSingle,
    StringDouble,
    Template,
    Regex,
    LineComment,
    BlockComment,
}

impl ScanMode {
    /// Human-readable label used in diagnostics and warnings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "code",
            Self::StringSingle => "single-quoted string",
            Self::StringDouble => "double-quoted string",
            Self::Template => "template literal",
            Self::Regex => "regex literal",
            Self::LineComment => "line comment",
            Self::BlockComment => "block comment",
        }
    }
}

/// Scanner state advanced one code unit at a time
///
/// `escape_pending` covers backslash escapes inside strings, templates
/// and regexes; inside a block comment it marks a `*` that is about to
/// close the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    pub mode: ScanMode,
    escape_pending: bool,
    template_depth: u32,
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            mode: ScanMode::Normal,
            escape_pending: false,
            template_depth: 0,
        }
    }

    /// True when the current position is ordinary code
    #[inline]
    pub fn is_in_code(&self) -> bool {
        self.mode == ScanMode::Normal
    }

    /// Advance over one code unit.
    ///
    /// `ch` is classified under the state *before* the call; the state
    /// after the call classifies the next code unit. `next_ch` is one
    /// unit of lookahead (None at end of buffer), `prev_non_ws` the last
    /// non-whitespace code-context byte seen so far (None at start).
    ///
    /// Regex flag letters after the closing `/` fall back to `Normal`
    /// and classify as identifiers. That is deliberately informal; the
    /// analyses built on this machine never need flags.
    pub fn advance(&mut self, ch: u8, next_ch: Option<u8>, prev_non_ws: Option<u8>) {
        match self.mode {
            ScanMode::Normal => match ch {
                b'\'' => self.mode = ScanMode::StringSingle,
                b'"' => self.mode = ScanMode::StringDouble,
                b'`' => {
                    self.mode = ScanMode::Template;
                    self.template_depth = 0;
                }
                b'/' => match next_ch {
                    Some(b'/') => self.mode = ScanMode::LineComment,
                    Some(b'*') => self.mode = ScanMode::BlockComment,
                    _ => {
                        if is_regex_context(prev_non_ws) {
                            self.mode = ScanMode::Regex;
                        }
                    }
                },
                _ => {}
            },
            ScanMode::StringSingle => {
                if self.escape_pending {
                    self.escape_pending = false;
                } else if ch == b'\\' {
                    self.escape_pending = true;
                } else if ch == b'\'' {
                    self.mode = ScanMode::Normal;
                }
            }
            ScanMode::StringDouble => {
                if self.escape_pending {
                    self.escape_pending = false;
                } else if ch == b'\\' {
                    self.escape_pending = true;
                } else if ch == b'"' {
                    self.mode = ScanMode::Normal;
                }
            }
            ScanMode::Template => {
                if self.escape_pending {
                    self.escape_pending = false;
                } else if ch == b'\\' {
                    self.escape_pending = true;
                } else if ch == b'`' && self.template_depth == 0 {
                    self.mode = ScanMode::Normal;
                } else if ch == b'$' && next_ch == Some(b'{') {
                    self.template_depth += 1;
                } else if ch == b'}' && self.template_depth > 0 {
                    self.template_depth -= 1;
                }
            }
            ScanMode::Regex => {
                if self.escape_pending {
                    self.escape_pending = false;
                } else if ch == b'\\' {
                    self.escape_pending = true;
                } else if ch == b'/' {
                    self.mode = ScanMode::Normal;
                }
            }
            ScanMode::LineComment => {
                if ch == b'\n' {
                    self.mode = ScanMode::Normal;
                }
            }
            ScanMode::BlockComment => {
                if self.escape_pending {
                    // previous unit was a closing `*`
                    self.escape_pending = false;
                    if ch == b'/' {
                        self.mode = ScanMode::Normal;
                    } else if ch == b'*' && next_ch == Some(b'/') {
                        self.escape_pending = true;
                    }
                } else if ch == b'*' && next_ch == Some(b'/') {
                    self.escape_pending = true;
                }
            }
        }
    }
}

/// Regex-context predicate over the last non-whitespace code byte
#[inline]
pub fn is_regex_context(prev_non_ws: Option<u8>) -> bool {
    match prev_non_ws {
        None => true,
        Some(b'\n') => true,
        Some(c) => REGEX_CONTEXT_CHARS.contains(&c),
    }
}

/// Cursor driving a [`ScanState`] over a byte buffer
///
/// Tracks the one-byte lookahead and the last non-whitespace code byte
/// so callers only deal with positions and modes. The mode reported for
/// a position is the state in which that byte is read, i.e. the opening
/// quote of a string still classifies as code and the closing quote as
/// string content.
pub struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
    state: ScanState,
    prev_non_ws: Option<u8>,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            state: ScanState::new(),
            prev_non_ws: None,
        }
    }

    /// Start scanning mid-buffer, assuming code context at `start`.
    ///
    /// Used by callers that re-anchor at a known-good offset instead of
    /// paying for a scan from zero.
    pub fn anchored_at(buf: &'a [u8], start: usize) -> Self {
        Self {
            buf,
            pos: start.min(buf.len()),
            state: ScanState::new(),
            prev_non_ws: None,
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Mode in which the byte at the current position will be read
    #[inline]
    pub fn mode(&self) -> ScanMode {
        self.state.mode
    }

    #[inline]
    pub fn is_in_code(&self) -> bool {
        self.state.is_in_code()
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Consume one byte. Returns `(position, byte, mode_before)` or
    /// `None` at end of buffer.
    pub fn step(&mut self) -> Option<(usize, u8, ScanMode)> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let pos = self.pos;
        let ch = self.buf[pos];
        let mode_before = self.state.mode;
        let next_ch = self.buf.get(pos + 1).copied();

        self.state.advance(ch, next_ch, self.prev_non_ws);

        // prev_non_ws only tracks code-context bytes; a newline counts
        // because it re-opens regex context.
        if mode_before == ScanMode::Normal && (ch == b'\n' || !ch.is_ascii_whitespace()) {
            self.prev_non_ws = Some(ch);
        }
        self.pos += 1;
        Some((pos, ch, mode_before))
    }

    /// Drive the scanner up to (not including) `target`, returning the
    /// mode in which the byte at `target` will be read.
    pub fn mode_at(&mut self, target: usize) -> ScanMode {
        while self.pos < target {
            if self.step().is_none() {
                break;
            }
        }
        self.state.mode
    }
}
