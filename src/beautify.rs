//! Beautifier: reformat one-line minified source into indented lines
//!
//! The formatter splits on `{` `}` `;` and newlines while the scanner
//! reports code context, and copies strings, templates, comments and
//! regex literals verbatim. Alongside the text it emits a line-to-offset
//! map so every beautified line can be traced back to a byte offset in
//! the original buffer for subsequent navigation.

use serde::Serialize;

use crate::scan::{ScanMode, Scanner};

const INDENT: &str = "  ";

/// Beautified text plus the line-to-original-offset map
#[derive(Debug, Clone, Serialize)]
pub struct BeautifyResult {
    /// Reformatted source, two-space indent, no blank lines
    pub text: String,
    /// `line_offsets[i]` is the byte offset in the original buffer of
    /// the first substantive character of beautified line `i`
    pub line_offsets: Vec<usize>,
}

struct Emitter {
    out: Vec<u8>,
    offsets: Vec<usize>,
    line: Vec<u8>,
    line_offset: Option<usize>,
    indent: usize,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            offsets: Vec::new(),
            line: Vec::new(),
            line_offset: None,
            indent: 0,
        }
    }

    fn push(&mut self, ch: u8, offset: usize) {
        if self.line.is_empty() && ch.is_ascii_whitespace() {
            return;
        }
        if self.line_offset.is_none() {
            self.line_offset = Some(offset);
        }
        self.line.push(ch);
    }

    fn flush(&mut self) {
        if self.line.is_empty() {
            self.line_offset = None;
            return;
        }
        for _ in 0..self.indent {
            self.out.extend_from_slice(INDENT.as_bytes());
        }
        self.out.extend_from_slice(&self.line);
        self.out.push(b'\n');
        self.offsets.push(self.line_offset.unwrap_or(0));
        self.line.clear();
        self.line_offset = None;
    }
}

/// Reformat `source` and build the offset map.
///
/// The output is not semantically minimal whitespace; it only has to be
/// reversible through the offset map.
pub fn beautify(source: &[u8]) -> BeautifyResult {
    let mut scanner = Scanner::new(source);
    let mut em = Emitter::new();

    while let Some((pos, ch, mode)) = scanner.step() {
        if mode != ScanMode::Normal {
            // the newline terminating a line comment ends the line
            if ch == b'\n' && mode == ScanMode::LineComment {
                em.flush();
            } else {
                em.push(ch, pos);
            }
            continue;
        }
        match ch {
            b'{' => {
                em.push(b'{', pos);
                em.flush();
                em.indent += 1;
            }
            b'}' => {
                em.flush();
                em.indent = em.indent.saturating_sub(1);
                em.push(b'}', pos);
                em.flush();
            }
            b';' => {
                em.push(b';', pos);
                em.flush();
            }
            b'\n' => em.flush(),
            _ => em.push(ch, pos),
        }
    }
    em.flush();

    BeautifyResult {
        text: String::from_utf8_lossy(&em.out).into_owned(),
        line_offsets: em.offsets,
    }
}

/// Beautify a slice of the buffer, keeping offsets relative to the
/// buffer start. The slice is assumed to begin in code context.
pub fn beautify_slice(source: &[u8], start: usize, end: usize) -> BeautifyResult {
    let end = end.min(source.len());
    let start = start.min(end);
    let mut result = beautify(&source[start..end]);
    for off in &mut result.line_offsets {
        *off += start;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_split_and_offset_map() {
        // S1
        let result = beautify(b"a=1;b=2;c=3");
        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(lines, vec!["a=1;", "b=2;", "c=3"]);
        assert_eq!(result.line_offsets, vec![0, 4, 8]);
    }

    #[test]
    fn test_brace_indentation() {
        let result = beautify(b"function f(){return 1}");
        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(lines, vec!["function f(){", "  return 1", "}"]);
    }

    #[test]
    fn test_nested_braces() {
        let result = beautify(b"function a(){function b(){return 2}}");
        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "function a(){",
                "  function b(){",
                "    return 2",
                "  }",
                "}"
            ]
        );
    }

    #[test]
    fn test_string_contents_copied_verbatim() {
        let result = beautify(br#"a="x{;}y";b=1"#);
        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(lines, vec![r#"a="x{;}y";"#, "b=1"]);
    }

    #[test]
    fn test_regex_semicolons_do_not_split() {
        let result = beautify(b"x=/a;b/;y=1");
        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(lines, vec!["x=/a;b/;", "y=1"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let result = beautify(b"a=1;\n\n\nb=2;");
        let lines: Vec<&str> = result.text.lines().collect();
        assert_eq!(lines, vec!["a=1;", "b=2;"]);
        assert_eq!(result.line_offsets, vec![0, 7]);
    }

    #[test]
    fn test_offset_map_points_at_substantive_chars() {
        let src = b"if(a){b()}else{c()}";
        let result = beautify(src);
        for (i, line) in result.text.lines().enumerate() {
            let off = result.line_offsets[i];
            let first = line.trim_start().as_bytes()[0];
            assert_eq!(
                src[off], first,
                "line {} offset {} should point at {:?}",
                i, off, first as char
            );
        }
    }

    #[test]
    fn test_whitespace_stripped_equivalence() {
        // the formatter only ever moves whitespace around
        let src = b"function f(a){if(a){return 1}else{return 2}}var z=3;";
        let result = beautify(src);
        let strip =
            |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(strip(&result.text), strip(std::str::from_utf8(src).unwrap()));
    }

    #[test]
    fn test_beautify_slice_shifts_offsets() {
        let src = b"a=1;b=2;c=3";
        let result = beautify_slice(src, 4, 11);
        assert_eq!(result.line_offsets, vec![4, 8]);
    }
}
