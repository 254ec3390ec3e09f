//! I/O-channel tracer
//!
//! Classifies every writer of a textual channel (e.g.
//! `process.stdout.write`) by the framing its context suggests, scans
//! for the known reader idioms, and warns when binary writers coexist
//! with line-based readers on the same channel. Everything here is
//! heuristic window-reading over the raw buffer; no tree is built.

use serde::Serialize;

use crate::boundary::FunctionIndex;
use crate::text::{context_window, single_line};

/// Bytes of context read around each writer occurrence
const WRITER_WINDOW: usize = 768;

/// Wire framing suggested by a writer's context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transport {
    Binary,
    JsonNewline,
    Json,
    Text,
    Unknown,
}

impl Transport {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Binary => "BINARY (UInt32 length-prefixed)",
            Self::JsonNewline => "JSON+NL",
            Self::Json => "JSON",
            Self::Text => "TEXT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Reader idioms recognized by the fixed table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReaderKind {
    LineInterface,
    RawStream,
    BinaryReader,
    LineEvent,
}

impl ReaderKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LineInterface => "line-based (createInterface)",
            Self::RawStream => "raw stream (on data)",
            Self::BinaryReader => "binary reader (readUInt32)",
            Self::LineEvent => "line event (on line)",
        }
    }

    fn is_line_based(&self) -> bool {
        matches!(self, Self::LineInterface | Self::LineEvent)
    }
}

/// Fixed reader-detection table
const READER_TABLE: &[(&str, ReaderKind)] = &[
    ("createInterface", ReaderKind::LineInterface),
    ("on('data')", ReaderKind::RawStream),
    ("on(\"data\")", ReaderKind::RawStream),
    ("readUInt32LE", ReaderKind::BinaryReader),
    ("readUInt32BE", ReaderKind::BinaryReader),
    ("on('line')", ReaderKind::LineEvent),
    ("on(\"line\")", ReaderKind::LineEvent),
];

/// One writer call site
#[derive(Debug, Clone, Serialize)]
pub struct WriterSite {
    pub offset: usize,
    pub transport: Transport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub context: String,
}

/// One reader call site
#[derive(Debug, Clone, Serialize)]
pub struct ReaderSite {
    pub offset: usize,
    pub kind: ReaderKind,
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

/// Full channel report
#[derive(Debug, Clone, Serialize)]
pub struct TraceIoReport {
    pub channel: String,
    pub writers: Vec<WriterSite>,
    pub readers: Vec<ReaderSite>,
    pub warnings: Vec<String>,
}

/// Classify a writer occurrence from its 768-byte context window
fn classify_writer(source: &str, offset: usize, channel_len: usize) -> Transport {
    let (window, _) = context_window(source, offset, offset + channel_len, 0, WRITER_WINDOW);

    if window.contains("Buffer.alloc")
        || window.contains("writeUInt32LE")
        || window.contains("writeUInt32BE")
    {
        return Transport::Binary;
    }
    if window.contains("JSON.stringify") {
        // newline delimiter shows up as the escape sequence `\n` in a
        // string argument
        if window.contains("\\n") {
            return Transport::JsonNewline;
        }
        return Transport::Json;
    }

    // a string-literal first argument marks plain text
    let after = &source.as_bytes()[(offset + channel_len).min(source.len())..];
    if after.first() == Some(&b'(')
        && matches!(after.get(1), Some(b'"') | Some(b'\'') | Some(b'`'))
    {
        return Transport::Text;
    }

    Transport::Unknown
}

/// Trace writers and readers of a channel pattern across the buffer.
pub fn trace_channel(source: &str, channel: &str) -> TraceIoReport {
    let index = FunctionIndex::build(source.as_bytes());
    let buf = source.as_bytes();

    let mut writers = Vec::new();
    let mut from = 0;
    while let Some(found) = source[from..].find(channel) {
        let offset = from + found;
        from = offset + channel.len().max(1);
        let (window, _) = context_window(source, offset, offset + channel.len(), 40, 80);
        writers.push(WriterSite {
            offset,
            transport: classify_writer(source, offset, channel.len()),
            function: index.enclosing_name(buf, offset),
            context: single_line(window),
        });
    }

    let mut readers = Vec::new();
    for (pattern, kind) in READER_TABLE {
        let mut from = 0;
        while let Some(found) = source[from..].find(pattern) {
            let offset = from + found;
            from = offset + pattern.len();
            readers.push(ReaderSite {
                offset,
                kind: *kind,
                pattern: pattern.to_string(),
                function: index.enclosing_name(buf, offset),
            });
        }
    }
    readers.sort_by_key(|r| r.offset);

    let mut warnings = Vec::new();
    let has_binary_writer = writers.iter().any(|w| w.transport == Transport::Binary);
    let has_line_reader = readers.iter().any(|r| r.kind.is_line_based());
    if has_binary_writer && has_line_reader {
        warnings.push(format!(
            "protocol mismatch on {}: length-prefixed binary writers coexist with line-based readers",
            channel
        ));
    }

    TraceIoReport {
        channel: channel.to_string(),
        writers,
        readers,
        warnings,
    }
}
