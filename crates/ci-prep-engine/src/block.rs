//! Test-block tokenizer, extraction, and reassembly.
//!
//! # Grammar
//!
//! ```text
//! document  = preamble section*
//! section   = header line*            (up to the next header or EOF)
//! header    = "[" ... "]" EOL         (starts in column 0)
//! marker    = WS* "inputFile" WS* "=" ...
//! ```
//!
//! A section containing a marker line is a test block. The block spans the
//! header through the section's last non-blank line; trailing blank lines
//! stay in the residue so that `residue + blocks` always accounts for every
//! byte of the input. Interior blank lines and bracketed values
//! (`runtime_params = a[0]`) do not end a block because only column-0
//! headers do.

use std::ops::Range;

use serde::Serialize;

/// Key whose presence marks a section as a test.
pub const MARKER_KEY: &str = "inputFile";

// ---------------------------------------------------------------------------
// TestBlock
// ---------------------------------------------------------------------------

/// One test declaration, exactly as it appeared in the document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TestBlock {
    name: String,
    text: String,
}

impl TestBlock {
    /// Section name between the header brackets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    #[must_use]
    pub fn contains_all<S: AsRef<str>>(&self, needles: &[S]) -> bool {
        needles.iter().all(|n| self.contains(n.as_ref()))
    }

    #[must_use]
    pub fn contains_any<S: AsRef<str>>(&self, needles: &[S]) -> bool {
        needles.iter().any(|n| self.contains(n.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Result of carving test blocks out of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    /// Document with every test block removed.
    pub residue: String,
    /// Test blocks in document order.
    pub blocks: Vec<TestBlock>,
}

/// Split `text` into residue and test blocks.
#[must_use]
pub fn extract_blocks(text: &str) -> Extraction {
    let spans = block_spans(text);
    let mut residue = String::with_capacity(text.len());
    let mut blocks = Vec::with_capacity(spans.len());
    let mut cursor = 0;

    for (name, span) in spans {
        residue.push_str(&text[cursor..span.start]);
        blocks.push(TestBlock {
            name,
            text: text[span.clone()].to_owned(),
        });
        cursor = span.end;
    }
    residue.push_str(&text[cursor..]);

    tracing::debug!(blocks = blocks.len(), "extracted test blocks");
    Extraction { residue, blocks }
}

/// Append `blocks` to `residue`, one blank line before each block.
#[must_use]
pub fn reassemble(residue: &str, blocks: &[TestBlock]) -> String {
    let mut out = String::with_capacity(
        residue.len() + blocks.iter().map(|b| b.text.len() + 2).sum::<usize>() + 1,
    );
    out.push_str(residue);
    out.push('\n');
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&block.text);
        if !block.text.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

struct Line<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn lines(text: &str) -> Vec<Line<'_>> {
    let mut start = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let line = Line {
                start,
                end: start + raw.len(),
                text: raw,
            };
            start = line.end;
            line
        })
        .collect()
}

/// Section name if `line` is a column-0 header.
fn header_name(line: &str) -> Option<&str> {
    let content = line.trim_end();
    if !content.starts_with('[') || !content.ends_with(']') || content.len() < 2 {
        return None;
    }
    Some(&content[1..content.len() - 1])
}

fn is_marker(line: &str) -> bool {
    line.trim_start()
        .strip_prefix(MARKER_KEY)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Byte ranges (with section names) of every test block in `text`.
fn block_spans(text: &str) -> Vec<(String, Range<usize>)> {
    let lines = lines(text);
    let headers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| header_name(l.text).is_some())
        .map(|(i, _)| i)
        .collect();

    let mut spans = Vec::new();
    for (n, &head) in headers.iter().enumerate() {
        let next = headers.get(n + 1).copied().unwrap_or(lines.len());
        let body = &lines[head + 1..next];
        if !body.iter().any(|l| is_marker(l.text)) {
            continue;
        }
        let last = body
            .iter()
            .rposition(|l| !is_blank(l.text))
            .map_or(head, |p| head + 1 + p);
        let name = header_name(lines[head].text).unwrap_or_default().to_owned();
        spans.push((name, lines[head].start..lines[last].end));
    }
    spans
}
