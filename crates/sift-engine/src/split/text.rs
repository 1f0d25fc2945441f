use std::sync::LazyLock;

use regex::Regex;

use sift_core::{BoundaryKind, ChunkStrategy};

use super::{char_len, pack, Piece, SplitConfig, Splitter, Unit};

/// A blank line (possibly holding spaces or tabs) plus any whitespace after it.
/// Line ends may be `\n` or `\r\n`.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t\r]*\n\s*").unwrap());

/// Terminal punctuation, optional closing quotes or brackets, then whitespace.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]+["'”’)\]]*\s+"#).unwrap());

/// Paragraphs first, sentences for paragraphs over the target.
pub struct TextSplitter;

impl Splitter for TextSplitter {
    fn strategy(&self) -> ChunkStrategy {
        ChunkStrategy::Text
    }

    fn split_oversized(&self, body: &str, config: &SplitConfig) -> Vec<Piece> {
        pack(text_units(body, config.target_chunk_size), config)
    }
}

/// Units for plain text: paragraphs, with over-target paragraphs broken into
/// sentences. The units cover `body` exactly.
pub(crate) fn text_units(body: &str, target: usize) -> Vec<Unit> {
    let mut units = Vec::new();
    for paragraph in paragraphs(body) {
        if char_len(paragraph) > target {
            units.extend(
                sentences(paragraph)
                    .into_iter()
                    .map(|s| Unit::new(s, BoundaryKind::Sentence)),
            );
        } else {
            units.push(Unit::new(paragraph, BoundaryKind::Paragraph));
        }
    }
    units
}

/// Split into paragraphs; each keeps its trailing separator.
pub(crate) fn paragraphs(body: &str) -> Vec<&str> {
    split_after(body, &PARAGRAPH_BREAK)
}

fn sentences(paragraph: &str) -> Vec<&str> {
    split_after(paragraph, &SENTENCE_END)
}

fn split_after<'a>(text: &'a str, pattern: &Regex) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for m in pattern.find_iter(text) {
        if m.end() > start {
            parts.push(&text[start..m.end()]);
            start = m.end();
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}
