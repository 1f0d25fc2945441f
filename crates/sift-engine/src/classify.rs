//! Content type detection.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use sift_core::{ChunkStrategy, ContentHint, ContentItem};

/// Lines sampled when sniffing JSON Lines.
const JSONL_SAMPLE_LINES: usize = 5;

/// Share of non-blank lines ending in `;`, `{` or `}` that marks code.
const TERMINATOR_RATIO: f64 = 0.3;

static DOCUMENT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:!doctype\s+html|html|body)\b[^>]*>").unwrap());

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?(?:html|head|body|div|p|h[1-6]|section|article|main|nav|header|footer|aside",
        r"|table|thead|tbody|tr|td|th|ul|ol|li|span|a|script|style|meta|link|title|br|img",
        r"|form|input|pre|code|blockquote|em|strong)\b[^>]*>",
    ))
    .unwrap()
});

static DECLARATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^(?:(?:pub|export|public|private|protected|async|static|abstract|final)\s+)*",
        r"(?:fn|def|class|function|func|impl|struct|enum|trait|interface|import|package",
        r"|namespace|using)\b|^#include\b",
    ))
    .unwrap()
});

static BLOCK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:\{\s*$|^\s*\}|^\s*(?:def|class)\s.*:\s*$)").unwrap());

/// Pick the splitting strategy for a content item.
///
/// An explicit hint wins. Otherwise the body is sniffed for markup, then JSON,
/// then code; anything left is treated as prose.
pub fn classify(item: &ContentItem) -> ChunkStrategy {
    match item.hint() {
        ContentHint::Html => ChunkStrategy::Html,
        ContentHint::Text => ChunkStrategy::Text,
        ContentHint::Code => ChunkStrategy::Code,
        ContentHint::StructuredData => ChunkStrategy::StructuredData,
        ContentHint::Unknown => sniff(item.body()),
    }
}

fn sniff(body: &str) -> ChunkStrategy {
    if looks_like_html(body) {
        ChunkStrategy::Html
    } else if looks_like_json(body) {
        ChunkStrategy::StructuredData
    } else if looks_like_code(body) {
        ChunkStrategy::Code
    } else {
        ChunkStrategy::Text
    }
}

fn looks_like_html(body: &str) -> bool {
    DOCUMENT_TAG.is_match(body) || HTML_TAG.find_iter(body).take(2).count() == 2
}

fn looks_like_json(body: &str) -> bool {
    let trimmed = body.trim();
    if !trimmed.starts_with(['{', '[']) {
        return false;
    }
    if serde_json::from_str::<Value>(trimmed).is_ok() {
        return true;
    }
    let mut sampled = 0;
    for line in trimmed.lines().filter(|l| !l.trim().is_empty()) {
        if sampled == JSONL_SAMPLE_LINES {
            break;
        }
        if serde_json::from_str::<Value>(line.trim()).is_err() {
            return false;
        }
        sampled += 1;
    }
    sampled > 1
}

fn looks_like_code(body: &str) -> bool {
    if DECLARATION_LINE.is_match(body) && BLOCK_HEADER.is_match(body) {
        return true;
    }

    let mut lines = 0usize;
    let mut terminated = 0usize;
    for line in body.lines().map(str::trim_end).filter(|l| !l.trim().is_empty()) {
        lines += 1;
        if line.ends_with([';', '{', '}']) {
            terminated += 1;
        }
    }
    lines > 0 && terminated as f64 / lines as f64 >= TERMINATOR_RATIO
}
