//! Strategy splitters and the table that dispatches to them.
//!
//! Every splitter works on content already known to exceed the target size.
//! The shared rules (empty input, input within target, greedy packing and the
//! hard cut for pathological units) live here.

mod code;
mod html;
mod structured;
mod text;

pub use code::CodeSplitter;
pub use html::HtmlSplitter;
pub use structured::StructuredSplitter;
pub use text::TextSplitter;

use sift_core::{BoundaryKind, Chunk, ChunkStrategy};

/// A split piece before ordering metadata is stamped on.
pub type Piece = (String, BoundaryKind);

/// Size parameters shared by all splitters. Sizes are in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitConfig {
    pub target_chunk_size: usize,
    /// A unit longer than `target_chunk_size * hard_cut_factor` is cut.
    pub hard_cut_factor: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: 8_000,
            hard_cut_factor: 4,
        }
    }
}

impl SplitConfig {
    pub fn hard_cut_threshold(&self) -> usize {
        self.target_chunk_size
            .saturating_mul(self.hard_cut_factor.max(1))
    }
}

/// One strategy in the dispatch table.
pub trait Splitter: Send + Sync {
    fn strategy(&self) -> ChunkStrategy;

    /// Split content longer than the target into ordered pieces.
    fn split_oversized(&self, body: &str, config: &SplitConfig) -> Vec<Piece>;
}

static HTML: HtmlSplitter = HtmlSplitter;
static TEXT: TextSplitter = TextSplitter;
static CODE: CodeSplitter = CodeSplitter;
static STRUCTURED: StructuredSplitter = StructuredSplitter;

/// The strategy table.
pub fn splitter_for(strategy: ChunkStrategy) -> &'static dyn Splitter {
    match strategy {
        ChunkStrategy::Html => &HTML,
        ChunkStrategy::Text => &TEXT,
        ChunkStrategy::Code => &CODE,
        ChunkStrategy::StructuredData => &STRUCTURED,
    }
}

/// Split `body` with the given strategy and stamp indices and the final flag.
pub fn split(strategy: ChunkStrategy, body: &str, config: &SplitConfig) -> Vec<Chunk> {
    if body.is_empty() {
        return Vec::new();
    }
    if char_len(body) <= config.target_chunk_size {
        return Chunk::sequence(vec![(body.to_string(), BoundaryKind::Whole)]);
    }

    let pieces = splitter_for(strategy)
        .split_oversized(body, config)
        .into_iter()
        .filter(|(text, _)| !text.is_empty())
        .collect();
    Chunk::sequence(pieces)
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// An atomic structural unit awaiting packing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Unit {
    pub text: String,
    pub boundary: BoundaryKind,
}

impl Unit {
    pub fn new(text: impl Into<String>, boundary: BoundaryKind) -> Self {
        Self {
            text: text.into(),
            boundary,
        }
    }
}

/// Greedy in-order packing. A chunk ends on the boundary of its last unit.
///
/// Units over the target travel alone; units over the hard-cut threshold are
/// cut into `Fragment` pieces.
pub(crate) fn pack(units: Vec<Unit>, config: &SplitConfig) -> Vec<Piece> {
    let target = config.target_chunk_size.max(1);
    let hard = config.hard_cut_threshold();

    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut boundary = BoundaryKind::Fragment;

    for unit in units {
        let len = char_len(&unit.text);
        if len == 0 {
            continue;
        }

        if len > target {
            if !current.is_empty() {
                out.push((std::mem::take(&mut current), boundary));
                current_len = 0;
            }
            if len > hard {
                out.extend(
                    hard_cut(&unit.text, target)
                        .into_iter()
                        .map(|piece| (piece, BoundaryKind::Fragment)),
                );
            } else {
                out.push((unit.text, unit.boundary));
            }
            continue;
        }

        if current_len + len > target && !current.is_empty() {
            out.push((std::mem::take(&mut current), boundary));
            current_len = 0;
        }
        current.push_str(&unit.text);
        current_len += len;
        boundary = unit.boundary;
    }

    if !current.is_empty() {
        out.push((current, boundary));
    }
    out
}

/// Cut `text` into pieces of at most `target` chars, preferring to end each
/// piece just after a line break, then a tag end, then whitespace, searched in
/// the upper half of the window. Concatenating the pieces yields `text`.
pub(crate) fn hard_cut(text: &str, target: usize) -> Vec<String> {
    let target = target.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;

    while char_len(rest) > target {
        let cut = cut_point(rest, target);
        let (head, tail) = rest.split_at(cut);
        pieces.push(head.to_string());
        rest = tail;
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn cut_point(text: &str, target: usize) -> usize {
    let byte_at = |n: usize| text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
    let limit = byte_at(target);
    let window_start = byte_at(target / 2);
    let window = &text[window_start..limit];

    let breaks: [fn(char) -> bool; 3] = [|c| c == '\n', |c| c == '>', char::is_whitespace];
    for is_break in breaks {
        if let Some((pos, ch)) = window.char_indices().rev().find(|(_, c)| is_break(*c)) {
            return window_start + pos + ch.len_utf8();
        }
    }
    limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(target: usize) -> SplitConfig {
        SplitConfig {
            target_chunk_size: target,
            hard_cut_factor: 4,
        }
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        for strategy in ChunkStrategy::ALL {
            assert!(split(strategy, "", &cfg(100)).is_empty());
        }
    }

    #[test]
    fn small_content_yields_one_final_chunk() {
        for strategy in ChunkStrategy::ALL {
            let chunks = split(strategy, "tiny body", &cfg(100));
            assert_eq!(chunks.len(), 1);
            assert!(chunks[0].is_final);
            assert_eq!(chunks[0].boundary, BoundaryKind::Whole);
            assert_eq!(chunks[0].text, "tiny body");
        }
    }

    #[test]
    fn table_dispatches_by_strategy() {
        for strategy in ChunkStrategy::ALL {
            assert_eq!(splitter_for(strategy).strategy(), strategy);
        }
    }

    #[test]
    fn pack_is_greedy_and_keeps_order() {
        let units = vec![
            Unit::new("aaaa", BoundaryKind::Paragraph),
            Unit::new("bbbb", BoundaryKind::Paragraph),
            Unit::new("cc", BoundaryKind::Sentence),
            Unit::new("dddd", BoundaryKind::Paragraph),
        ];
        let pieces = pack(units, &cfg(10));
        assert_eq!(
            pieces,
            vec![
                ("aaaabbbbcc".to_string(), BoundaryKind::Sentence),
                ("dddd".to_string(), BoundaryKind::Paragraph),
            ]
        );
    }

    #[test]
    fn oversized_unit_travels_alone_and_whole() {
        let big = "x".repeat(25);
        let units = vec![
            Unit::new("ab", BoundaryKind::Paragraph),
            Unit::new(big.clone(), BoundaryKind::Declaration),
            Unit::new("cd", BoundaryKind::Paragraph),
        ];
        let pieces = pack(units, &cfg(10));
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1], (big, BoundaryKind::Declaration));
    }

    #[test]
    fn pathological_unit_is_cut_into_fragments() {
        let huge = "word ".repeat(20); // 100 chars, threshold is 40
        let pieces = pack(vec![Unit::new(huge.clone(), BoundaryKind::Paragraph)], &cfg(10));
        assert!(pieces.len() >= 10);
        assert!(pieces.iter().all(|(_, b)| *b == BoundaryKind::Fragment));
        assert!(pieces.iter().all(|(t, _)| char_len(t) <= 10));
        let joined: String = pieces.into_iter().map(|(t, _)| t).collect();
        assert_eq!(joined, huge);
    }

    #[test]
    fn hard_cut_prefers_line_breaks() {
        let text = "abcdefg\nhijklmnop";
        let pieces = hard_cut(text, 10);
        assert_eq!(pieces[0], "abcdefg\n");
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn hard_cut_falls_back_to_char_boundary() {
        let text = "é".repeat(25);
        let pieces = hard_cut(&text, 10);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| char_len(p) <= 10));
        assert_eq!(pieces.concat(), text);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn hard_cut_is_lossless(text in "\\PC{0,300}", target in 1usize..40) {
                let pieces = hard_cut(&text, target);
                prop_assert_eq!(pieces.concat(), text);
                prop_assert!(pieces.iter().all(|p| char_len(p) <= target));
            }

            #[test]
            fn indices_contiguous_with_single_final(
                text in "[a-z .\n]{0,600}",
                target in 5usize..80,
            ) {
                for strategy in ChunkStrategy::ALL {
                    let chunks = split(strategy, &text, &cfg(target));
                    for (i, chunk) in chunks.iter().enumerate() {
                        prop_assert_eq!(chunk.index, i);
                        prop_assert_eq!(chunk.is_final, i + 1 == chunks.len());
                    }
                }
            }

            #[test]
            fn splitting_is_idempotent(text in "[a-z{}();\n .]{0,600}", target in 5usize..80) {
                for strategy in ChunkStrategy::ALL {
                    prop_assert_eq!(
                        split(strategy, &text, &cfg(target)),
                        split(strategy, &text, &cfg(target))
                    );
                }
            }
        }
    }
}
