use serde::{Deserialize, Serialize};

/// The structural unit a chunk ends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Heading-delimited or sectioning-element group of HTML nodes.
    Section,
    /// HTML nodes not introduced by a heading or sectioning element.
    Element,
    Paragraph,
    Sentence,
    /// Top-level function/class/block definition.
    Declaration,
    Line,
    ArrayElement,
    ObjectMember,
    /// One JSON Lines record.
    Record,
    /// Forced cut, or a structural piece that does not re-parse on its own.
    Fragment,
    /// Content that fits in a single chunk.
    Whole,
}

/// A contiguous, ordered slice of a content item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub boundary: BoundaryKind,
    pub is_final: bool,
}

impl Chunk {
    /// Stamp ordering metadata onto split pieces: contiguous indices from 0
    /// and `is_final` on the last piece only.
    pub fn sequence(pieces: Vec<(String, BoundaryKind)>) -> Vec<Chunk> {
        let last = pieces.len().saturating_sub(1);
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, (text, boundary))| Chunk {
                index,
                text,
                boundary,
                is_final: index == last,
            })
            .collect()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_stamps_contiguous_indices() {
        let chunks = Chunk::sequence(vec![
            ("a".into(), BoundaryKind::Paragraph),
            ("b".into(), BoundaryKind::Paragraph),
            ("c".into(), BoundaryKind::Sentence),
        ]);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(chunks.iter().filter(|c| c.is_final).count(), 1);
        assert!(chunks[2].is_final);
    }

    #[test]
    fn sequence_of_nothing_is_empty() {
        assert!(Chunk::sequence(Vec::new()).is_empty());
    }

    #[test]
    fn single_piece_is_final() {
        let chunks = Chunk::sequence(vec![("only".into(), BoundaryKind::Whole)]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_final);
        assert_eq!(chunks[0].char_len(), 4);
    }
}
