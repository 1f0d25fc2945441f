//! The running summary threaded from one chunk to the next.

use serde::Serialize;

use crate::split::{char_len, hard_cut};

/// One block of the summary: a folded chunk response or a condensation of
/// several of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub label: String,
    pub text: String,
    /// Chunk responses this entry stands for.
    pub parts: usize,
}

impl ContextEntry {
    fn render(&self) -> String {
        format!("[{}]\n{}", self.label, self.text)
    }
}

/// Accumulated findings from the chunks processed so far.
///
/// Owned by a single run and moved through each step; every transition
/// consumes the old value and returns the new one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CarriedContext {
    entries: Vec<ContextEntry>,
    /// Chunk responses dropped by trimming.
    omitted: usize,
    folded: usize,
    skipped: Vec<usize>,
    compactions: usize,
    /// Label of the most recently folded chunk.
    #[serde(skip)]
    through: Option<String>,
}

const ENTRY_SEPARATOR: &str = "\n\n";

impl CarriedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The summary text handed to the next prompt.
    pub fn summary(&self) -> String {
        let note = (self.omitted > 0).then(|| {
            format!(
                "[earlier parts]\n{} earlier part summaries omitted",
                self.omitted
            )
        });
        note.into_iter()
            .chain(self.entries.iter().map(ContextEntry::render))
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR)
    }

    /// Length of [`Self::summary`] in characters.
    pub fn summary_len(&self) -> usize {
        self.summary().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.omitted == 0
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Chunks whose response was folded in.
    pub fn folded(&self) -> usize {
        self.folded
    }

    /// Indices of chunks whose invocation failed, ascending.
    pub fn skipped(&self) -> &[usize] {
        &self.skipped
    }

    pub fn compactions(&self) -> usize {
        self.compactions
    }

    /// Append the response for chunk `index` of `total`.
    pub fn fold(mut self, index: usize, total: usize, response: &str) -> Self {
        let label = format!("part {} of {}", index + 1, total);
        self.through = Some(label.clone());
        self.entries.push(ContextEntry {
            label,
            text: response.trim().to_string(),
            parts: 1,
        });
        self.folded += 1;
        self
    }

    /// Record a failed chunk. The summary is unchanged.
    pub fn skip(mut self, index: usize) -> Self {
        self.skipped.push(index);
        self
    }

    /// Replace all entries with a model-written condensation.
    pub fn condense(mut self, condensed: &str) -> Self {
        let label = match &self.through {
            Some(through) => format!("notes through {through}"),
            None => "notes".to_string(),
        };
        let parts = self.entries.iter().map(|e| e.parts).sum();
        self.entries = vec![ContextEntry {
            label,
            text: condensed.trim().to_string(),
            parts,
        }];
        self.compactions += 1;
        self
    }

    /// Drop the oldest entries until the summary fits in `budget` characters.
    /// Dropped entries are counted in a leading note. The newest entry is
    /// never dropped while any of its text fits; it is cut down instead.
    pub fn compact_deterministic(mut self, budget: usize) -> Self {
        self.compactions += 1;
        while self.summary_len() > budget && self.entries.len() > 1 {
            let dropped = self.entries.remove(0);
            self.omitted += dropped.parts;
        }
        if self.summary_len() > budget {
            self.truncate_newest(budget);
        }
        self
    }

    /// Cut the last entry's text to the room left under `budget`. The
    /// omitted note goes first when it leaves no room at all.
    fn truncate_newest(&mut self, budget: usize) {
        let Some(text_len) = self.entries.last().map(|e| char_len(&e.text)) else {
            self.omitted = 0;
            return;
        };

        let mut room = budget.saturating_sub(self.summary_len() - text_len);
        if room == 0 && self.omitted > 0 {
            self.omitted = 0;
            room = budget.saturating_sub(self.summary_len() - text_len);
        }

        if room == 0 {
            self.entries.pop();
            return;
        }
        if let Some(last) = self.entries.last_mut() {
            last.text = hard_cut(&last.text, room)
                .into_iter()
                .next()
                .unwrap_or_default();
        }
    }
}
