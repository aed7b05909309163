//! Flattens a batch of cache entries into atomic sub-lines and merges
//! translated sub-lines back into their parent entries.
//!
//! Sub-line keys are a zero-based running integer across the whole batch, so
//! the prompt payload stays a single flat mapping. Each sub-line keeps its
//! trailing line break, which makes an identity merge reconstruct every
//! source text exactly, embedded breaks included.

use crate::cache::CacheEntry;
use std::collections::HashMap;

/// One line-delimited fragment of an entry's source text. Ephemeral: lives
/// only for a single task invocation.
#[derive(Debug, Clone)]
pub struct SubLine {
    pub key: String,
    pub text: String,
    /// Index of the parent entry within the batch.
    pub parent: usize,
}

/// Ordered sub-lines for one batch, in ascending key order.
#[derive(Debug, Clone, Default)]
pub struct SubLineBatch {
    lines: Vec<SubLine>,
}

impl SubLineBatch {
    /// Split each entry's source text into sub-lines. A line with no trailing
    /// break is still emitted; an empty source yields no sub-lines.
    pub fn split(entries: &[&CacheEntry]) -> Self {
        let mut lines = Vec::new();
        let mut key = 0usize;
        for (parent, entry) in entries.iter().enumerate() {
            let src = entry.src();
            for piece in src.split_inclusive('\n') {
                lines.push(SubLine {
                    key: key.to_string(),
                    text: piece.to_string(),
                    parent,
                });
                key += 1;
            }
        }
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[SubLine] {
        &self.lines
    }

    /// Apply a text transform to every sub-line in place.
    pub fn map_text(&mut self, mut transform: impl FnMut(&str) -> String) {
        for line in &mut self.lines {
            line.text = transform(&line.text);
        }
    }

    /// Flat key -> text view, preserving sub-line order.
    pub fn source_pairs(&self) -> Vec<(String, String)> {
        self.lines
            .iter()
            .map(|line| (line.key.clone(), line.text.clone()))
            .collect()
    }

    /// Merge translated sub-lines back into the batch entries. Destination
    /// fragments concatenate in ascending sub-line key order; entries with no
    /// translated sub-line resolve to an empty string. Every entry ends up
    /// `TRANSLATED`, even when its merged text is empty.
    pub fn merge(&self, translations: &HashMap<String, String>, entries: &[&CacheEntry]) {
        let mut merged: Vec<String> = vec![String::new(); entries.len()];
        for line in &self.lines {
            if let Some(text) = translations.get(&line.key) {
                merged[line.parent].push_str(text);
            }
        }
        for (entry, text) in entries.iter().zip(merged) {
            entry.commit_translation(text);
        }
    }
}
