//! Shared run state passed to every translation task.
//!
//! The run status flag and the token-count memo are process-wide by nature,
//! but both live inside an explicitly constructed [`RunContext`] that callers
//! inject into each task, instead of hidden globals. Status writes come from
//! the driving scheduler; in-flight tasks only poll it as a cooperative
//! cancellation signal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide scheduler status, polled by tasks before issuing remote work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Idle,
    ApiTest,
    Translating,
    Stopping,
}

#[derive(Debug)]
pub struct RunContext {
    status: Mutex<RunStatus>,
    // Source text -> token count. Lazily populated, never evicted; recomputing
    // on a lost race is cheap and idempotent, so one coarse lock is enough.
    token_counts: Mutex<HashMap<String, usize>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(RunStatus::Idle),
            token_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().expect("run status lock poisoned")
    }

    pub fn set_status(&self, status: RunStatus) {
        *self.status.lock().expect("run status lock poisoned") = status;
    }

    pub fn is_stopping(&self) -> bool {
        self.status() == RunStatus::Stopping
    }

    /// Memoized token count for a source string, shared across all entries
    /// with identical text.
    pub fn token_count(&self, text: &str) -> usize {
        let mut memo = self.token_counts.lock().expect("token memo lock poisoned");
        if let Some(count) = memo.get(text) {
            return *count;
        }
        let count = estimate_tokens(text);
        memo.insert(text.to_string(), count);
        count
    }

    #[cfg(test)]
    pub(crate) fn memo_len(&self) -> usize {
        self.token_counts.lock().expect("token memo lock poisoned").len()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic token estimate used for batch budgeting.
///
/// CJK code points tokenize at roughly one token per character with common
/// BPE vocabularies; everything else averages around four characters per
/// token. The exact figure only feeds scheduling heuristics, never the wire.
pub fn estimate_tokens(text: &str) -> usize {
    let mut cjk = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if is_cjk(c) {
            cjk += 1;
        } else {
            other += 1;
        }
    }
    cjk + other.div_ceil(4)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF      // hiragana, katakana
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified
        | 0xAC00..=0xD7AF    // hangul syllables
        | 0xF900..=0xFAFF    // CJK compatibility
        | 0xFF66..=0xFF9F)   // halfwidth katakana
}
