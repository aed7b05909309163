//! Thread-safe cache entry for one translatable line of a source file.
//!
//! An entry is the unit of concurrent-safe mutation: the scheduler hands
//! disjoint batches of entries to worker tasks, and every field read or write
//! goes through the entry's own lock. The lock mostly protects against
//! concurrent readers such as a UI refresh, since batch partitioning already
//! keeps writers apart.

use crate::context::RunContext;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Kind of source file the line was extracted from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    /// Plain text, one line per entry.
    Txt,
    /// Tag-markup export (Translator++ project).
    Tpp,
    /// Key-value JSON export (MTool).
    Mtool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationStatus {
    Untranslated,
    Translating,
    Translated,
    Excluded,
}

/// Serializable view of an entry, used by the persistence and UI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub file_path: String,
    pub row: usize,
    pub file_type: FileType,
    pub src: String,
    pub dst: String,
    pub status: TranslationStatus,
}

#[derive(Debug)]
struct EntryState {
    src: String,
    dst: String,
    status: TranslationStatus,
}

#[derive(Debug)]
pub struct CacheEntry {
    file_path: String,
    row: usize,
    file_type: FileType,
    state: Mutex<EntryState>,
}

impl CacheEntry {
    pub fn new(
        file_path: impl Into<String>,
        row: usize,
        file_type: FileType,
        src: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            row,
            file_type,
            state: Mutex::new(EntryState {
                src: src.into(),
                dst: String::new(),
                status: TranslationStatus::Untranslated,
            }),
        }
    }

    /// Rehydrate an entry from a persisted snapshot.
    pub fn from_snapshot(snapshot: EntrySnapshot) -> Self {
        Self {
            file_path: snapshot.file_path,
            row: snapshot.row,
            file_type: snapshot.file_type,
            state: Mutex::new(EntryState {
                src: snapshot.src,
                dst: snapshot.dst,
                status: snapshot.status,
            }),
        }
    }

    // Identity fields never change after construction, so they can be read
    // without taking the state lock.

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn src(&self) -> String {
        self.state.lock().expect("entry lock poisoned").src.clone()
    }

    pub fn set_src(&self, src: impl Into<String>) {
        self.state.lock().expect("entry lock poisoned").src = src.into();
    }

    pub fn dst(&self) -> String {
        self.state.lock().expect("entry lock poisoned").dst.clone()
    }

    pub fn set_dst(&self, dst: impl Into<String>) {
        self.state.lock().expect("entry lock poisoned").dst = dst.into();
    }

    pub fn status(&self) -> TranslationStatus {
        self.state.lock().expect("entry lock poisoned").status
    }

    pub fn set_status(&self, status: TranslationStatus) {
        self.state.lock().expect("entry lock poisoned").status = status;
    }

    /// Commit a finished translation: destination text is only ever written
    /// together with the `Translated` status.
    pub fn commit_translation(&self, dst: impl Into<String>) {
        let mut state = self.state.lock().expect("entry lock poisoned");
        state.dst = dst.into();
        state.status = TranslationStatus::Translated;
    }

    /// Memoized token count of the current source text.
    pub fn token_count(&self, context: &RunContext) -> usize {
        let src = self.src();
        context.token_count(&src)
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        let state = self.state.lock().expect("entry lock poisoned");
        EntrySnapshot {
            file_path: self.file_path.clone(),
            row: self.row,
            file_type: self.file_type,
            src: state.src.clone(),
            dst: state.dst.clone(),
            status: state.status,
        }
    }
}
