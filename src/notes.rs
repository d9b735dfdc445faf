//! Per-domain operator notes
//!
//! Short free-text annotations attached to domains, stored in their own
//! file. Notes are cosmetic: the proxy never reads them, so mutations here
//! fire no reload signal.

use crate::store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Maximum note length in characters, applied after trimming.
pub const MAX_NOTE_LEN: usize = 16;

/// Shape of the notes file: a flat domain -> annotation map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotesFile {
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

/// Domain -> annotation table.
///
/// Stored values are always trimmed and at most [`MAX_NOTE_LEN`]
/// characters. An empty note means "no annotation" and is represented by
/// key absence, never by an empty string.
pub struct NoteTable {
    store: DocumentStore<NotesFile>,
}

impl NoteTable {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            store: DocumentStore::open(path),
        }
    }

    /// All notes, keyed by domain.
    pub fn notes(&self) -> BTreeMap<String, String> {
        self.store.current().notes.clone()
    }

    /// Set or clear the note for `domain`.
    ///
    /// The text is trimmed, then truncated to the first [`MAX_NOTE_LEN`]
    /// characters. If nothing remains the entry is deleted instead of
    /// stored empty. Persists unconditionally, including the delete path.
    pub fn set_note(&self, domain: &str, text: &str) -> Result<(), StoreError> {
        let trimmed: String = text.trim().chars().take(MAX_NOTE_LEN).collect();
        self.store.mutate(|state| {
            let mut next = state.clone();
            if trimmed.is_empty() {
                next.notes.remove(domain);
            } else {
                next.notes.insert(domain.to_string(), trimmed);
            }
            next
        })
    }

    /// Delete the note for `domain` if present; no-op (no write) if absent.
    pub fn remove_note(&self, domain: &str) -> Result<(), StoreError> {
        self.store
            .update(|state| {
                if !state.notes.contains_key(domain) {
                    return None;
                }
                let mut next = state.clone();
                next.notes.remove(domain);
                Some(next)
            })
            .map(|_| ())
    }
}
