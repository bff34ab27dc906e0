//! Shared data structures for the kajian-notes application.
//!
//! Storage namespaces, repository lifecycle, and the reference records
//! returned by the citation and verse lookups.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::NotesError;

/// A specialized Result type for kajian-notes operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Logical partition inside the local durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Notes,
    Settings,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Notes => "notes",
            Namespace::Settings => "settings",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the note repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Uninitialized,
    Loading,
    Ready,
}

/// Outcome of loading notes from storage.
///
/// Loading fails soft: a storage error leaves the repository empty but ready,
/// and the error text is reported here instead of being raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of notes now held in memory
    pub loaded: usize,
    /// Storage error encountered while loading, if any
    pub error: Option<String>,
}

/// A bundled saying with source and attribution metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hadith {
    pub id: String,
    /// Original-language text
    pub text: String,
    pub translation: String,
    /// Source collection, e.g. "Sahih Bukhari"
    pub book: String,
    /// Chapter or topic label
    pub chapter: String,
    pub narrator: String,
    /// Authenticity grade
    pub grade: String,
}

/// Chapter metadata attached to a verse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurahRef {
    pub number: u32,
    pub name: String,
    pub english_name: String,
}

/// A scripture verse resolved on demand from the reference provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    /// Global verse number across the whole text
    pub number: u32,
    /// Original-language text
    pub text: String,
    pub translation: String,
    pub surah: SurahRef,
    pub number_in_surah: u32,
}

/// One entry of the provider's chapter listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInfo {
    pub number: u32,
    pub name: String,
    pub english_name: String,
    #[serde(default)]
    pub english_name_translation: String,
    #[serde(default)]
    pub number_of_ayahs: u32,
    #[serde(default)]
    pub revelation_type: String,
}
