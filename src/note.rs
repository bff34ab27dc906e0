//! The lecture note record.
//!
//! Notes are stored whole: every save replaces the durable record, so the
//! struct here is exactly the on-disk shape.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{normalize_tag, strip_markup};

/// Represents a single lecture note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier for the note
    pub id: String,
    /// Note title
    pub title: String,
    /// Name of the lecturer
    pub ustadz: String,
    /// Calendar date of the lecture (YYYY-MM-DD)
    pub date: String,
    /// Rich-text body as a markup string
    pub content: String,
    /// Lowercase tags, unique, in the order they were added
    pub tags: Vec<String>,
    pub is_favorite: bool,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note dated today with no tags
    pub fn new(title: impl Into<String>, ustadz: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Note {
            id: Self::generate_id(now),
            title: title.into(),
            ustadz: ustadz.into(),
            date: now.format("%Y-%m-%d").to_string(),
            content: content.into(),
            tags: Vec::new(),
            is_favorite: false,
            created_at: now,
            updated_at: now,
        }
    }

    // Timestamp keeps ids roughly sortable, the suffix keeps them unique
    // when two notes are created within the same millisecond.
    fn generate_id(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("note-{}-{}", now.timestamp_millis(), &suffix[..8])
    }

    /// Builder-style tag assignment; tags are normalized and deduplicated.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.add_tag(tag.as_ref());
        }
        self
    }

    /// Adds a tag, returning false if it was empty or already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        match normalize_tag(tag) {
            Some(tag) if !self.tags.contains(&tag) => {
                self.tags.push(tag);
                true
            }
            _ => false,
        }
    }

    /// Removes a tag, returning whether it was present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        let before = self.tags.len();
        self.tags.retain(|t| *t != tag);
        self.tags.len() != before
    }

    /// Marks the note as modified now
    pub fn touch(&mut self) {
        let now = Utc::now();
        // clock skew must never put updated_at before created_at
        self.updated_at = if now < self.created_at {
            self.created_at
        } else {
            now
        };
    }

    /// Restores the record invariants on a note built or decoded elsewhere:
    /// tags lowercase and unique, `updated_at` never before `created_at`.
    pub fn normalize(&mut self) {
        let tags = std::mem::take(&mut self.tags);
        for tag in &tags {
            self.add_tag(tag);
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }

    /// Content with markup removed, as used for searching
    pub fn plain_text(&self) -> String {
        strip_markup(&self.content)
    }

    /// Short plain-text excerpt of the content for list views
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.plain_text();
        let text = text.trim();
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}
