//! In-memory note collection backed by a durable [`Gateway`].
//!
//! The repository is the only writer of the notes namespace. Every mutation
//! is written durably first and only then applied to the in-memory list, so
//! a failed write never leaves memory ahead of storage.
//!
//! The collection lock is never held across an `.await`. Mutations apply
//! their result to whatever the collection looks like once the write has
//! completed, which makes concurrent edits of one note last-write-wins. A
//! write that lands after the note was removed is undone instead of bringing
//! the note back.
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, error, info, trace, warn};

use crate::{
    normalize_tag, Gateway, LoadReport, Namespace, Note, NotesError, RepositoryState, Result,
};

struct Collection {
    state: RepositoryState,
    /// Most recently updated first
    notes: Vec<Note>,
}

/// Owns the in-memory notes and mediates every change through the gateway.
pub struct NoteRepository {
    gateway: Arc<dyn Gateway>,
    collection: Mutex<Collection>,
}

impl NoteRepository {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            collection: Mutex::new(Collection {
                state: RepositoryState::Uninitialized,
                notes: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collection>> {
        self.collection
            .lock()
            .map_err(|_| NotesError::storage("note collection lock poisoned"))
    }

    /// Locks the collection, refusing access until the first load finished.
    fn ready(&self) -> Result<MutexGuard<'_, Collection>> {
        let guard = self.lock()?;
        if guard.state != RepositoryState::Ready {
            debug!("Rejecting access while repository is {:?}", guard.state);
            return Err(NotesError::NotReady);
        }
        Ok(guard)
    }

    pub fn state(&self) -> RepositoryState {
        self.lock()
            .map(|c| c.state)
            .unwrap_or(RepositoryState::Uninitialized)
    }

    /// Populates the collection from storage, newest first.
    ///
    /// Never fails: a storage error is logged, leaves the collection empty and
    /// is reported in the returned [`LoadReport`].
    ///
    /// Loading happens once, at startup. Later calls report the current count
    /// and leave the collection alone.
    pub async fn load(&self) -> LoadReport {
        match self.lock() {
            Ok(mut c) if c.state == RepositoryState::Uninitialized => {
                c.state = RepositoryState::Loading;
            }
            Ok(c) => {
                debug!("Repository already {:?}, not loading again", c.state);
                return LoadReport {
                    loaded: c.notes.len(),
                    error: None,
                };
            }
            Err(e) => {
                error!("Could not start loading notes: {}", e);
                return LoadReport {
                    loaded: 0,
                    error: Some(e.to_string()),
                };
            }
        }
        info!("Loading notes from storage");

        let (mut notes, failure) = match self.gateway.list_all(Namespace::Notes).await {
            Ok(records) => {
                let mut notes = Vec::with_capacity(records.len());
                for record in records {
                    match serde_json::from_value::<Note>(record) {
                        Ok(mut note) => {
                            note.normalize();
                            notes.push(note);
                        }
                        Err(e) => warn!("Skipping malformed note record: {}", e),
                    }
                }
                (notes, None)
            }
            Err(e) => {
                error!("Failed to load notes, starting empty: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        sort_newest_first(&mut notes);
        let loaded = notes.len();

        match self.lock() {
            Ok(mut c) => {
                c.notes = notes;
                c.state = RepositoryState::Ready;
            }
            Err(e) => {
                error!("Could not publish loaded notes: {}", e);
                return LoadReport {
                    loaded: 0,
                    error: Some(e.to_string()),
                };
            }
        }

        info!("Loaded {} notes", loaded);
        LoadReport {
            loaded,
            error: failure,
        }
    }

    /// Inserts or fully replaces the note with the same id.
    ///
    /// Tags are normalized and `updated_at` is clamped to `created_at` before
    /// writing. Returns `StorageFailure` without touching memory if the
    /// durable write does not succeed, and `NoteNotFound` if the note was
    /// removed while the write was pending.
    pub async fn save(&self, note: Note) -> Result<()> {
        let id = note.id.clone();
        if self.commit(note).await? {
            Ok(())
        } else {
            Err(NotesError::NoteNotFound { id })
        }
    }

    /// Writes the note durably, then applies it to the collection as it is
    /// once the write has completed.
    ///
    /// Returns false if the note existed when the write started but was
    /// removed before it finished. The stray durable record is deleted again
    /// in that case.
    async fn commit(&self, mut note: Note) -> Result<bool> {
        note.normalize();
        let existed = self.ready()?.notes.iter().any(|n| n.id == note.id);
        debug!("Saving note: {}", note.id);

        let record = serde_json::to_value(&note)?;
        if let Err(e) = self.gateway.put(Namespace::Notes, &note.id, record).await {
            error!("Durable write of note {} failed: {}", note.id, e);
            return Err(e);
        }

        {
            let mut c = self.lock()?;
            match c.notes.iter().position(|n| n.id == note.id) {
                Some(index) => {
                    trace!("Replacing note {} in memory", note.id);
                    c.notes[index] = note;
                    sort_newest_first(&mut c.notes);
                    return Ok(true);
                }
                None if !existed => {
                    trace!("Adding note {} to memory", note.id);
                    c.notes.insert(0, note);
                    sort_newest_first(&mut c.notes);
                    return Ok(true);
                }
                None => {}
            }
        }

        warn!("Note {} was deleted while being saved, discarding the write", note.id);
        self.gateway.delete(Namespace::Notes, &note.id).await.map_err(|e| {
            error!("Could not discard stale record of note {}: {}", note.id, e);
            e
        })?;
        Ok(false)
    }

    /// Deletes a note durably and from memory.
    ///
    /// Returns whether a note was removed; an unknown id is not an error.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let known = self.ready()?.notes.iter().any(|n| n.id == id);
        if !known {
            debug!("Delete of unknown note {} ignored", id);
            return Ok(false);
        }

        self.gateway.delete(Namespace::Notes, id).await.map_err(|e| {
            error!("Durable delete of note {} failed: {}", id, e);
            e
        })?;

        let mut c = self.lock()?;
        let before = c.notes.len();
        c.notes.retain(|n| n.id != id);
        info!("Deleted note: {}", id);
        Ok(c.notes.len() != before)
    }

    /// Flips the favorite flag of a note and saves it.
    ///
    /// Returns the updated note, or `None` (logged) if the id is unknown or
    /// the note was removed before the change was written.
    pub async fn toggle_favorite(&self, id: &str) -> Result<Option<Note>> {
        let current = self.ready()?.notes.iter().find(|n| n.id == id).cloned();
        let Some(mut note) = current else {
            warn!("Cannot toggle favorite of unknown note {}", id);
            return Ok(None);
        };

        note.is_favorite = !note.is_favorite;
        if self.commit(note.clone()).await? {
            Ok(Some(note))
        } else {
            warn!("Note {} was deleted before its favorite flag was saved", id);
            Ok(None)
        }
    }

    /// Notes matching both the text search and the tag filter, newest first.
    ///
    /// Blank `search_text` and an empty `tag_filter` each match everything.
    /// Text matches are case-insensitive substrings of the title, the plain
    /// text of the content, or the speaker. A note passes the tag filter if it
    /// carries any of the given tags.
    pub fn query(&self, search_text: &str, tag_filter: &[String]) -> Result<Vec<Note>> {
        let needle = search_text.trim().to_lowercase();
        let wanted: Vec<String> = tag_filter.iter().filter_map(|t| normalize_tag(t)).collect();

        let c = self.ready()?;
        let matches = c
            .notes
            .iter()
            .filter(|note| needle.is_empty() || matches_text(note, &needle))
            .filter(|note| wanted.is_empty() || note.tags.iter().any(|t| wanted.contains(t)))
            .cloned()
            .collect::<Vec<_>>();

        trace!(
            "Query {:?} with {} tags matched {} of {} notes",
            search_text,
            wanted.len(),
            matches.len(),
            c.notes.len()
        );
        Ok(matches)
    }

    /// Every tag used by any note, without duplicates
    pub fn distinct_tags(&self) -> Result<BTreeSet<String>> {
        let c = self.ready()?;
        Ok(c.notes.iter().flat_map(|n| n.tags.iter().cloned()).collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.ready()?.notes.iter().find(|n| n.id == id).cloned())
    }

    /// All notes, newest first
    pub fn all(&self) -> Result<Vec<Note>> {
        Ok(self.ready()?.notes.clone())
    }

    pub fn favorites(&self) -> Result<Vec<Note>> {
        let c = self.ready()?;
        Ok(c.notes.iter().filter(|n| n.is_favorite).cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.ready()?.notes.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn matches_text(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle)
        || note.plain_text().to_lowercase().contains(needle)
        || note.ustadz.to_lowercase().contains(needle)
}

// Stable, so notes with equal timestamps keep their relative order
fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::Value;

    use super::*;
    use crate::{FileStore, MemoryStore};

    /// Wraps a memory store and fails on demand
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    #[async_trait]
    impl Gateway for FlakyStore {
        async fn put(&self, namespace: Namespace, key: &str, record: Value) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(NotesError::storage("quota exceeded"));
            }
            self.inner.put(namespace, key, record).await
        }

        async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
            self.inner.get(namespace, key).await
        }

        async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(NotesError::storage("storage disabled"));
            }
            self.inner.delete(namespace, key).await
        }

        async fn list_all(&self, namespace: Namespace) -> Result<Vec<Value>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(NotesError::storage("storage unavailable"));
            }
            self.inner.list_all(namespace).await
        }
    }

    /// Memory store whose writes suspend before they land, so that
    /// concurrent mutations interleave the way they do on a real disk
    #[derive(Default)]
    struct YieldingStore {
        inner: MemoryStore,
        put_yields: AtomicUsize,
        delete_yields: AtomicUsize,
        /// Extra suspensions for puts of the record with this title
        slow_title: Mutex<Option<(String, usize)>>,
    }

    impl YieldingStore {
        fn new(put_yields: usize, delete_yields: usize) -> Self {
            Self {
                put_yields: AtomicUsize::new(put_yields),
                delete_yields: AtomicUsize::new(delete_yields),
                ..Self::default()
            }
        }

        fn slow_down(&self, title: &str, extra: usize) {
            *self.slow_title.lock().unwrap() = Some((title.to_string(), extra));
        }

        fn extra_yields(&self, record: &Value) -> usize {
            let title = record.get("title").and_then(Value::as_str);
            match self.slow_title.lock().unwrap().as_ref() {
                Some((slow, extra)) if title == Some(slow.as_str()) => *extra,
                _ => 0,
            }
        }

        async fn stored(&self, id: &str) -> Option<Note> {
            self.inner
                .get(Namespace::Notes, id)
                .await
                .unwrap()
                .map(|v| serde_json::from_value(v).unwrap())
        }
    }

    async fn pause(times: usize) {
        for _ in 0..times {
            tokio::task::yield_now().await;
        }
    }

    #[async_trait]
    impl Gateway for YieldingStore {
        async fn put(&self, namespace: Namespace, key: &str, record: Value) -> Result<()> {
            let yields = self.put_yields.load(Ordering::SeqCst) + self.extra_yields(&record);
            pause(yields).await;
            self.inner.put(namespace, key, record).await
        }

        async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
            self.inner.get(namespace, key).await
        }

        async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
            pause(self.delete_yields.load(Ordering::SeqCst)).await;
            self.inner.delete(namespace, key).await
        }

        async fn list_all(&self, namespace: Namespace) -> Result<Vec<Value>> {
            self.inner.list_all(namespace).await
        }
    }

    async fn yielding_repo(
        put_yields: usize,
        delete_yields: usize,
    ) -> (Arc<YieldingStore>, NoteRepository) {
        let store = Arc::new(YieldingStore::new(put_yields, delete_yields));
        let repo = NoteRepository::new(store.clone());
        repo.load().await;
        (store, repo)
    }

    fn note_at(title: &str, minutes_ago: i64, tags: &[&str]) -> Note {
        let mut note = Note::new(title, "Ustadz Abdul", format!("<p>{title} body</p>"));
        note.created_at = Utc::now() - Duration::minutes(minutes_ago);
        note.updated_at = note.created_at;
        note.with_tags(tags.iter().copied())
    }

    async fn ready_repo() -> (Arc<FlakyStore>, NoteRepository) {
        let store = Arc::new(FlakyStore::default());
        let repo = NoteRepository::new(store.clone());
        repo.load().await;
        (store, repo)
    }

    #[tokio::test]
    async fn test_operations_rejected_before_load() {
        let repo = NoteRepository::new(Arc::new(MemoryStore::new()));
        assert_eq!(repo.state(), RepositoryState::Uninitialized);
        assert!(matches!(repo.query("", &[]), Err(NotesError::NotReady)));
        assert!(matches!(repo.distinct_tags(), Err(NotesError::NotReady)));
        assert!(matches!(
            repo.save(Note::new("t", "", "")).await,
            Err(NotesError::NotReady)
        ));
        assert!(matches!(repo.remove("x").await, Err(NotesError::NotReady)));
        assert!(matches!(
            repo.toggle_favorite("x").await,
            Err(NotesError::NotReady)
        ));

        repo.load().await;
        assert_eq!(repo.state(), RepositoryState::Ready);
        assert!(repo.query("", &[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let note = Note::new("Sabar", "Ustadz Budi", "<p>Patience</p>").with_tags(["akhlaq"]);

        let repo = NoteRepository::new(Arc::new(FileStore::new(dir.path())));
        repo.load().await;
        repo.save(note.clone()).await.unwrap();

        let reopened = NoteRepository::new(Arc::new(FileStore::new(dir.path())));
        let report = reopened.load().await;
        assert_eq!(report, LoadReport { loaded: 1, error: None });
        assert_eq!(reopened.get(&note.id).unwrap(), Some(note));
    }

    #[tokio::test]
    async fn test_save_existing_id_replaces_whole_note() {
        let (store, repo) = ready_repo().await;
        let original = Note::new("Old title", "Ustadz A", "<p>old</p>").with_tags(["fiqh", "sirah"]);
        repo.save(original.clone()).await.unwrap();

        let mut replacement = original.clone();
        replacement.title = "New title".to_string();
        replacement.tags = Vec::new();
        replacement.content = String::new();
        replacement.touch();
        repo.save(replacement.clone()).await.unwrap();

        assert_eq!(repo.len().unwrap(), 1);
        assert_eq!(repo.get(&original.id).unwrap(), Some(replacement.clone()));

        let stored = store.get(Namespace::Notes, &original.id).await.unwrap().unwrap();
        let stored: Note = serde_json::from_value(stored).unwrap();
        assert!(stored.tags.is_empty());
        assert_eq!(stored.title, "New title");
    }

    #[tokio::test]
    async fn test_load_orders_newest_first() {
        let store = Arc::new(MemoryStore::new());
        for (title, age) in [("middle", 10), ("oldest", 30), ("newest", 1)] {
            let note = note_at(title, age, &[]);
            store
                .put(Namespace::Notes, &note.id, serde_json::to_value(&note).unwrap())
                .await
                .unwrap();
        }

        let repo = NoteRepository::new(store);
        repo.load().await;
        let titles: Vec<String> = repo.query("", &[]).unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_new_note_is_prepended() {
        let (_, repo) = ready_repo().await;
        repo.save(note_at("older", 5, &[])).await.unwrap();
        repo.save(Note::new("fresh", "", "")).await.unwrap();

        assert_eq!(repo.all().unwrap()[0].title, "fresh");
    }

    #[tokio::test]
    async fn test_load_failure_is_soft() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let repo = NoteRepository::new(store);

        let report = repo.load().await;
        assert_eq!(report.loaded, 0);
        assert!(report.error.unwrap().contains("storage unavailable"));
        assert_eq!(repo.state(), RepositoryState::Ready);
        assert!(repo.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let (store, repo) = ready_repo().await;
        let note = Note::new("Kept", "", "<p>v1</p>");
        repo.save(note.clone()).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);

        let mut edited = note.clone();
        edited.title = "Lost".to_string();
        let err = repo.save(edited).await.unwrap_err();
        assert!(err.is_storage_failure());

        let err = repo.save(Note::new("Never stored", "", "")).await.unwrap_err();
        assert!(err.is_storage_failure());

        assert!(repo.remove(&note.id).await.unwrap_err().is_storage_failure());
        assert!(repo.toggle_favorite(&note.id).await.unwrap_err().is_storage_failure());

        assert_eq!(repo.all().unwrap(), vec![note]);
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, repo) = ready_repo().await;
        let note = Note::new("Gone", "", "");
        repo.save(note.clone()).await.unwrap();

        assert!(repo.remove(&note.id).await.unwrap());
        assert!(repo.is_empty().unwrap());
        assert_eq!(store.get(Namespace::Notes, &note.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_noop() {
        let (_, repo) = ready_repo().await;
        repo.save(Note::new("Stays", "", "")).await.unwrap();
        let before = repo.all().unwrap();

        assert!(!repo.remove("note-does-not-exist").await.unwrap());
        assert!(!repo.remove("../weird").await.unwrap());
        assert_eq!(repo.all().unwrap(), before);
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let (store, repo) = ready_repo().await;
        let note = Note::new("Fav", "", "");
        repo.save(note.clone()).await.unwrap();

        let toggled = repo.toggle_favorite(&note.id).await.unwrap().unwrap();
        assert!(toggled.is_favorite);
        assert_eq!(repo.favorites().unwrap().len(), 1);

        let stored: Note =
            serde_json::from_value(store.get(Namespace::Notes, &note.id).await.unwrap().unwrap())
                .unwrap();
        assert!(stored.is_favorite);

        let toggled = repo.toggle_favorite(&note.id).await.unwrap().unwrap();
        assert!(!toggled.is_favorite);
        assert!(repo.favorites().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_favorite_unknown_id() {
        let (_, repo) = ready_repo().await;
        assert_eq!(repo.toggle_favorite("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_saves_last_write_wins() {
        for slow in ["First", "Second"] {
            let (store, repo) = yielding_repo(1, 1).await;
            let note = Note::new("Draft", "", "");
            repo.save(note.clone()).await.unwrap();
            store.slow_down(slow, 3);

            let mut first = note.clone();
            first.title = "First".to_string();
            let mut second = note.clone();
            second.title = "Second".to_string();

            let (a, b) = tokio::join!(repo.save(first), repo.save(second));
            a.unwrap();
            b.unwrap();

            // the write that lands last is what both memory and disk hold
            assert_eq!(repo.len().unwrap(), 1);
            assert_eq!(repo.get(&note.id).unwrap().unwrap().title, slow);
            assert_eq!(store.stored(&note.id).await.unwrap().title, slow);
        }
    }

    #[tokio::test]
    async fn test_toggle_racing_remove_does_not_resurrect() {
        // remove lands first, then the favorite write
        let (store, repo) = yielding_repo(3, 1).await;
        let note = Note::new("Short lived", "", "");
        repo.save(note.clone()).await.unwrap();

        let (toggled, removed) = tokio::join!(repo.toggle_favorite(&note.id), repo.remove(&note.id));
        assert_eq!(toggled.unwrap(), None);
        assert!(removed.unwrap());
        assert_eq!(repo.get(&note.id).unwrap(), None);
        assert_eq!(store.stored(&note.id).await, None);

        // favorite write lands first, then the remove
        let (store, repo) = yielding_repo(1, 3).await;
        let note = Note::new("Short lived", "", "");
        repo.save(note.clone()).await.unwrap();

        let (toggled, removed) = tokio::join!(repo.toggle_favorite(&note.id), repo.remove(&note.id));
        assert!(toggled.unwrap().unwrap().is_favorite);
        assert!(removed.unwrap());
        assert_eq!(repo.get(&note.id).unwrap(), None);
        assert_eq!(store.stored(&note.id).await, None);
    }

    #[tokio::test]
    async fn test_edit_racing_remove_reports_missing_note() {
        let (store, repo) = yielding_repo(3, 1).await;
        let note = Note::new("Draft", "", "");
        repo.save(note.clone()).await.unwrap();

        let mut edited = note.clone();
        edited.title = "Edited".to_string();
        edited.touch();

        let (saved, removed) = tokio::join!(repo.save(edited), repo.remove(&note.id));
        assert!(matches!(saved, Err(NotesError::NoteNotFound { .. })));
        assert!(removed.unwrap());
        assert!(repo.is_empty().unwrap());
        assert_eq!(store.stored(&note.id).await, None);
    }

    #[tokio::test]
    async fn test_interleaved_mutations_keep_memory_and_disk_in_step() {
        let (store, repo) = yielding_repo(2, 1).await;
        let kept = Note::new("Kept", "", "");
        let dropped = Note::new("Dropped", "", "");
        repo.save(kept.clone()).await.unwrap();
        repo.save(dropped.clone()).await.unwrap();

        let fresh = Note::new("Fresh", "", "");
        let (saved, removed, toggled) = tokio::join!(
            repo.save(fresh.clone()),
            repo.remove(&dropped.id),
            repo.toggle_favorite(&kept.id)
        );
        saved.unwrap();
        assert!(removed.unwrap());
        assert!(toggled.unwrap().unwrap().is_favorite);

        let mut in_memory: Vec<String> = repo.all().unwrap().into_iter().map(|n| n.id).collect();
        let mut on_disk: Vec<String> = store
            .list_all(Namespace::Notes)
            .await
            .unwrap()
            .into_iter()
            .map(|v| serde_json::from_value::<Note>(v).unwrap().id)
            .collect();
        in_memory.sort();
        on_disk.sort();
        assert_eq!(in_memory, on_disk);
        assert!(!in_memory.contains(&dropped.id));
        assert!(store.stored(&kept.id).await.unwrap().is_favorite);
    }

    #[tokio::test]
    async fn test_save_normalizes_tags_and_timestamps() {
        let (store, repo) = ready_repo().await;
        let mut note = Note::new("Wudu", "", "");
        note.tags = vec!["Fiqh".to_string(), "fiqh".to_string()];
        note.updated_at = note.created_at - Duration::days(1);
        repo.save(note.clone()).await.unwrap();

        let saved = repo.get(&note.id).unwrap().unwrap();
        assert_eq!(saved.tags, vec!["fiqh"]);
        assert!(saved.updated_at >= saved.created_at);
        assert_eq!(repo.distinct_tags().unwrap().len(), 1);
        assert_eq!(repo.query("", &["FIQH".to_string()]).unwrap().len(), 1);

        let stored: Note =
            serde_json::from_value(store.get(Namespace::Notes, &note.id).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn test_load_normalizes_stored_records() {
        let store = Arc::new(MemoryStore::new());
        let mut note = Note::new("Imported", "", "");
        note.tags = vec!["Sirah".to_string(), "SIRAH".to_string(), "Tafsir".to_string()];
        note.updated_at = note.created_at - Duration::hours(2);
        store
            .put(Namespace::Notes, &note.id, serde_json::to_value(&note).unwrap())
            .await
            .unwrap();

        let repo = NoteRepository::new(store);
        repo.load().await;
        let loaded = repo.get(&note.id).unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["sirah", "tafsir"]);
        assert_eq!(loaded.updated_at, loaded.created_at);
    }

    #[tokio::test]
    async fn test_second_load_keeps_collection() {
        let (store, repo) = ready_repo().await;
        let note = Note::new("Saved after startup", "", "");
        repo.save(note.clone()).await.unwrap();

        let outsider = Note::new("Written behind our back", "", "");
        store
            .put(Namespace::Notes, &outsider.id, serde_json::to_value(&outsider).unwrap())
            .await
            .unwrap();

        let report = repo.load().await;
        assert_eq!(report, LoadReport { loaded: 1, error: None });
        assert_eq!(repo.all().unwrap(), vec![note]);
    }

    #[tokio::test]
    async fn test_query_predicate() {
        let (_, repo) = ready_repo().await;
        let notes = vec![
            note_at("Tafsir Al-Kahf", 1, &["tafsir"]),
            note_at("Fiqh of prayer", 2, &["fiqh", "salah"]),
            {
                let mut n = note_at("Sirah", 3, &["sirah"]);
                n.ustadz = "Ustadz Khalid".to_string();
                n
            },
            {
                let mut n = note_at("Misc", 4, &[]);
                n.content = "<p>On <b>Patience</b> and gratitude</p>".to_string();
                n
            },
        ];
        for note in &notes {
            repo.save(note.clone()).await.unwrap();
        }

        let titles = |text: &str, tags: &[&str]| -> Vec<String> {
            let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
            repo.query(text, &tags)
                .unwrap()
                .into_iter()
                .map(|n| n.title)
                .collect()
        };

        assert_eq!(titles("", &[]).len(), 4);
        assert_eq!(titles("KAHF", &[]), vec!["Tafsir Al-Kahf"]);
        assert_eq!(titles("khalid", &[]), vec!["Sirah"]);
        // markup is not searchable, the text between it is
        assert_eq!(titles("patience and", &[]), vec!["Misc"]);
        assert!(titles("<b>", &[]).is_empty());
        assert_eq!(titles("", &["salah", "sirah"]), vec!["Fiqh of prayer", "Sirah"]);
        assert_eq!(titles("ustadz", &["TAFSIR"]), vec!["Tafsir Al-Kahf"]);
        assert!(titles("kahf", &["fiqh"]).is_empty());

        // every excluded note fails at least one side of the predicate
        let all = repo.all().unwrap();
        let hits = repo.query("prayer", &["fiqh".to_string()]).unwrap();
        for note in all.iter().filter(|n| !hits.contains(n)) {
            let text_ok = matches_text(note, "prayer");
            let tag_ok = note.tags.iter().any(|t| t == "fiqh");
            assert!(!(text_ok && tag_ok));
        }
    }

    #[tokio::test]
    async fn test_query_does_not_mutate_collection() {
        let (_, repo) = ready_repo().await;
        repo.save(note_at("a", 1, &["x"])).await.unwrap();
        repo.save(note_at("b", 2, &["y"])).await.unwrap();
        let before = repo.all().unwrap();

        repo.query("a", &["x".to_string()]).unwrap();
        assert_eq!(repo.all().unwrap(), before);
    }

    #[tokio::test]
    async fn test_distinct_tags() {
        let (_, repo) = ready_repo().await;
        repo.save(note_at("one", 1, &["a", "b"])).await.unwrap();
        repo.save(note_at("two", 2, &["b", "c"])).await.unwrap();

        let tags = repo.distinct_tags().unwrap();
        let expected: BTreeSet<String> = ["a", "b", "c"].iter().map(|t| t.to_string()).collect();
        assert_eq!(tags, expected);
    }
}
