//! In-memory task and result store
//!
//! Owns the four keyed stores and the active-task marker set. The
//! orchestrator keeps it behind a single mutex; every method here is a plain
//! synchronous operation so the lock is never held across an `.await`.

use marginalia_domain::{AnalysisRecord, BookId, BookRecord, TaskKey, TaskSnapshot, TaskStatus};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Fetch tasks, book cache, analysis tasks, analysis cache and active markers
#[derive(Debug, Default)]
pub struct TaskStore {
    fetch_tasks: HashMap<BookId, TaskSnapshot>,
    books: HashMap<BookId, Arc<BookRecord>>,
    analysis_tasks: HashMap<BookId, TaskSnapshot>,
    analyses: HashMap<BookId, Arc<AnalysisRecord>>,
    active: BTreeSet<TaskKey>,
}

impl TaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest fetch snapshot for a book
    pub fn fetch_task(&self, id: &BookId) -> Option<&TaskSnapshot> {
        self.fetch_tasks.get(id)
    }

    /// Replace the fetch snapshot for a book
    pub fn set_fetch_task(&mut self, id: &BookId, snapshot: TaskSnapshot) {
        self.fetch_tasks.insert(id.clone(), snapshot);
    }

    /// Status of the fetch task for a book, if one exists
    pub fn fetch_status(&self, id: &BookId) -> Option<TaskStatus> {
        self.fetch_tasks.get(id).map(|snapshot| snapshot.status)
    }

    /// Fetched book, if published
    pub fn book(&self, id: &BookId) -> Option<Arc<BookRecord>> {
        self.books.get(id).cloned()
    }

    /// Publish a fetched book
    ///
    /// A record is published once; a second publication for the same book
    /// keeps the first.
    pub fn publish_book(&mut self, id: &BookId, record: Arc<BookRecord>) {
        self.books.entry(id.clone()).or_insert(record);
    }

    /// Latest analysis snapshot for a book
    pub fn analysis_task(&self, id: &BookId) -> Option<&TaskSnapshot> {
        self.analysis_tasks.get(id)
    }

    /// Replace the analysis snapshot for a book
    pub fn set_analysis_task(&mut self, id: &BookId, snapshot: TaskSnapshot) {
        self.analysis_tasks.insert(id.clone(), snapshot);
    }

    /// Status of the analysis task for a book, if one exists
    pub fn analysis_status(&self, id: &BookId) -> Option<TaskStatus> {
        self.analysis_tasks.get(id).map(|snapshot| snapshot.status)
    }

    /// Completed analysis, if published
    pub fn analysis(&self, id: &BookId) -> Option<Arc<AnalysisRecord>> {
        self.analyses.get(id).cloned()
    }

    /// Publish a completed analysis; the first publication wins
    pub fn publish_analysis(&mut self, id: &BookId, record: Arc<AnalysisRecord>) {
        self.analyses.entry(id.clone()).or_insert(record);
    }

    /// Mark a task as having a running worker
    ///
    /// Returns `false` if it was already marked, in which case no new worker
    /// may be scheduled.
    pub fn activate(&mut self, key: TaskKey) -> bool {
        self.active.insert(key)
    }

    /// Clear a task's active marker
    pub fn release(&mut self, key: &TaskKey) {
        self.active.remove(key);
    }

    /// Whether a task has a running worker
    pub fn is_active(&self, key: &TaskKey) -> bool {
        self.active.contains(key)
    }

    /// Every active marker, in key order
    pub fn active_keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.active.iter()
    }

    /// Number of active markers
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of fetch snapshots held
    pub fn fetch_task_count(&self) -> usize {
        self.fetch_tasks.len()
    }

    /// Number of analysis snapshots held
    pub fn analysis_task_count(&self) -> usize {
        self.analysis_tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginalia_domain::BookMetadata;

    fn id(raw: &str) -> BookId {
        BookId::parse(raw).unwrap()
    }

    #[test]
    fn test_activate_is_check_and_set() {
        let mut store = TaskStore::new();
        let key = TaskKey::Fetch(id("42"));

        assert!(store.activate(key.clone()));
        assert!(!store.activate(key.clone()));
        assert_eq!(store.active_count(), 1);

        store.release(&key);
        assert!(!store.is_active(&key));
        assert!(store.activate(key));
    }

    #[test]
    fn test_fetch_and_analysis_markers_are_distinct() {
        let mut store = TaskStore::new();
        assert!(store.activate(TaskKey::Fetch(id("7"))));
        assert!(store.activate(TaskKey::Analysis(id("7"))));

        let names: Vec<String> = store.active_keys().map(ToString::to_string).collect();
        assert_eq!(names, vec!["book_fetch_7", "analysis_7"]);
    }

    #[test]
    fn test_snapshots_are_replaced_wholesale() {
        let mut store = TaskStore::new();
        let book = id("1");

        store.set_fetch_task(&book, TaskSnapshot::processing(10, "metadata_fetch", "a"));
        store.set_fetch_task(&book, TaskSnapshot::failed("boom"));

        let snapshot = store.fetch_task(&book).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot.stage.is_none());
        assert_eq!(store.fetch_status(&book), Some(TaskStatus::Error));
        assert_eq!(store.fetch_task_count(), 1);
    }

    #[test]
    fn test_first_publication_wins() {
        let mut store = TaskStore::new();
        let book = id("1");
        let first = Arc::new(BookRecord::new(BookMetadata::unknown(book.clone()), "first".into()));
        let second = Arc::new(BookRecord::new(BookMetadata::unknown(book.clone()), "second".into()));

        store.publish_book(&book, first);
        store.publish_book(&book, second);
        assert_eq!(store.book(&book).unwrap().full_content, "first");

        store.publish_analysis(&book, Arc::new(AnalysisRecord::default()));
        assert!(store.analysis(&book).is_some());
        assert!(store.analysis(&id("2")).is_none());
    }
}
