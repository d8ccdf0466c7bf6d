use super::id::new_id;
use super::schema::{Extraction, FileSummary, UploadedFile};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct IndexState {
    files: HashMap<String, UploadedFile>,
    extractions: HashMap<String, Extraction>,
    /// Ids in insertion order; drives `list`.
    order: Vec<String>,
    /// Every id ever handed out, including deleted ones.
    issued: HashSet<String>,
}

/// In-memory upload index. Metadata and extraction entries share one lock so
/// readers never observe one without the other.
#[derive(Debug, Default)]
pub struct UploadIndex {
    state: RwLock<IndexState>,
}

impl UploadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id that has never been issued by this index.
    pub fn reserve_id(&self) -> String {
        self.reserve_with(new_id)
    }

    fn reserve_with(&self, mut generate: impl FnMut() -> String) -> String {
        let mut state = self.state.write();
        loop {
            let id = generate();
            if state.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Record a persisted upload and its extraction entry in one update,
    /// returning the summary as recorded.
    pub fn insert(&self, file: UploadedFile, extraction: Option<Extraction>) -> FileSummary {
        let summary = summarize(&file, extraction.is_some());
        let mut state = self.state.write();
        let id = file.id.clone();
        state.issued.insert(id.clone());
        if let Some(extraction) = extraction {
            state.extractions.insert(id.clone(), extraction);
        }
        if state.files.insert(id.clone(), file).is_none() {
            state.order.push(id);
        }
        summary
    }

    /// Metadata and extraction for `id`, cloned out of the lock.
    pub fn get(&self, id: &str) -> Option<(UploadedFile, Option<Extraction>)> {
        let state = self.state.read();
        let file = state.files.get(id)?.clone();
        Some((file, state.extractions.get(id).cloned()))
    }

    pub fn list(&self) -> Vec<FileSummary> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.files.get(id))
            .map(|file| summarize(file, state.extractions.contains_key(&file.id)))
            .collect()
    }

    /// Remove both entries for `id`, returning what was there.
    pub fn remove(&self, id: &str) -> Option<(UploadedFile, Option<Extraction>)> {
        let mut state = self.state.write();
        let file = state.files.remove(id)?;
        let extraction = state.extractions.remove(id);
        state.order.retain(|entry| entry != id);
        Some((file, extraction))
    }

    pub fn len(&self) -> usize {
        self.state.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn summarize(file: &UploadedFile, has_extraction: bool) -> FileSummary {
    FileSummary {
        id: file.id.clone(),
        name: file.original_name.clone(),
        size: file.size_bytes,
        uploaded_at: file.uploaded_at,
        has_extraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::schema::ExtractionError;
    use chrono::Utc;
    use std::path::PathBuf;

    fn file(id: &str, name: &str) -> UploadedFile {
        UploadedFile {
            id: id.to_string(),
            storage_path: PathBuf::from(format!("/tmp/{id}_{name}")),
            original_name: name.to_string(),
            uploaded_at: Utc::now(),
            size_bytes: 3,
        }
    }

    #[test]
    fn list_follows_insertion_order() {
        let index = UploadIndex::new();
        index.insert(file("b", "two.txt"), None);
        index.insert(file("a", "one.html"), Some(Extraction::Failed(ExtractionError {
            message: "bad".into(),
        })));
        index.insert(file("c", "three.txt"), None);

        let ids: Vec<String> = index.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert!(index.list()[1].has_extraction);
        assert!(!index.list()[0].has_extraction);
    }

    #[test]
    fn insert_returns_the_recorded_summary() {
        let index = UploadIndex::new();
        let recorded = index.insert(file("a", "one.html"), Some(Extraction::Failed(ExtractionError {
            message: "bad".into(),
        })));
        assert_eq!(recorded.name, "one.html");
        assert!(recorded.has_extraction);
        assert_eq!(index.list(), [recorded]);
    }

    #[test]
    fn remove_drops_both_entries() {
        let index = UploadIndex::new();
        index.insert(file("a", "one.html"), Some(Extraction::Failed(ExtractionError {
            message: "bad".into(),
        })));
        let (removed, extraction) = index.remove("a").expect("entry");
        assert_eq!(removed.id, "a");
        assert!(extraction.is_some());
        assert!(index.get("a").is_none());
        assert!(index.remove("a").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn reserved_ids_are_never_reissued() {
        let index = UploadIndex::new();
        index.insert(file("dup", "x.txt"), None);
        index.remove("dup");

        let mut candidates = vec!["fresh".to_string(), "dup".to_string()];
        let id = index.reserve_with(|| candidates.pop().unwrap());
        assert_eq!(id, "fresh");
    }
}
