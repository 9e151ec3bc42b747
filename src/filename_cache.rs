//! The path cache (§4.3): canonical path to filename entry, with sticky
//! negative results.

use crate::buffer::DataBuffer;
use std::collections::HashMap;
use std::sync::Arc;

enum Status {
    /// The controller has said `error` for this path before; never asked again.
    Negative,
    Bound(Arc<DataBuffer>),
}

pub enum Lookup {
    Missing,
    Negative,
    Positive(Arc<DataBuffer>),
}

#[derive(Default)]
pub struct FilenameCache {
    entries: HashMap<String, Status>,
}

impl FilenameCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn lookup(&self, path: &str) -> Lookup {
        match self.entries.get(path) {
            None => Lookup::Missing,
            Some(Status::Negative) => Lookup::Negative,
            Some(Status::Bound(buf)) => Lookup::Positive(Arc::clone(buf)),
        }
    }

    pub fn insert_negative(&mut self, path: String) {
        self.entries.insert(path, Status::Negative);
    }

    pub fn insert_positive(&mut self, path: String, buffer: Arc<DataBuffer>) {
        self.entries.insert(path, Status::Bound(buffer));
    }

    pub fn remove(&mut self, path: &str) {
        self.entries.remove(path);
    }

    /// Number of entries with positive (bound-to-buffer) status — the
    /// left-hand side of the §8 "live buffers equals positive entries"
    /// invariant.
    pub fn positive_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| matches!(s, Status::Bound(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_reports_missing() {
        let cache = FilenameCache::new();
        assert!(matches!(cache.lookup("/tmp/x"), Lookup::Missing));
    }

    #[test]
    fn negative_entry_is_sticky() {
        let mut cache = FilenameCache::new();
        cache.insert_negative("/tmp/y".into());
        assert!(matches!(cache.lookup("/tmp/y"), Lookup::Negative));
        // A second lookup still reports negative without needing the
        // caller to re-contact the controller (§4.3).
        assert!(matches!(cache.lookup("/tmp/y"), Lookup::Negative));
    }

    #[test]
    fn positive_entry_returns_the_shared_buffer() {
        let mut cache = FilenameCache::new();
        let buf = DataBuffer::new(b"0123456789".to_vec(), Some("/tmp/x".into()));
        cache.insert_positive("/tmp/x".into(), Arc::clone(&buf));
        match cache.lookup("/tmp/x") {
            Lookup::Positive(b) => assert_eq!(b.as_slice(), b"0123456789"),
            _ => panic!("expected positive lookup"),
        }
        assert_eq!(cache.positive_count(), 1);
    }

    #[test]
    fn removing_an_entry_drops_its_reference() {
        let mut cache = FilenameCache::new();
        let buf = DataBuffer::new(b"x".to_vec(), Some("/tmp/z".into()));
        cache.insert_positive("/tmp/z".into(), Arc::clone(&buf));
        assert_eq!(crate::buffer::refcount(&buf), 2);
        cache.remove("/tmp/z");
        assert_eq!(crate::buffer::refcount(&buf), 1);
        assert_eq!(cache.positive_count(), 0);
    }
}
