//! Sticky Session Store (C3, spec.md §4.2).
//!
//! A thread-safe, bounded-FIFO-per-session LRU of recently routed domains.
//! `remember` both appends to the session's history and refreshes its LRU
//! position; once the number of tracked sessions exceeds `max_sessions` the
//! least-recently-used session is evicted automatically. All operations are
//! O(1) amortized under a single mutex (spec.md §5 "Shared-resource policy").

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

struct Entry {
    history: VecDeque<String>,
}

pub struct StickySessionStore {
    history_size: usize,
    sessions: Mutex<LruCache<String, Entry>>,
}

impl StickySessionStore {
    pub fn new(history_size: usize, max_sessions: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions.max(1)).expect("max_sessions.max(1) is never zero");
        Self {
            history_size: history_size.max(1),
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Append `domain` to `session_key`'s history and refresh its LRU
    /// position. `LruCache::put` evicts the least-recently-used session on
    /// its own once the store is over capacity.
    pub fn remember(&self, session_key: &str, domain: &str) {
        let mut sessions = self.sessions.lock().expect("sticky session lock poisoned");

        if let Some(entry) = sessions.get_mut(session_key) {
            if entry.history.len() >= self.history_size {
                entry.history.pop_front();
            }
            entry.history.push_back(domain.to_string());
            return;
        }

        let mut history = VecDeque::with_capacity(self.history_size);
        history.push_back(domain.to_string());
        sessions.put(session_key.to_string(), Entry { history });
    }

    /// History in arrival order, oldest first. Also refreshes LRU position.
    pub fn recent(&self, session_key: &str) -> Vec<String> {
        let mut sessions = self.sessions.lock().expect("sticky session lock poisoned");
        match sessions.get(session_key) {
            Some(entry) => entry.history.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn latest(&self, session_key: &str) -> Option<String> {
        self.recent(session_key).into_iter().next_back()
    }

    pub fn reset(&self, session_key: &str) {
        let mut sessions = self.sessions.lock().expect("sticky session lock poisoned");
        sessions.pop(session_key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_and_recent_preserve_arrival_order() {
        let store = StickySessionStore::new(3, 4096);
        store.remember("s1", "health");
        store.remember("s1", "homelab");
        assert_eq!(store.recent("s1"), vec!["health", "homelab"]);
        assert_eq!(store.latest("s1"), Some("homelab".to_string()));
    }

    #[test]
    fn history_is_bounded_fifo() {
        let store = StickySessionStore::new(2, 4096);
        store.remember("s1", "a");
        store.remember("s1", "b");
        store.remember("s1", "c");
        assert_eq!(store.recent("s1"), vec!["b", "c"]);
    }

    #[test]
    fn reset_clears_session() {
        let store = StickySessionStore::new(3, 4096);
        store.remember("s1", "health");
        store.reset("s1");
        assert_eq!(store.recent("s1"), Vec::<String>::new());
        assert_eq!(store.latest("s1"), None);
    }

    #[test]
    fn evicts_least_recently_used_session_over_capacity() {
        let store = StickySessionStore::new(3, 2);
        store.remember("s1", "a");
        store.remember("s2", "a");
        store.remember("s3", "a"); // s1 should be evicted (least recently used)
        assert_eq!(store.len(), 2);
        assert_eq!(store.recent("s1"), Vec::<String>::new());
        assert_eq!(store.recent("s2"), vec!["a"]);
        assert_eq!(store.recent("s3"), vec!["a"]);
    }

    #[test]
    fn touching_a_session_protects_it_from_eviction() {
        let store = StickySessionStore::new(3, 2);
        store.remember("s1", "a");
        store.remember("s2", "a");
        // Touch s1 again so s2 becomes the least-recently-used.
        store.remember("s1", "b");
        store.remember("s3", "a");
        assert_eq!(store.recent("s1"), vec!["a", "b"]);
        assert_eq!(store.recent("s2"), Vec::<String>::new());
    }
}
