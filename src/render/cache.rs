// Render cache - memoized timeline states keyed by (origin, anchor, applied content)

use crate::history::log::OperationLog;
use crate::history::record::RecordId;
use crate::timeline::TimelineState;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

/// State a replay starts from, compared by identity
///
/// Holding the `Arc` keeps the allocation alive, so a pointer seen in a key is
/// never reused by another state while the entry exists.
#[derive(Debug, Clone)]
pub struct Origin(Arc<TimelineState>);

impl PartialEq for Origin {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Origin {}

impl Hash for Origin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

/// Identity of a render: the starting state (base or anchor snapshot) plus
/// the enabled content records replayed on top of it, in log order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub origin: Origin,
    pub anchor: Option<RecordId>,
    pub content: Vec<RecordId>,
}

impl CacheKey {
    pub fn new(origin: &Arc<TimelineState>, anchor: Option<RecordId>, content: &[RecordId]) -> Self {
        Self {
            origin: Origin(Arc::clone(origin)),
            anchor,
            content: content.to_vec(),
        }
    }
}

/// A memoized render result
#[derive(Debug, Clone)]
pub struct CachedRender {
    pub state: Arc<TimelineState>,
    pub orphaned: Vec<RecordId>,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Entry {
    value: CachedRender,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    tick: u64,
    hits: u64,
    misses: u64,
}

/// Bounded, least-recently-used render cache
///
/// Lookups return the longest cached prefix of the requested content list so
/// toggling a late record only replays the records after the change. Keys
/// carry their starting state, so one cache can serve several histories.
pub struct RenderCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl RenderCache {
    /// A cache holding at most `capacity` entries; 0 disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Entries are plain values, a panicked holder cannot leave them half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedRender> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Longest cached prefix of `content` replayed on `origin`
    ///
    /// Returns how many records of `content` the cached state already covers.
    pub fn longest_prefix(
        &self,
        origin: &Arc<TimelineState>,
        anchor: Option<RecordId>,
        content: &[RecordId],
    ) -> Option<(usize, CachedRender)> {
        if self.capacity == 0 {
            return None;
        }
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;
        let mut key = CacheKey::new(origin, anchor, content);
        loop {
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.last_used = tick;
                let value = entry.value.clone();
                let covered = key.content.len();
                inner.hits += 1;
                return Some((covered, value));
            }
            if key.content.pop().is_none() {
                inner.misses += 1;
                return None;
            }
        }
    }

    pub fn insert(&self, key: CacheKey, value: CachedRender) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        inner.tick += 1;
        let last_used = inner.tick;
        inner.entries.insert(key, Entry { value, last_used });

        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Evict entries that reference records no longer in `log`
    pub fn retain_reachable(&self, log: &OperationLog) {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| {
            let anchor_ok = key
                .anchor
                .is_none_or(|id| log.get(id).is_some_and(|r| r.is_structural()));
            anchor_ok && key.content.iter().all(|id| log.contains(*id))
        });
        let evicted = before - inner.entries.len();
        if evicted > 0 {
            log::debug!("Render cache evicted {} unreachable entries", evicted);
        }
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
