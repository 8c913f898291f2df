//! Keyed query results with freshness and request fencing.
//!
//! Every fetch takes a ticket from a single monotonic counter and records
//! it as its key's fence. A response is stored only while its ticket is
//! still the fence, so an older response can never overwrite a newer one.
//! Invalidation removes the entry along with its fence, which also voids
//! fetches that were already in flight when the mutation landed. Keys
//! holding no value are not kept around.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Proof that a fetch was issued. Only the latest ticket for a key may
/// store its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub enum Lookup<V> {
    Fresh(Arc<V>),
    /// Usable now, but older than the stale threshold.
    Stale(Arc<V>),
    Missing,
}

struct Cached<V> {
    value: Arc<V>,
    fetched_at: Instant,
}

struct Entry<V> {
    value: Option<Cached<V>>,
    fence: u64,
    refreshing: bool,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Entry {
            value: None,
            fence: 0,
            refreshing: false,
        }
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_ticket: u64,
}

impl<K, V> Inner<K, V> {
    fn issue(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

pub struct QueryCache<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    stale_after: Duration,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stale_after: self.stale_after,
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(stale_after: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_ticket: 0,
            })),
            stale_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup(&self, key: &K) -> Lookup<V> {
        let inner = self.lock();
        match inner.entries.get(key).and_then(|entry| entry.value.as_ref()) {
            Some(cached) if cached.fetched_at.elapsed() < self.stale_after => {
                Lookup::Fresh(Arc::clone(&cached.value))
            }
            Some(cached) => Lookup::Stale(Arc::clone(&cached.value)),
            None => Lookup::Missing,
        }
    }

    /// Issue a ticket for a fetch of `key`, superseding any fetch in flight.
    pub fn begin(&self, key: K) -> Ticket {
        let mut inner = self.lock();
        let ticket = inner.issue();
        inner.entries.entry(key).or_default().fence = ticket;
        Ticket(ticket)
    }

    /// Issue a ticket for a background refresh, unless one is already
    /// running for `key` or there is nothing cached to refresh.
    pub fn begin_refresh(&self, key: &K) -> Option<Ticket> {
        let mut inner = self.lock();
        let ticket = inner.next_ticket + 1;
        let entry = inner.entries.get_mut(key)?;
        if entry.refreshing || entry.value.is_none() {
            return None;
        }
        entry.refreshing = true;
        entry.fence = ticket;
        inner.next_ticket = ticket;
        Some(Ticket(ticket))
    }

    /// Store a fetched value. Returns false when the ticket was superseded
    /// and the value was discarded.
    pub fn complete(&self, key: &K, ticket: Ticket, value: Arc<V>) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        if entry.fence != ticket.0 {
            tracing::trace!(?key, ticket = ticket.0, fence = entry.fence, "discarding superseded response");
            return false;
        }
        entry.value = Some(Cached {
            value,
            fetched_at: Instant::now(),
        });
        entry.refreshing = false;
        true
    }

    /// A fetch failed; release the refresh slot if the ticket is current.
    /// A key that never got a value is forgotten.
    pub fn abandon(&self, key: &K, ticket: Ticket) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(key) else {
            return;
        };
        if entry.fence != ticket.0 {
            return;
        }
        if entry.value.is_some() {
            entry.refreshing = false;
        } else {
            inner.entries.remove(key);
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().entries.remove(key);
    }

    /// Drop every key. Filter predicates are evaluated server-side, so a
    /// mutation may affect any cached result.
    pub fn invalidate_all(&self) {
        self.lock().entries.clear();
    }

    pub fn is_cached(&self, key: &K) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_some())
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
