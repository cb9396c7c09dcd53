//! Time-bounded cache over the expensive scans, kept honest by change events.
//!
//! Three partitions: the collections list, one summary list per collection,
//! and one image list per `(collection, content id)`. Readers get `Arc`
//! handles; nothing here ever fails. A stale entry is a miss but stays in the
//! map until it is overwritten or invalidated.

use domain::setting::CacheSettings;
use domain::{ChangeEvent, Collection, ContentSummary, ImageRef};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
pub const WATCHED_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CacheEntry<T> {
    data: Arc<T>,
    stored_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data: Arc::new(data),
            stored_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<Arc<T>> {
        (self.stored_at.elapsed() < ttl).then(|| Arc::clone(&self.data))
    }
}

type ImageKey = (String, String);

/// Generation of a partition, taken when a read misses.
///
/// A fill carrying an older ticket than the partition's current generation
/// raced an invalidation and is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
struct Partition<K, T> {
    generation: u64,
    entries: HashMap<K, CacheEntry<T>>,
}

impl<K: Eq + Hash, T> Partition<K, T> {
    fn new() -> Self {
        Self {
            generation: 0,
            entries: HashMap::new(),
        }
    }

    fn get(&self, key: &K, ttl: Duration) -> Option<Arc<T>> {
        self.entries.get(key).and_then(|e| e.fresh(ttl))
    }

    fn put(&mut self, key: K, data: T) -> Arc<T> {
        let entry = CacheEntry::new(data);
        let handle = Arc::clone(&entry.data);
        self.entries.insert(key, entry);
        handle
    }

    fn fill(&mut self, key: K, data: T, ticket: Ticket) -> Arc<T> {
        if ticket.0 == self.generation {
            return self.put(key, data);
        }
        debug!("cache: dropped a fill that raced an invalidation");
        Arc::new(data)
    }

    fn remove(&mut self, key: &K) {
        self.entries.remove(key);
        self.generation += 1;
    }

    fn retain(&mut self, keep: impl FnMut(&K, &mut CacheEntry<T>) -> bool) {
        self.entries.retain(keep);
        self.generation += 1;
    }
}

#[derive(Debug)]
pub struct CollectionCache {
    ttl: Duration,
    watched_ttl: Duration,
    watchers: AtomicUsize,
    collections: Mutex<Partition<(), Vec<Collection>>>,
    content: Mutex<Partition<String, Vec<ContentSummary>>>,
    images: Mutex<Partition<ImageKey, Vec<ImageRef>>>,
}

impl Default for CollectionCache {
    fn default() -> Self {
        Self::with_ttls(DEFAULT_TTL, WATCHED_TTL)
    }
}

impl CollectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttls(ttl: Duration, watched_ttl: Duration) -> Self {
        Self {
            ttl,
            watched_ttl,
            watchers: AtomicUsize::new(0),
            collections: Mutex::new(Partition::new()),
            content: Mutex::new(Partition::new()),
            images: Mutex::new(Partition::new()),
        }
    }

    pub fn from_settings(s: &CacheSettings) -> Self {
        Self::with_ttls(
            Duration::from_secs(s.ttl_secs),
            Duration::from_secs(s.watched_ttl_secs),
        )
    }

    // ---------- TTL policy ----------

    /// A watcher now reports changes; entries may live longer.
    pub fn attach_watcher(&self) {
        self.watchers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn detach_watcher(&self) {
        let _ = self
            .watchers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn has_watcher(&self) -> bool {
        self.watchers.load(Ordering::SeqCst) > 0
    }

    pub fn ttl(&self) -> Duration {
        if self.has_watcher() {
            self.watched_ttl
        } else {
            self.ttl
        }
    }

    // ---------- collections ----------

    pub fn get_collections(&self) -> Option<Arc<Vec<Collection>>> {
        self.collections.lock().get(&(), self.ttl())
    }

    pub fn collections_ticket(&self) -> Ticket {
        Ticket(self.collections.lock().generation)
    }

    pub fn set_collections(&self, data: Vec<Collection>) -> Arc<Vec<Collection>> {
        self.collections.lock().put((), data)
    }

    /// Store a scan started at `ticket` unless an invalidation came since.
    pub fn fill_collections(&self, ticket: Ticket, data: Vec<Collection>) -> Arc<Vec<Collection>> {
        self.collections.lock().fill((), data, ticket)
    }

    pub fn invalidate_collections(&self) {
        self.collections.lock().remove(&());
    }

    // ---------- content summaries ----------

    pub fn get_content(&self, collection: &str) -> Option<Arc<Vec<ContentSummary>>> {
        let ttl = self.ttl();
        self.content.lock().get(&collection.to_string(), ttl)
    }

    pub fn content_ticket(&self) -> Ticket {
        Ticket(self.content.lock().generation)
    }

    pub fn set_content(&self, collection: &str, data: Vec<ContentSummary>) -> Arc<Vec<ContentSummary>> {
        self.content.lock().put(collection.to_string(), data)
    }

    pub fn fill_content(
        &self,
        ticket: Ticket,
        collection: &str,
        data: Vec<ContentSummary>,
    ) -> Arc<Vec<ContentSummary>> {
        self.content.lock().fill(collection.to_string(), data, ticket)
    }

    pub fn invalidate_content(&self, collection: &str) {
        self.content.lock().remove(&collection.to_string());
    }

    // ---------- images ----------

    pub fn get_images(&self, collection: &str, content_id: &str) -> Option<Arc<Vec<ImageRef>>> {
        let ttl = self.ttl();
        self.images
            .lock()
            .get(&(collection.to_string(), content_id.to_string()), ttl)
    }

    pub fn images_ticket(&self) -> Ticket {
        Ticket(self.images.lock().generation)
    }

    pub fn set_images(&self, collection: &str, content_id: &str, data: Vec<ImageRef>) -> Arc<Vec<ImageRef>> {
        self.images
            .lock()
            .put((collection.to_string(), content_id.to_string()), data)
    }

    pub fn fill_images(
        &self,
        ticket: Ticket,
        collection: &str,
        content_id: &str,
        data: Vec<ImageRef>,
    ) -> Arc<Vec<ImageRef>> {
        self.images
            .lock()
            .fill((collection.to_string(), content_id.to_string()), data, ticket)
    }

    pub fn invalidate_images(&self, collection: &str, content_id: &str) {
        self.images
            .lock()
            .remove(&(collection.to_string(), content_id.to_string()));
    }

    /// Drop every image list belonging to `collection`.
    pub fn invalidate_collection_images(&self, collection: &str) {
        self.images.lock().retain(|(c, _), _| c != collection);
    }

    pub fn invalidate_all(&self) {
        self.invalidate_collections();
        self.content.lock().retain(|_, _| false);
        self.images.lock().retain(|_, _| false);
    }

    /// Apply a change reported by the watcher or by a write.
    pub fn handle_file_change(&self, ev: &ChangeEvent) {
        debug!(
            "cache: {:?} in {} ({})",
            ev.kind,
            ev.collection,
            ev.content_id.as_deref().unwrap_or("*")
        );
        self.invalidate_content(&ev.collection);
        match ev.content_id.as_deref() {
            Some(id) => self.invalidate_images(&ev.collection, id),
            None => self.invalidate_collection_images(&ev.collection),
        }
        if ev.kind.alters_count() {
            self.invalidate_collections();
        }
    }
}
