//! External cache provider contract, plus an in-memory reference
//! implementation.
//!
//! The provider is not assumed thread-safe; the `CacheManager` guarantees
//! single-threaded access by construction (it is the only caller). Every
//! operation returns a future so a real provider can be backed by a
//! network round-trip (Redis, an object store, a peer node) without
//! blocking the manager thread.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CacheError;
use crate::segment_body::SegmentBody;
use crate::segment_header::SegmentHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCacheEventType {
    EntryCreated,
    EntryDeleted,
}

/// A provider-originated notification. `is_local = true` means "this node
/// caused the mutation"; providers that cannot tell must report `false`
/// (never claim locality they can't verify) so the manager doesn't
/// mistake a remote write for an echo of its own.
#[derive(Debug, Clone)]
pub struct SegmentCacheEvent {
    pub event_type: SegmentCacheEventType,
    pub source: SegmentHeader,
    pub is_local: bool,
}

pub trait CacheListener: Send + Sync {
    fn on_event(&self, event: SegmentCacheEvent);
}

/// An external cache backend. Implementors plug into the `CacheManager`,
/// which owns the only handle and serializes every call against it.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn contains(&self, header: &SegmentHeader) -> Result<bool, CacheError>;
    async fn get(&self, header: &SegmentHeader) -> Result<Option<SegmentBody>, CacheError>;
    async fn put(&self, header: &SegmentHeader, body: &SegmentBody) -> Result<bool, CacheError>;
    async fn remove(&self, header: &SegmentHeader) -> Result<bool, CacheError>;
    async fn get_segment_headers(&self) -> Result<Vec<SegmentHeader>, CacheError>;

    /// Register a listener for `EntryCreated`/`EntryDeleted` events
    /// originating from other nodes. Invoked on the provider's own
    /// thread — handlers must be non-blocking (the manager's handler
    /// just enqueues an event and returns).
    fn add_listener(&self, listener: Box<dyn CacheListener>);
    fn remove_all_listeners(&self);

    /// If false, the manager cannot rely on header contents surviving a
    /// round-trip through this provider and must treat it as opaque bulk
    /// storage.
    fn supports_rich_index(&self) -> bool;

    /// Release all resources. Further operations on this provider fail.
    async fn tear_down(&self) -> Result<(), CacheError>;
}

/// Reference in-memory provider: a `HashMap` guarded by a `Mutex`, used
/// both in tests and as the default when no external backend is
/// configured. Listeners are accepted but never fire — nothing external
/// ever mutates this provider's state.
#[derive(Default)]
pub struct MemoryCacheProvider {
    entries: Mutex<HashMap<[u8; 32], SegmentBody>>,
    torn_down: std::sync::atomic::AtomicBool,
}

impl MemoryCacheProvider {
    pub fn new() -> Self {
        MemoryCacheProvider::default()
    }

    fn check_alive(&self) -> Result<(), CacheError> {
        if self.torn_down.load(std::sync::atomic::Ordering::Acquire) {
            return Err(CacheError::ProviderFailure {
                operation: "any".to_string(),
                source: "provider has been torn down".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn contains(&self, header: &SegmentHeader) -> Result<bool, CacheError> {
        self.check_alive()?;
        let entries = self.entries.lock().unwrap();
        Ok(entries.contains_key(header.unique_id()))
    }

    async fn get(&self, header: &SegmentHeader) -> Result<Option<SegmentBody>, CacheError> {
        self.check_alive()?;
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(header.unique_id()).cloned())
    }

    async fn put(&self, header: &SegmentHeader, body: &SegmentBody) -> Result<bool, CacheError> {
        self.check_alive()?;
        let mut entries = self.entries.lock().unwrap();
        let was_new = !entries.contains_key(header.unique_id());
        entries.insert(*header.unique_id(), body.clone());
        Ok(was_new)
    }

    async fn remove(&self, header: &SegmentHeader) -> Result<bool, CacheError> {
        self.check_alive()?;
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.remove(header.unique_id()).is_some())
    }

    async fn get_segment_headers(&self) -> Result<Vec<SegmentHeader>, CacheError> {
        self.check_alive()?;
        // Headers aren't separately tracked in this reference backend —
        // there is nothing to enumerate without a real header index
        // alongside the body store. A provider advertising rich-index
        // support would keep one; this one doesn't, so it reports empty.
        Ok(Vec::new())
    }

    fn add_listener(&self, _listener: Box<dyn CacheListener>) {}

    fn remove_all_listeners(&self) {}

    fn supports_rich_index(&self) -> bool {
        false
    }

    async fn tear_down(&self) -> Result<(), CacheError> {
        self.torn_down.store(true, std::sync::atomic::Ordering::Release);
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
