//! The pinned file cache.
//!
//! [`FileCache`] is a lifecycle-managed handle around a pinned arena, an
//! entry index and an eviction policy. Lookups read through to a
//! [`StorageReader`] on a miss and try to admit what they read; admission is
//! best-effort and never changes what the caller gets back.
//!
//! ## Architecture
//!
//! ```text
//!   FileCache
//!   ├── state: RwLock<State>          Uninitialized ─init─► Ready ─destroy─► Destroyed
//!   └── reader: Arc<dyn StorageReader>
//!
//!   Engine (Ready only)
//!   ├── core: RwLock<CacheCore>       arena + index + policy
//!   ├── inflight: InFlight            per-key fetch claims
//!   ├── counters: CacheCounters
//!   └── clock: AtomicU64              admission seq and hit ticks
//! ```
//!
//! ## Lookup
//!
//! ```text
//!   get(key, buf)
//!     resident? ── size > buf ──► BufferTooSmall
//!               └─ copy, record hit ──► Hit
//!     claim key
//!       leader:   re-check index, read storage, copy, publish bytes, admit,
//!                 release claim ──► Miss
//!       follower: wait for leader's bytes ──► Miss
//!                 (abandoned or timed out: re-check index, read uncached)
//! ```
//!
//! Followers wake as soon as the leader publishes, never behind admission.
//! The leader itself admits before returning: its bytes are already in the
//! caller's buffer, and keeping admission inside the call keeps it under the
//! shared state lock, so `destroy` can never release the region under it.
//!
//! ## Concurrency
//!
//! Every operation holds the state lock shared for its whole duration;
//! `init` and `destroy` take it exclusively, so `destroy` waits for gets in
//! progress and no get ever sees a half-released region. Hits share the core
//! lock; admission and invalidation take it exclusively.

mod inner;
mod inflight;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::builder::CacheConfig;
use crate::error::{AdmissionError, CacheError, InvariantError, ReadError, Result};
use crate::metrics::{CacheCounters, CacheMetricsSnapshot};
use crate::policy::PolicyKind;
use crate::reader::StorageReader;
use crate::store::key::check_len;
use crate::store::{CacheKey, EntryStats};

use self::inner::CacheCore;
use self::inflight::{Claimed, InFlight, Resolution};

/// Where the bytes returned by a lookup came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Served from pinned memory.
    Hit,
    /// Read from storage.
    Miss,
}

impl Outcome {
    pub fn is_hit(self) -> bool {
        self == Outcome::Hit
    }

    pub fn is_miss(self) -> bool {
        self == Outcome::Miss
    }
}

enum State {
    Uninitialized,
    Ready(Engine),
    Destroyed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Uninitialized => "uninitialized",
            State::Ready(_) => "ready",
            State::Destroyed => "destroyed",
        }
    }
}

/// A pinned-memory cache of whole files.
///
/// # Example
///
/// ```
/// use pincache::builder::CacheConfig;
/// use pincache::cache::FileCache;
/// use pincache::policy::PolicyKind;
/// use pincache::reader::MemoryReader;
///
/// let reader = MemoryReader::new();
/// reader.insert("img/0001.bmp", vec![7u8; 100]);
///
/// let cache = FileCache::new(reader);
/// cache.init(CacheConfig::new(4096, PolicyKind::CostAware)).unwrap();
///
/// let mut buf = vec![0u8; 256];
/// let (n, first) = cache.get("img/0001.bmp", &mut buf).unwrap();
/// let (_, second) = cache.get("img/0001.bmp", &mut buf).unwrap();
/// assert_eq!(n, 100);
/// assert!(first.is_miss() && second.is_hit());
///
/// cache.destroy().unwrap();
/// assert!(cache.get("img/0001.bmp", &mut buf).is_err());
/// ```
pub struct FileCache {
    state: RwLock<State>,
    reader: Arc<dyn StorageReader>,
}

impl FileCache {
    /// Creates an uninitialized handle. Nothing is allocated until
    /// [`init`](Self::init).
    pub fn new<R>(reader: R) -> Self
    where
        R: StorageReader + 'static,
    {
        Self {
            state: RwLock::new(State::Uninitialized),
            reader: Arc::new(reader),
        }
    }

    /// Creates and initializes in one step.
    pub fn open<R>(config: CacheConfig, reader: R) -> Result<Self>
    where
        R: StorageReader + 'static,
    {
        let cache = Self::new(reader);
        cache.init(config)?;
        Ok(cache)
    }

    /// Allocates and pins the arena.
    ///
    /// Fails with [`CacheError::AlreadyInitialized`] on a ready handle and
    /// [`CacheError::NotInitialized`] on a destroyed one. On failure the
    /// handle is unchanged and holds no memory.
    pub fn init(&self, config: CacheConfig) -> Result<()> {
        config.validate()?;
        let mut state = self.state.write();
        match &*state {
            State::Ready(_) => return Err(CacheError::AlreadyInitialized),
            State::Destroyed => return Err(CacheError::NotInitialized),
            State::Uninitialized => {},
        }
        let engine = Engine::new(config)?;
        info!(
            capacity = engine.config.capacity,
            policy = %engine.config.policy,
            "cache ready"
        );
        *state = State::Ready(engine);
        Ok(())
    }

    /// Releases the pinned region and drops every entry.
    ///
    /// Waits for lookups already in progress. Afterwards every operation
    /// fails with [`CacheError::NotInitialized`], including a second
    /// `destroy`.
    pub fn destroy(&self) -> Result<()> {
        let mut state = self.state.write();
        if !matches!(&*state, State::Ready(_)) {
            debug!(state = state.name(), "destroy on a cache that is not ready");
            return Err(CacheError::NotInitialized);
        }
        if let State::Ready(engine) = std::mem::replace(&mut *state, State::Destroyed) {
            let metrics = engine.metrics();
            info!(
                entries = metrics.len,
                used = metrics.used,
                hits = metrics.hits,
                misses = metrics.misses,
                "cache destroyed"
            );
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.read(), State::Ready(_))
    }

    /// Copies the item stored under `key` into `buf`.
    ///
    /// Returns the item's size and whether it came from memory or storage.
    /// `buf.len()` is the caller's capacity; bytes beyond the returned size
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// - [`CacheError::KeyTooLong`] before any lookup.
    /// - [`CacheError::BufferTooSmall`] if the item is resident but larger
    ///   than `buf`. Nothing is copied.
    /// - [`CacheError::ItemTooLarge`] if the item is read from storage and
    ///   is larger than `buf`. Nothing is copied or admitted.
    /// - [`CacheError::Storage`] if the reader fails. The cache is unchanged.
    pub fn get(&self, key: &str, buf: &mut [u8]) -> Result<(usize, Outcome)> {
        let capacity = buf.len();
        self.with_engine(|engine| {
            engine.get_with(&*self.reader, key, capacity, |bytes| {
                buf[..bytes.len()].copy_from_slice(bytes);
            })
        })
    }

    /// Like [`get`](Self::get), returning the bytes in a fresh vector.
    /// `max_size` plays the role of the buffer capacity.
    pub fn get_owned(&self, key: &str, max_size: usize) -> Result<(Vec<u8>, Outcome)> {
        let mut out = Vec::new();
        let (_, outcome) = self.with_engine(|engine| {
            engine.get_with(&*self.reader, key, max_size, |bytes| {
                out = bytes.to_vec();
            })
        })?;
        Ok((out, outcome))
    }

    /// Returns `true` if `key` is resident. Does not count as a hit.
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.with_engine(|engine| {
            check_len(key, engine.config.max_key_len)?;
            Ok(engine.core.read().lookup(key).is_some())
        })
    }

    /// Drops `key` from the cache. Returns `true` if it was resident.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        self.with_engine(|engine| {
            check_len(key, engine.config.max_key_len)?;
            let removed = engine.core.write().evict(key);
            if let Some(entry) = &removed {
                debug!(key, size = entry.size(), "invalidated");
            }
            Ok(removed.is_some())
        })
    }

    pub fn entry_stats(&self, key: &str) -> Result<Option<EntryStats>> {
        self.with_engine(|engine| {
            check_len(key, engine.config.max_key_len)?;
            Ok(engine.core.read().lookup(key).map(|entry| entry.stats()))
        })
    }

    /// Number of resident items.
    pub fn len(&self) -> Result<usize> {
        self.with_engine(|engine| Ok(engine.core.read().len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Bytes occupied by resident items.
    pub fn used(&self) -> Result<usize> {
        self.with_engine(|engine| Ok(engine.core.read().used()))
    }

    pub fn capacity(&self) -> Result<usize> {
        self.with_engine(|engine| Ok(engine.core.read().capacity()))
    }

    pub fn policy(&self) -> Result<PolicyKind> {
        self.with_engine(|engine| Ok(engine.core.read().policy()))
    }

    pub fn metrics(&self) -> Result<CacheMetricsSnapshot> {
        self.with_engine(|engine| Ok(engine.metrics()))
    }

    /// Cross-checks the arena against the index.
    ///
    /// The outer `Result` reports the lifecycle error; the inner one any
    /// broken invariant.
    pub fn check_invariants(&self) -> Result<std::result::Result<(), InvariantError>> {
        self.with_engine(|engine| Ok(engine.core.read().check_invariants()))
    }

    fn with_engine<T>(&self, f: impl FnOnce(&Engine) -> Result<T>) -> Result<T> {
        match &*self.state.read() {
            State::Ready(engine) => f(engine),
            State::Uninitialized | State::Destroyed => Err(CacheError::NotInitialized),
        }
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let mut out = f.debug_struct("FileCache");
        out.field("state", &state.name());
        if let State::Ready(engine) = &*state {
            out.field("engine", engine);
        }
        out.finish_non_exhaustive()
    }
}

struct Engine {
    config: CacheConfig,
    core: RwLock<CacheCore>,
    inflight: InFlight,
    counters: CacheCounters,
    clock: AtomicU64,
}

impl Engine {
    fn new(config: CacheConfig) -> Result<Self> {
        let core = CacheCore::new(&config)?;
        Ok(Self {
            config,
            core: RwLock::new(core),
            inflight: InFlight::new(),
            counters: CacheCounters::default(),
            clock: AtomicU64::new(0),
        })
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        let core = self.core.read();
        self.counters.snapshot(core.used(), core.capacity(), core.len())
    }

    /// Resolves `key` and hands exactly one byte slice of at most
    /// `max_size` bytes to `sink`.
    fn get_with(
        &self,
        reader: &dyn StorageReader,
        key: &str,
        max_size: usize,
        mut sink: impl FnMut(&[u8]),
    ) -> Result<(usize, Outcome)> {
        check_len(key, self.config.max_key_len)?;
        if let Some(size) = self.serve_hit(key, max_size, &mut sink)? {
            return Ok((size, Outcome::Hit));
        }

        let cache_key = CacheKey::new(key, self.config.max_key_len)?;
        match self.inflight.claim(&cache_key) {
            Claimed::Leader(guard) => {
                // Another leader may have admitted the key since our lookup.
                if let Some(size) = self.serve_hit(key, max_size, &mut sink)? {
                    return Ok((size, Outcome::Hit));
                }
                self.counters.inc_miss();
                let bytes = self.read_storage(reader, key, max_size)?;
                debug!(key, size = bytes.len(), "miss");
                sink(&bytes);
                let bytes: Arc<[u8]> = bytes.into();
                guard.publish(Arc::clone(&bytes));
                // The claim stays held while admitting, so late arrivals share
                // `bytes` instead of fetching again.
                self.try_admit(cache_key, &bytes);
                drop(guard);
                Ok((bytes.len(), Outcome::Miss))
            },
            Claimed::Follower(claim) => {
                trace!(key, "waiting on in-flight fetch");
                match claim.wait(self.config.inflight_wait()) {
                    Some(Resolution::Fetched(bytes)) => {
                        if bytes.len() > max_size {
                            return Err(CacheError::ItemTooLarge {
                                size: bytes.len(),
                                capacity: max_size,
                            });
                        }
                        self.counters.inc_miss();
                        self.counters.inc_shared_fetch();
                        sink(&bytes);
                        Ok((bytes.len(), Outcome::Miss))
                    },
                    resolution => {
                        if let Some(size) = self.serve_hit(key, max_size, &mut sink)? {
                            return Ok((size, Outcome::Hit));
                        }
                        debug!(
                            key,
                            timed_out = resolution.is_none(),
                            "in-flight fetch unavailable, reading uncached"
                        );
                        self.counters.inc_miss();
                        self.counters.inc_uncached_read();
                        let bytes = self.read_storage(reader, key, max_size)?;
                        sink(&bytes);
                        Ok((bytes.len(), Outcome::Miss))
                    },
                }
            },
        }
    }

    /// Copies a resident entry to `sink`. `Ok(None)` if not resident.
    fn serve_hit(
        &self,
        key: &str,
        max_size: usize,
        sink: &mut impl FnMut(&[u8]),
    ) -> Result<Option<usize>> {
        let core = self.core.read();
        let Some(entry) = core.lookup(key) else {
            return Ok(None);
        };
        let size = entry.size();
        if size > max_size {
            return Err(CacheError::BufferTooSmall {
                size,
                capacity: max_size,
            });
        }
        sink(core.bytes_of(entry));
        entry.record_hit(self.tick());
        self.counters.inc_hit();
        debug!(key, size, "hit");
        Ok(Some(size))
    }

    fn read_storage(&self, reader: &dyn StorageReader, key: &str, max_size: usize) -> Result<Vec<u8>> {
        let bytes = reader.read_exact(key, max_size).map_err(|err| match err {
            ReadError::TooLarge { size, .. } => CacheError::ItemTooLarge {
                size,
                capacity: max_size,
            },
            other => {
                debug!(key, error = %other, "storage read failed");
                CacheError::Storage(other)
            },
        })?;
        if bytes.len() > max_size {
            return Err(CacheError::ItemTooLarge {
                size: bytes.len(),
                capacity: max_size,
            });
        }
        Ok(bytes)
    }

    /// Best-effort admission. Failures are counted and logged, never
    /// returned.
    fn try_admit(&self, key: CacheKey, bytes: &[u8]) {
        let size = bytes.len();
        if size > self.config.capacity {
            self.counters.inc_rejected_admission();
            debug!(key = %key, size, capacity = self.config.capacity, "uncacheable, not admitted");
            return;
        }

        let mut core = self.core.write();
        let seq = self.tick();
        match core.admit(key.clone(), bytes, seq) {
            Ok(admitted) => {
                self.counters.inc_admission();
                self.counters.add_evictions(admitted.evicted.len() as u64);
                if admitted.compacted {
                    self.counters.inc_compaction();
                }
                for victim in &admitted.evicted {
                    debug!(key = %victim, "evicted");
                }
                debug!(key = %key, size, seq, used = core.used(), "admitted");
            },
            Err(AdmissionError::DuplicateKey) => {
                trace!(key = %key, "already resident");
            },
            Err(err @ AdmissionError::NoSpaceAfterEviction { .. }) => {
                self.counters.inc_rejected_admission();
                warn!(key = %key, error = %err, "admission failed");
            },
            Err(err) => {
                self.counters.inc_rejected_admission();
                debug!(key = %key, error = %err, "not admitted");
            },
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("in_flight", &self.inflight.len())
            .field("metrics", &self.metrics())
            .finish()
    }
}
