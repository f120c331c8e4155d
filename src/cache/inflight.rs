//! Per-key claims on storage fetches.
//!
//! The first miss for a key becomes the leader: it owns a [`ClaimGuard`] and
//! is the only caller that reads storage and attempts admission. Later misses
//! for the same key become followers and block on the shared [`Claim`] until
//! the leader resolves it or their wait bound expires.
//!
//! Claims live beside the entry index, never inside it: an index record
//! always has bytes behind it.
//!
//! [`publish`](ClaimGuard::publish) wakes the followers as soon as the bytes
//! are read, but the claim stays in the map until the guard drops. The
//! leader admits in between, so a caller arriving during admission still
//! shares the fetched bytes rather than reading storage again.
//!
//! A guard that is dropped without publishing (read error, panic, early
//! return) resolves the claim as [`Resolution::Abandoned`], so followers
//! never wait on a fetch that will not finish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::store::CacheKey;

/// How a leader's fetch ended.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    /// The leader read these bytes.
    Fetched(Arc<[u8]>),
    Abandoned,
}

#[derive(Debug, Default)]
pub(crate) struct Claim {
    state: Mutex<Option<Resolution>>,
    resolved: Condvar,
}

impl Claim {
    /// Blocks until the claim resolves. Returns `None` once `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> Option<Resolution> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.is_none() {
            if self.resolved.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.clone()
    }

    fn resolve(&self, resolution: Resolution) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(resolution);
        }
        self.resolved.notify_all();
    }
}

/// Outcome of [`InFlight::claim`].
pub(crate) enum Claimed<'a> {
    Leader(ClaimGuard<'a>),
    Follower(Arc<Claim>),
}

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    claims: Mutex<FxHashMap<CacheKey, Arc<Claim>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, key: &CacheKey) -> Claimed<'_> {
        let mut claims = self.claims.lock();
        if let Some(claim) = claims.get(key.as_str()) {
            return Claimed::Follower(Arc::clone(claim));
        }
        let claim = Arc::new(Claim::default());
        claims.insert(key.clone(), Arc::clone(&claim));
        Claimed::Leader(ClaimGuard {
            inflight: self,
            key: key.clone(),
            claim,
        })
    }

    /// Number of keys currently being fetched.
    pub fn len(&self) -> usize {
        self.claims.lock().len()
    }
}

/// Leadership of one key's fetch. The claim resolves at most once and is
/// removed from the map when the guard drops.
pub(crate) struct ClaimGuard<'a> {
    inflight: &'a InFlight,
    key: CacheKey,
    claim: Arc<Claim>,
}

impl ClaimGuard<'_> {
    /// Hands the fetched bytes to every current and later follower. The key
    /// stays claimed until the guard drops.
    pub fn publish(&self, bytes: Arc<[u8]>) {
        self.claim.resolve(Resolution::Fetched(bytes));
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        // Unpublish first: a caller arriving after this point starts a fresh
        // claim and finds any admitted entry in the index.
        self.inflight.claims.lock().remove(self.key.as_str());
        // No-op when already published.
        self.claim.resolve(Resolution::Abandoned);
    }
}
