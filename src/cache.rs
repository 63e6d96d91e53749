//! Render cache and request coalescing.
//!
//! Rendering a styled QR code is cheap compared to a network round-trip for a
//! logo, but identical requests arrive in bursts (a page refresh, a bulk job
//! repeating a row). This module makes sure each distinct request renders at
//! most once per TTL window.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: the key is a [`Fingerprint`], the
//! SHA-256 of the canonical JSON serialization of the validated
//! [`StyleConfig`] (object keys sorted, numbers and booleans already typed by
//! validation) followed by the content string. Two requests that differ only
//! in spelling (`"1"` vs `true`, `"500"` vs `500`, key order) validate to the
//! same `StyleConfig` and therefore collide; any real difference changes the
//! hash.
//!
//! ## Coalescing
//!
//! Each fingerprint maps to a slot that is either `Ready` (a committed
//! [`CacheEntry`]) or `Pending` (a render in flight). The first caller for a
//! missing fingerprint claims the slot and renders outside the lock; every
//! concurrent caller with the same fingerprint waits on the pending slot and
//! receives the claimer's result. On success the entry is committed
//! write-once; on failure the slot is cleared so a later identical request can
//! retry. Waiters on a failed render receive the same failure.
//!
//! If the claimer unwinds before publishing, the slot is released and waiters
//! start over.
//!
//! ## Storage
//!
//! Committed entries can be persisted as a versioned JSON manifest at
//! `<output_dir>/.qr-cache.json`, so a later process replaying an identical
//! request still reports a cache hit. A missing or unreadable manifest loads
//! as empty.
//!
//! Expired entries are swept by lookups, at most once per minute (or per TTL
//! when that is shorter), so a long-lived cache does not keep them.

use crate::style::StyleConfig;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".qr-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or fingerprint computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Default time-to-live of a committed entry.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Longest gap between expiry sweeps done by lookups.
const PURGE_INTERVAL_MINUTES: i64 = 1;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Fingerprint
// =============================================================================

/// Stable hash of a validated style plus the content it encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(style: &StyleConfig, content: &str) -> Result<Self, serde_json::Error> {
        let canonical = canonical_json(&serde_json::to_value(style)?);
        let mut hasher = Sha256::new();
        hasher.update(b"qr-style\0");
        hasher.update(canonical.as_bytes());
        hasher.update(b"\0");
        hasher.update(content.as_bytes());
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex digits, used for file names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..16.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let fields: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

// =============================================================================
// Entries
// =============================================================================

/// A committed render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub success: bool,
    /// Base64 image bytes.
    pub data: Option<String>,
    /// Output file reference, relative to the output directory.
    pub file: Option<String>,
    pub error: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn success(bytes: &[u8], file: Option<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(STANDARD.encode(bytes)),
            file,
            error: None,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Decoded image bytes; empty when the entry has no payload.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match &self.data {
            Some(data) => STANDARD.decode(data),
            None => Ok(Vec::new()),
        }
    }
}

/// What a render produces before the cache stamps an expiry on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub file: Option<String>,
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A committed entry was found.
    Hit,
    /// An identical in-flight render finished and was shared.
    Coalesced,
    /// This call ran the render.
    Rendered,
}

impl Lookup {
    /// True when no render ran on behalf of this call.
    pub fn is_hit(self) -> bool {
        !matches!(self, Lookup::Rendered)
    }
}

// =============================================================================
// Coalescing cache
// =============================================================================

enum PendingState<E> {
    Running,
    Done(Result<CacheEntry, E>),
    Abandoned,
}

struct Pending<E> {
    state: Mutex<PendingState<E>>,
    done: Condvar,
}

impl<E: Clone> Pending<E> {
    fn new() -> Self {
        Self {
            state: Mutex::new(PendingState::Running),
            done: Condvar::new(),
        }
    }

    fn publish(&self, state: PendingState<E>) {
        *lock(&self.state) = state;
        self.done.notify_all();
    }

    /// Block until the claimer publishes. `None` means it gave up.
    fn wait(&self) -> Option<Result<CacheEntry, E>> {
        let mut state = lock(&self.state);
        loop {
            match &*state {
                PendingState::Done(result) => return Some(result.clone()),
                PendingState::Abandoned => return None,
                PendingState::Running => {}
            }
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

enum Slot<E> {
    Ready(CacheEntry),
    Pending(Arc<Pending<E>>),
}

enum Role<E> {
    Claim(Arc<Pending<E>>),
    Wait(Arc<Pending<E>>),
}

/// Releases a claimed slot if the render unwinds before publishing.
struct Claim<'a, E: Clone> {
    cache: &'a RenderCache<E>,
    fingerprint: &'a Fingerprint,
    pending: Arc<Pending<E>>,
    published: bool,
}

impl<E: Clone> Drop for Claim<'_, E> {
    fn drop(&mut self) {
        if !self.published {
            lock(&self.cache.slots).remove(self.fingerprint);
            self.pending.publish(PendingState::Abandoned);
        }
    }
}

/// Summary of cache activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub coalesced: u32,
    pub renders: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.coalesced + self.renders
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.coalesced > 0 {
            if self.coalesced > 0 {
                write!(
                    f,
                    "{} cached, {} coalesced, {} rendered ({} total)",
                    self.hits,
                    self.coalesced,
                    self.renders,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} rendered ({} total)",
                    self.hits,
                    self.renders,
                    self.total()
                )
            }
        } else {
            write!(f, "{} rendered", self.renders)
        }
    }
}

/// In-memory, write-once render cache with at-most-one render per
/// fingerprint. `E` is the render failure handed to coalesced waiters.
pub struct RenderCache<E> {
    ttl: TimeDelta,
    slots: Mutex<HashMap<Fingerprint, Slot<E>>>,
    /// Only locked while `slots` is held.
    last_purge: Mutex<Option<DateTime<Utc>>>,
    hits: AtomicU32,
    coalesced: AtomicU32,
    renders: AtomicU32,
}

impl<E: Clone> RenderCache<E> {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
            last_purge: Mutex::new(None),
            hits: AtomicU32::new(0),
            coalesced: AtomicU32::new(0),
            renders: AtomicU32::new(0),
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Committed, unexpired entry for `fingerprint`.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let now = Utc::now();
        match lock(&self.slots).get(fingerprint) {
            Some(Slot::Ready(entry)) if !entry.is_expired(now) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Commit `entry` unless an unexpired one (or a render) already holds
    /// the fingerprint. Returns whether the entry was stored.
    pub fn put(&self, fingerprint: Fingerprint, entry: CacheEntry) -> bool {
        let now = Utc::now();
        let mut slots = lock(&self.slots);
        match slots.get(&fingerprint) {
            Some(Slot::Ready(existing)) if !existing.is_expired(now) => false,
            Some(Slot::Pending(_)) => false,
            _ => {
                slots.insert(fingerprint, Slot::Ready(entry));
                true
            }
        }
    }

    /// Serve `fingerprint` from the cache, or run `render` exactly once
    /// across all concurrent callers and commit its result.
    pub fn get_or_render<F>(
        &self,
        fingerprint: &Fingerprint,
        render: F,
    ) -> Result<(CacheEntry, Lookup), E>
    where
        F: FnOnce() -> Result<Rendered, E>,
    {
        let pending = loop {
            let role = {
                let now = Utc::now();
                let mut slots = lock(&self.slots);
                self.purge_if_due(&mut slots, now);
                match slots.get(fingerprint) {
                    Some(Slot::Ready(entry)) if !entry.is_expired(now) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        log::info!("cache hit {}", fingerprint.short());
                        return Ok((entry.clone(), Lookup::Hit));
                    }
                    Some(Slot::Pending(pending)) => Role::Wait(Arc::clone(pending)),
                    _ => {
                        let pending = Arc::new(Pending::new());
                        slots.insert(fingerprint.clone(), Slot::Pending(Arc::clone(&pending)));
                        Role::Claim(pending)
                    }
                }
            };

            match role {
                Role::Claim(pending) => break pending,
                Role::Wait(pending) => {
                    log::debug!("waiting on in-flight render {}", fingerprint.short());
                    if let Some(result) = pending.wait() {
                        self.coalesced.fetch_add(1, Ordering::Relaxed);
                        return result.map(|entry| (entry, Lookup::Coalesced));
                    }
                }
            }
        };
        self.run_claimed(fingerprint, pending, render)
    }

    fn run_claimed<F>(
        &self,
        fingerprint: &Fingerprint,
        pending: Arc<Pending<E>>,
        render: F,
    ) -> Result<(CacheEntry, Lookup), E>
    where
        F: FnOnce() -> Result<Rendered, E>,
    {
        let mut claim = Claim {
            cache: self,
            fingerprint,
            pending,
            published: false,
        };
        log::info!("cache miss {}", fingerprint.short());
        self.renders.fetch_add(1, Ordering::Relaxed);

        let result = render()
            .map(|rendered| CacheEntry::success(&rendered.bytes, rendered.file, Utc::now() + self.ttl));
        {
            let mut slots = lock(&self.slots);
            match &result {
                Ok(entry) => {
                    slots.insert(fingerprint.clone(), Slot::Ready(entry.clone()));
                }
                Err(_) => {
                    slots.remove(fingerprint);
                }
            }
        }
        claim.pending.publish(PendingState::Done(result.clone()));
        claim.published = true;
        result.map(|entry| (entry, Lookup::Rendered))
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        retain_unexpired(&mut lock(&self.slots), Utc::now())
    }

    fn purge_if_due(&self, slots: &mut HashMap<Fingerprint, Slot<E>>, now: DateTime<Utc>) {
        let mut last = lock(&self.last_purge);
        let interval = self.ttl.min(TimeDelta::minutes(PURGE_INTERVAL_MINUTES));
        if last.is_some_and(|at| now - at < interval) {
            return;
        }
        *last = Some(now);
        let removed = retain_unexpired(slots, now);
        if removed > 0 {
            log::debug!("purged {removed} expired cache entries");
        }
    }

    /// Number of committed entries, expired ones included.
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
        }
    }

    /// Seed the cache with the unexpired entries of `manifest`.
    pub fn restore(&self, manifest: CacheManifest) -> usize {
        let now = Utc::now();
        let mut restored = 0;
        for (fingerprint, entry) in manifest.entries {
            if !entry.is_expired(now) && self.put(fingerprint, entry) {
                restored += 1;
            }
        }
        restored
    }

    /// Snapshot of the committed, unexpired entries.
    pub fn manifest(&self) -> CacheManifest {
        let now = Utc::now();
        let entries = lock(&self.slots)
            .iter()
            .filter_map(|(fingerprint, slot)| match slot {
                Slot::Ready(entry) if !entry.is_expired(now) => {
                    Some((fingerprint.clone(), entry.clone()))
                }
                _ => None,
            })
            .collect();
        CacheManifest {
            version: MANIFEST_VERSION,
            entries,
        }
    }
}

fn retain_unexpired<E>(slots: &mut HashMap<Fingerprint, Slot<E>>, now: DateTime<Utc>) -> usize {
    let before = slots.len();
    slots.retain(|_, slot| !matches!(slot, Slot::Ready(entry) if entry.is_expired(now)));
    before - slots.len()
}

// =============================================================================
// Manifest
// =============================================================================

/// On-disk form of the committed entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<Fingerprint, CacheEntry>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(output_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            Ok(_) | Err(_) => {
                log::warn!("ignoring unreadable cache manifest in {}", output_dir.display());
                Self::empty()
            }
        }
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(output_dir), json)
    }
}

/// Resolve the cache manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}
