//! Resource cache
//!
//! A cache maps a key (an MD5 of a description, or a short literal such
//! as a module code) to one shared handle. Lookup is a linear scan over
//! the entry list, which stays small in practice.
//!
//! Population is atomic per key: [`Cache::get_or_try_insert_with`]
//! inserts an empty entry under the list lock and fills it through the
//! entry's `OnceCell`, so two threads asking for the same missing key
//! produce exactly one value.
//!
//! The process-wide caches live in a [`CacheService`] with an explicit
//! `init`/`shutdown` lifecycle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::conversion::LinkContext;
use crate::hash::ContentHash;
use crate::module::Module;
use crate::profile::Profile;

/// Key of a cache entry
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// MD5 of a hash text or of raw bytes
    Hash(ContentHash),
    /// Short string stored verbatim, NUL padded
    Literal([u8; 16]),
}

impl CacheKey {
    pub fn from_hash_text(text: &str) -> Self {
        Self::Hash(ContentHash::of_text(text))
    }

    /// Literal key for strings of up to 16 bytes, hashed otherwise
    pub fn literal(text: &str) -> Self {
        let bytes = text.as_bytes();
        if bytes.len() > 16 {
            return Self::from_hash_text(text);
        }
        let mut raw = [0u8; 16];
        raw[..bytes.len()].copy_from_slice(bytes);
        Self::Literal(raw)
    }
}

impl From<ContentHash> for CacheKey {
    fn from(hash: ContentHash) -> Self {
        Self::Hash(hash)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(h) => write!(f, "Hash({h})"),
            Self::Literal(raw) => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                write!(f, "Literal({:?})", String::from_utf8_lossy(&raw[..end]))
            }
        }
    }
}

/// When to drop entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep every entry for the process lifetime
    #[default]
    Unbounded,
    /// Keep at most this many entries, dropping the least recently used
    MaxEntries(usize),
}

/// One keyed slot
pub struct CacheEntry<T: ?Sized> {
    key: CacheKey,
    slot: OnceCell<Arc<T>>,
    last_used: AtomicU64,
}

impl<T: ?Sized> CacheEntry<T> {
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// The stored handle, if populated
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.get().cloned()
    }

    /// Store `value` unless the entry is populated already.
    ///
    /// Returns the handle that ends up stored.
    pub fn set(&self, value: Arc<T>) -> Arc<T> {
        self.slot.get_or_init(|| value).clone()
    }

    pub fn is_populated(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("populated", &self.is_populated())
            .finish()
    }
}

/// Keyed list of shared handles
pub struct Cache<T: ?Sized> {
    name: &'static str,
    entries: Mutex<Vec<Arc<CacheEntry<T>>>>,
    policy: RwLock<CachePolicy>,
    clock: AtomicU64,
}

impl<T: ?Sized> Cache<T> {
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            entries: Mutex::new(Vec::new()),
            policy: RwLock::new(policy),
            clock: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> CachePolicy {
        *self.policy.read()
    }

    /// Change the policy; shrinking takes effect immediately.
    pub fn set_policy(&self, policy: CachePolicy) {
        *self.policy.write() = policy;
        let mut entries = self.entries.lock();
        self.evict(&mut entries, 0);
    }

    fn touch(&self, entry: &CacheEntry<T>) {
        let now = self.clock.fetch_add(1, Ordering::Relaxed);
        entry.last_used.store(now, Ordering::Relaxed);
    }

    /// Drop least recently used entries until `reserve` more fit.
    ///
    /// Placeholders still held outside the cache are being populated and
    /// are never chosen, so the list may stay above the limit until they
    /// are filled.
    fn evict(&self, entries: &mut Vec<Arc<CacheEntry<T>>>, reserve: usize) {
        let CachePolicy::MaxEntries(max) = self.policy() else {
            return;
        };
        while entries.len() + reserve > max {
            let Some(oldest) = entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_populated() || Arc::strong_count(e) == 1)
                .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
                .map(|(i, _)| i)
            else {
                break;
            };
            let evicted = entries.remove(oldest);
            tracing::debug!(cache = self.name, key = ?evicted.key, "evicted cache entry");
        }
    }

    /// Find the entry for `key` or insert an empty one.
    ///
    /// Two sequential calls with the same key return the same entry.
    pub fn get_or_create(&self, key: CacheKey) -> Arc<CacheEntry<T>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter().find(|e| e.key == key) {
            self.touch(entry);
            return entry.clone();
        }
        self.evict(&mut entries, 1);
        let entry = Arc::new(CacheEntry {
            key,
            slot: OnceCell::new(),
            last_used: AtomicU64::new(0),
        });
        self.touch(&entry);
        entries.push(entry.clone());
        entry
    }

    /// Populated handle for `key`, without inserting
    pub fn get(&self, key: CacheKey) -> Option<Arc<T>> {
        let entries = self.entries.lock();
        let entry = entries.iter().find(|e| e.key == key)?;
        self.touch(entry);
        entry.get()
    }

    /// Return the cached handle or build it exactly once.
    ///
    /// Concurrent callers for the same key wait for the first builder.
    /// On error the empty placeholder is dropped again.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> Result<Arc<T>, E>,
    ) -> Result<Arc<T>, E> {
        let entry = self.get_or_create(key);
        match entry.slot.get_or_try_init(build) {
            Ok(value) => Ok(value.clone()),
            Err(e) => {
                let mut entries = self.entries.lock();
                entries.retain(|other| !(Arc::ptr_eq(other, &entry) && !other.is_populated()));
                Err(e)
            }
        }
    }

    /// Store `value` under `key` unless present; returns the stored handle
    pub fn insert(&self, key: CacheKey, value: Arc<T>) -> Arc<T> {
        self.get_or_create(key).set(value)
    }

    pub fn remove(&self, key: CacheKey) -> Option<Arc<T>> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.key == key)?;
        entries.remove(index).get()
    }

    /// Remove the entry for `key` when its handle `matches`
    pub fn remove_if(&self, key: CacheKey, matches: impl FnOnce(&Arc<T>) -> bool) -> Option<Arc<T>> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.key == key)?;
        let value = entries[index].get()?;
        if !matches(&value) {
            return None;
        }
        entries.remove(index);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Snapshot of the populated handles
    pub fn values(&self) -> Vec<Arc<T>> {
        self.entries.lock().iter().filter_map(|e| e.get()).collect()
    }
}

impl<T: ?Sized> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("policy", &self.policy())
            .finish()
    }
}

/// The process-wide caches
#[derive(Debug)]
pub struct CacheService {
    /// Profiles opened from memory, keyed by content hash
    pub profiles_by_hash: Cache<Profile>,
    /// Profiles opened from disk, keyed by the path's hash text
    pub profiles_by_file: Cache<Profile>,
    /// Opened modules, keyed by module code
    pub modules: Cache<Module>,
    /// Assembled color links, keyed by conversion hash text
    pub conversions: Cache<LinkContext>,
}

impl CacheService {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            profiles_by_hash: Cache::new("profiles_by_hash", policy),
            profiles_by_file: Cache::new("profiles_by_file", policy),
            modules: Cache::new("modules", CachePolicy::Unbounded),
            conversions: Cache::new("conversions", policy),
        }
    }

    /// Apply a policy to the profile and conversion caches.
    ///
    /// Modules are never evicted since filters hold their libraries.
    pub fn set_policy(&self, policy: CachePolicy) {
        self.profiles_by_hash.set_policy(policy);
        self.profiles_by_file.set_policy(policy);
        self.conversions.set_policy(policy);
    }

    pub fn clear(&self) {
        self.profiles_by_hash.clear();
        self.profiles_by_file.clear();
        self.conversions.clear();
        self.modules.clear();
    }
}

static SERVICE: Lazy<RwLock<Option<Arc<CacheService>>>> = Lazy::new(|| RwLock::new(None));

/// Start the cache service, or apply `policy` to the running one
pub fn init(policy: CachePolicy) -> Arc<CacheService> {
    let mut slot = SERVICE.write();
    match slot.as_ref() {
        Some(service) => {
            service.set_policy(policy);
            service.clone()
        }
        None => {
            tracing::debug!(?policy, "cache service started");
            let service = Arc::new(CacheService::new(policy));
            *slot = Some(service.clone());
            service
        }
    }
}

/// The running cache service, started with the default policy on first use
pub fn service() -> Arc<CacheService> {
    if let Some(service) = SERVICE.read().as_ref() {
        return service.clone();
    }
    init(CachePolicy::default())
}

/// Release every cached handle and stop the service.
///
/// Calling it twice is harmless; a later [`service`] call starts afresh.
pub fn shutdown() {
    if let Some(service) = SERVICE.write().take() {
        service.clear();
        tracing::debug!("cache service shut down");
    }
}
