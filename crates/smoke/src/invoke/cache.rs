// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent LRU cache of prepared call descriptors.
//!
//! Preparing a call interface walks every argument type and asks libffi to
//! lay out each aggregate, so it happens once per distinct signature.
//! Subsequent lookups are served from an in-memory LRU cache behind a read
//! lock. A secondary dashmap tracks "pinned" signatures that must never be
//! evicted (hot paths the embedder knows about up front).

use super::ffi::CallDescriptor;
use crate::config;
use crate::error::FfiError;
use crate::signature::MethodSignature;
use dashmap::DashSet;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
    pub last_miss_ns: u64,
}

/// LRU-based concurrent cache of [`CallDescriptor`]s keyed by signature.
pub struct DescriptorCache {
    inner: RwLock<LruCache<MethodSignature, Arc<CallDescriptor>>>,
    pinned: DashSet<MethodSignature>,
    stats: RwLock<LookupStats>,
    /// Follow `EngineConfig::descriptor_cache_capacity` on every miss.
    tracks_config: bool,
}

impl DescriptorCache {
    /// Cache holding at most `capacity` descriptors (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(LruCache::new(capacity_of(capacity))),
            pinned: DashSet::new(),
            stats: RwLock::new(LookupStats::default()),
            tracks_config: false,
        }
    }

    fn from_config() -> Self {
        Self {
            tracks_config: true,
            ..Self::new(config::get().descriptor_cache_capacity)
        }
    }

    /// Descriptor for `signature`, preparing and caching it on a miss.
    pub fn get_or_build(&self, signature: &MethodSignature) -> Result<Arc<CallDescriptor>, FfiError> {
        self.get_or_try_build(signature, || CallDescriptor::new(signature))
    }

    pub fn get_or_try_build<F, E>(
        &self,
        signature: &MethodSignature,
        build: F,
    ) -> Result<Arc<CallDescriptor>, E>
    where
        F: FnOnce() -> Result<CallDescriptor, E>,
    {
        if let Some(hit) = self.try_peek(signature) {
            self.record_hit();
            return Ok(hit);
        }

        let mut cache = self.inner.write();
        if let Some(hit) = cache.get(signature) {
            self.record_hit();
            return Ok(Arc::clone(hit));
        }

        let start = Instant::now();
        let built = Arc::new(build()?);
        log::debug!("[cache] prepared call interface for {}", signature);

        if self.tracks_config {
            let capacity = capacity_of(config::get().descriptor_cache_capacity);
            if capacity != cache.cap() {
                log::debug!("[cache] resizing descriptor cache to {}", capacity);
                cache.resize(capacity);
            }
        }

        if cache.len() >= cache.cap().into() && !self.free_slot(&mut cache) {
            self.record_miss(start);
            return Ok(built);
        }

        cache.put(signature.clone(), Arc::clone(&built));
        self.record_miss(start);
        Ok(built)
    }

    /// Keep `signature` resident once cached.
    pub fn pin(&self, signature: &MethodSignature) {
        self.pinned.insert(signature.clone());
    }

    pub fn unpin(&self, signature: &MethodSignature) {
        self.pinned.remove(signature);
    }

    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.inner.read().contains(signature)
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().cap().get()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every descriptor (pins are kept).
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    #[must_use]
    pub fn stats(&self) -> LookupStats {
        *self.stats.read()
    }

    fn try_peek(&self, signature: &MethodSignature) -> Option<Arc<CallDescriptor>> {
        let cache = self.inner.read();
        cache.peek(signature).map(Arc::clone)
    }

    fn free_slot(&self, cache: &mut LruCache<MethodSignature, Arc<CallDescriptor>>) -> bool {
        if cache.len() < cache.cap().into() {
            return true;
        }

        let attempts = cache.len();
        for _ in 0..attempts {
            if let Some((old_key, old_value)) = cache.pop_lru() {
                if self.pinned.contains(&old_key) {
                    cache.put(old_key, old_value);
                } else {
                    return true;
                }
            } else {
                break;
            }
        }

        false
    }

    fn record_hit(&self) {
        let mut stats = self.stats.write();
        stats.hits = stats.hits.saturating_add(1);
    }

    fn record_miss(&self, start: Instant) {
        let mut stats = self.stats.write();
        stats.misses = stats.misses.saturating_add(1);
        stats.last_miss_ns = start.elapsed().as_nanos() as u64;
    }
}

impl std::fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("pinned", &self.pinned.len())
            .field("stats", &self.stats())
            .finish()
    }
}

fn capacity_of(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// Process-wide cache used by [`Invocation`](super::Invocation).
pub fn global() -> &'static DescriptorCache {
    static CACHE: OnceLock<DescriptorCache> = OnceLock::new();
    CACHE.get_or_init(DescriptorCache::from_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, Type};

    fn signature(ret: PrimitiveKind, args: &[PrimitiveKind]) -> MethodSignature {
        MethodSignature::new(
            Type::primitive(ret),
            args.iter().map(|&k| Type::primitive(k)),
        )
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = DescriptorCache::new(8);
        let sig = signature(PrimitiveKind::Int, &[PrimitiveKind::Int, PrimitiveKind::Int]);

        let first = cache.get_or_build(&sig).unwrap();
        let second = cache.get_or_build(&sig).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert!(cache.contains(&sig));
    }

    #[test]
    fn test_equal_signatures_share_entry() {
        let cache = DescriptorCache::new(8);
        let parsed = MethodSignature::parse("i8i0i4").unwrap();
        let built = signature(PrimitiveKind::Int, &[PrimitiveKind::Int, PrimitiveKind::Int]);
        cache.get_or_build(&parsed).unwrap();
        cache.get_or_build(&built).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = DescriptorCache::new(8);
        let sig = signature(PrimitiveKind::Int128, &[]);
        assert!(matches!(
            cache.get_or_build(&sig),
            Err(FfiError::UnsupportedType(_))
        ));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_pinned_entries_survive_eviction() {
        let capacity = 16;
        let cache = DescriptorCache::new(capacity);
        let pinned = signature(PrimitiveKind::Double, &[PrimitiveKind::Double]);
        cache.pin(&pinned);
        cache.get_or_build(&pinned).unwrap();

        for arity in 0..capacity + 4 {
            let args = vec![PrimitiveKind::Int; arity];
            cache.get_or_build(&signature(PrimitiveKind::Int, &args)).unwrap();
        }

        assert!(cache.contains(&pinned));
        assert_eq!(cache.len(), capacity);
        assert_eq!(cache.capacity(), capacity);
    }

    #[test]
    fn test_clear() {
        let cache = DescriptorCache::new(4);
        cache
            .get_or_build(&signature(PrimitiveKind::Float, &[]))
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
