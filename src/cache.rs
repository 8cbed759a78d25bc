//! TTL-bounded cache of batch priority reports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::county::CountyRecord;
use crate::report::PriorityReport;

/// Identity of a canonical county batch.
///
/// Digest of the record count plus every record's case-folded name and the
/// bit patterns of its numeric fields. The model version is not part of the
/// key; retraining clears the cache instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Keys a validated batch. `records` must already be in canonical order.
    pub fn for_batch(records: &[CountyRecord]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((records.len() as u64).to_le_bytes());
        for r in records {
            let name = r.identity();
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            for count in [r.population, r.hospitals, r.schools] {
                hasher.update(count.to_le_bytes());
            }
            for v in [
                r.blackout_freq,
                r.economic_activity,
                r.grid_distance,
                r.current_kwh,
            ] {
                hasher.update(v.to_bits().to_le_bytes());
            }
            for opt in [
                r.solar_irradiance,
                r.avg_wind_speed,
                r.land_availability,
                r.population_density,
            ] {
                match opt {
                    Some(v) => {
                        hasher.update([1u8]);
                        hasher.update(v.to_bits().to_le_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading digest characters, for logs.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

#[derive(Debug)]
struct CacheEntry {
    report: Arc<PriorityReport>,
    created_at: DateTime<Utc>,
}

/// Counts reported by [`ResultCache::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStatus {
    pub entries: usize,
    /// Entries not yet past their TTL.
    pub valid_entries: usize,
}

/// Mutex-guarded map from batch identity to report.
///
/// Entries expire lazily on read or through [`ResultCache::sweep_expired`].
/// Inserting into a full cache evicts the oldest entry.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at < self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<PriorityReport>> {
        self.get_at(key, Utc::now())
    }

    /// Looks up `key` as of `now`, dropping the entry if it has expired.
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<PriorityReport>> {
        let mut entries = self.lock();
        let (live, report) = match entries.get(key) {
            Some(entry) => (self.is_live(entry, now), Some(Arc::clone(&entry.report))),
            None => {
                debug!(key = key.short(), "cache miss");
                return None;
            }
        };
        if live {
            debug!(key = key.short(), "cache hit");
            report
        } else {
            entries.remove(key);
            debug!(key = key.short(), "cache entry expired");
            None
        }
    }

    pub fn insert(&self, key: CacheKey, report: Arc<PriorityReport>) {
        self.insert_at(key, report, Utc::now());
    }

    pub fn insert_at(&self, key: CacheKey, report: Arc<PriorityReport>, now: DateTime<Utc>) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(key = oldest.short(), "cache full; evicted oldest entry");
            }
        }
        entries.insert(
            key,
            CacheEntry {
                report,
                created_at: now,
            },
        );
    }

    /// Removes `key` only if it still maps to this exact `report`.
    pub fn discard(&self, key: &CacheKey, report: &Arc<PriorityReport>) -> bool {
        let mut entries = self.lock();
        let same = entries
            .get(key)
            .is_some_and(|e| Arc::ptr_eq(&e.report, report));
        if same {
            entries.remove(key);
            debug!(key = key.short(), "discarded stale cache entry");
        }
        same
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| now - e.created_at < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        let n = entries.len();
        entries.clear();
        debug!(entries = n, "cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn status(&self) -> CacheStatus {
        let now = Utc::now();
        let entries = self.lock();
        CacheStatus {
            entries: entries.len(),
            valid_entries: entries.values().filter(|e| self.is_live(e, now)).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, kwh: f64) -> CountyRecord {
        CountyRecord {
            county_name: name.to_string(),
            population: 1_000,
            hospitals: 1,
            schools: 2,
            blackout_freq: 3.0,
            economic_activity: 40.0,
            grid_distance: 12.0,
            current_kwh: kwh,
            solar_irradiance: None,
            avg_wind_speed: None,
            land_availability: None,
            population_density: None,
        }
    }

    fn report() -> Arc<PriorityReport> {
        Arc::new(PriorityReport::build(Vec::new(), 10, 3, "1.0.0"))
    }

    fn key(n: u32) -> CacheKey {
        CacheKey::for_batch(&[record(&format!("C{n}"), 1.0)])
    }

    #[test]
    fn key_ignores_name_case_but_not_values() {
        let a = CacheKey::for_batch(&[record("Kwale", 10.0)]);
        let b = CacheKey::for_batch(&[record("KWALE", 10.0)]);
        let c = CacheKey::for_batch(&[record("Kwale", 11.0)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn key_distinguishes_missing_from_zero() {
        let mut with_zero = record("Kwale", 10.0);
        with_zero.solar_irradiance = Some(0.0);
        assert_ne!(
            CacheKey::for_batch(&[record("Kwale", 10.0)]),
            CacheKey::for_batch(&[with_zero])
        );
    }

    #[test]
    fn hit_within_ttl_returns_same_payload() {
        let cache = ResultCache::new(Duration::minutes(30), 8);
        let t0 = Utc::now();
        let payload = report();
        cache.insert_at(key(1), Arc::clone(&payload), t0);
        let hit = cache
            .get_at(&key(1), t0 + Duration::minutes(29))
            .expect("hit");
        assert!(Arc::ptr_eq(&hit, &payload));
    }

    #[test]
    fn expired_entry_is_dropped_on_read() {
        let cache = ResultCache::new(Duration::minutes(30), 8);
        let t0 = Utc::now();
        cache.insert_at(key(1), report(), t0);
        assert!(cache.get_at(&key(1), t0 + Duration::minutes(30)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest() {
        let cache = ResultCache::new(Duration::minutes(30), 2);
        let t0 = Utc::now();
        cache.insert_at(key(1), report(), t0);
        cache.insert_at(key(2), report(), t0 + Duration::seconds(1));
        cache.insert_at(key(3), report(), t0 + Duration::seconds(2));
        assert_eq!(cache.len(), 2);
        assert!(cache.get_at(&key(1), t0).is_none());
        assert!(cache.get_at(&key(3), t0).is_some());
    }

    #[test]
    fn sweep_and_clear() {
        let cache = ResultCache::new(Duration::minutes(30), 8);
        let t0 = Utc::now();
        cache.insert_at(key(1), report(), t0 - Duration::hours(1));
        cache.insert_at(key(2), report(), t0);
        assert_eq!(cache.sweep_expired_at(t0), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn discard_only_removes_matching_payload() {
        let cache = ResultCache::new(Duration::minutes(30), 8);
        let old = report();
        let newer = report();
        cache.insert(key(1), Arc::clone(&newer));
        assert!(!cache.discard(&key(1), &old));
        assert_eq!(cache.len(), 1);
        assert!(cache.discard(&key(1), &newer));
        assert!(cache.is_empty());
    }

    #[test]
    fn status_counts_live_entries() {
        let cache = ResultCache::new(Duration::minutes(30), 8);
        cache.insert_at(key(1), report(), Utc::now() - Duration::hours(2));
        cache.insert(key(2), report());
        let status = cache.status();
        assert_eq!(status.entries, 2);
        assert_eq!(status.valid_entries, 1);
    }
}
