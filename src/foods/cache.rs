use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

use crate::foods::external::ExternalFood;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone)]
struct CacheEntry {
    foods: Vec<ExternalFood>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded, TTL-limited cache of external search answers keyed by the
/// normalised query. Built once per process and owned by the search service.
pub struct SearchCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn key(query: &str) -> String {
        query.trim().to_lowercase()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<ExternalFood>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.foods.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: String, foods: Vec<ExternalFood>) {
        let entry = CacheEntry {
            foods,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().await.put(key, entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrients::Nutrients;

    fn food(name: &str) -> ExternalFood {
        ExternalFood {
            external_id: None,
            name: name.into(),
            per_reference: Nutrients::new(100.0, 1.0, 1.0, 1.0),
        }
    }

    #[tokio::test]
    async fn hit_within_ttl() {
        let cache = SearchCache::new(4, Duration::from_secs(60));
        cache.insert(SearchCache::key("  Arroz "), vec![food("Arroz")]).await;
        let hit = cache.get("arroz").await.unwrap();
        assert_eq!(hit[0].name, "Arroz");
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = SearchCache::new(4, Duration::ZERO);
        cache.insert("feijao".into(), vec![food("Feijão")]).await;
        assert!(cache.get("feijao").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = SearchCache::new(2, Duration::from_secs(60));
        cache.insert("a".into(), vec![food("a")]).await;
        cache.insert("b".into(), vec![food("b")]).await;
        cache.get("a").await;
        cache.insert("c".into(), vec![food("c")]).await;
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
    }
}
