use moka::future::Cache;
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::models::{Content, ContentQuery};

/// ContentCache
///
/// Time-boxed cache of published content listings, keyed by `page|section`. Cleared on every
/// content mutation and on demand. `generation` counts clears so a load that overlapped one is
/// served but never stored.
#[derive(Clone)]
pub struct ContentCache {
    inner: Cache<String, Arc<Vec<Content>>>,
    generation: Arc<AtomicU64>,
}

impl ContentCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(ttl_secs.max(1)))
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self, query: &ContentQuery) -> Option<Arc<Vec<Content>>> {
        self.inner.get(&query.cache_key()).await
    }

    /// get_or_load
    ///
    /// Returns the cached rows for `query`, or runs `load` and caches its result unless a
    /// `clear` happened while it ran.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        query: &ContentQuery,
        load: F,
    ) -> Result<Arc<Vec<Content>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Content>, E>>,
    {
        let key = query.cache_key();
        if let Some(rows) = self.inner.get(&key).await {
            return Ok(rows);
        }
        let generation = self.generation.load(Ordering::Acquire);
        let rows = Arc::new(load().await?);
        if self.generation.load(Ordering::Acquire) == generation {
            self.inner.insert(key.clone(), rows.clone()).await;
            // A clear between the check and the insert must still win.
            if self.generation.load(Ordering::Acquire) != generation {
                self.inner.invalidate(&key).await;
            }
        }
        Ok(rows)
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
        tracing::debug!("content cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load_empty(cache: &ContentCache, query: &ContentQuery) {
        cache
            .get_or_load(query, || async { Ok::<_, ()>(Vec::new()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn entries_are_scoped_by_page_and_section_and_clearable() {
        let cache = ContentCache::new(60);
        let home = ContentQuery { page: Some("home".into()), section: None };
        let about = ContentQuery { page: Some("about".into()), section: None };
        load_empty(&cache, &home).await;

        assert!(cache.get(&home).await.is_some());
        assert!(cache.get(&about).await.is_none());

        cache.clear();
        assert!(cache.get(&home).await.is_none());
    }

    #[tokio::test]
    async fn a_load_overlapping_a_clear_is_not_cached() {
        let cache = ContentCache::new(60);
        let home = ContentQuery { page: Some("home".into()), section: None };

        let rows = cache
            .get_or_load(&home, || async {
                cache.clear();
                Ok::<_, ()>(Vec::new())
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert!(cache.get(&home).await.is_none());

        load_empty(&cache, &home).await;
        assert!(cache.get(&home).await.is_some());
    }

    #[tokio::test]
    async fn failed_loads_are_not_cached() {
        let cache = ContentCache::new(60);
        let home = ContentQuery { page: Some("home".into()), section: None };
        let result = cache.get_or_load(&home, || async { Err::<Vec<Content>, _>("down") }).await;
        assert_eq!(result.err(), Some("down"));
        assert!(cache.get(&home).await.is_none());
    }
}
