use crate::{config::Config, types::DomainLookupResult};
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, info};

/// Short-lived store of assembled lookup results keyed by normalized domain.
pub struct CacheService {
    cache: Cache<String, DomainLookupResult>,
}

impl CacheService {
    /// `None` when caching is disabled (`cache_ttl_seconds == 0`).
    pub fn new(config: &Config) -> Option<Self> {
        if config.cache_ttl_seconds == 0 || config.cache_max_entries == 0 {
            info!("Result cache disabled");
            return None;
        }

        let cache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Some(Self { cache })
    }

    pub async fn get(&self, domain: &str) -> Option<DomainLookupResult> {
        let key = Self::normalize_domain(domain);
        let hit = self.cache.get(&key).await;
        if hit.is_some() {
            debug!("Cache hit for domain: {}", domain);
        } else {
            debug!("Cache miss for domain: {}", domain);
        }
        hit
    }

    pub async fn set(&self, domain: &str, result: &DomainLookupResult) {
        let key = Self::normalize_domain(domain);
        self.cache.insert(key, result.clone()).await;
        debug!("Cached result for domain: {}", domain);
    }

    fn normalize_domain(domain: &str) -> String {
        let normalized = domain.trim().to_lowercase();
        match normalized.strip_suffix('.') {
            Some(stripped) => stripped.to_string(),
            None => normalized,
        }
    }
}
