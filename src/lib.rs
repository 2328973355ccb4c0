//! # Domain Intelligence Library
//!
//! Gathers everything worth knowing about a domain name in one call and
//! normalizes it into a single [`DomainLookupResult`].
//!
//! ## Features
//!
//! - WHOIS over port 43 with TLD server discovery and referral following
//! - WhoisXML API fallback when the registry has nothing usable
//! - A, AAAA, MX, TXT and NS records via hickory-resolver
//! - Leaf TLS certificate summary via rustls
//! - IP geolocation of the first IPv4 address
//! - Partial failures reported per lookup instead of failing the request
//! - Optional result caching
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_intel::DomainIntelClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DomainIntelClient::new()?;
//!     let response = client.lookup("example.com").await?;
//!
//!     println!("Registrar: {:?}", response.domain_info.registrar.name);
//!     for failure in &response.domain_info.errors {
//!         println!("Degraded: {}", failure);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod buffer_pool;
pub mod cache;
pub mod config;
pub mod dns;
pub mod domain;
pub mod errors;
pub mod geo;
pub mod metrics;
pub mod parser;
pub mod tld_mappings;
pub mod tls;
pub mod types;
pub mod whois;
pub mod whoisxml;

#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for easy access
pub use aggregator::{DomainIntel, Providers, WhoisResolver};
pub use cache::CacheService;
pub use config::Config;
pub use errors::IntelError;
pub use types::{DomainLookupResult, FailureReason, LookupFailure, LookupKind};

use std::sync::Arc;

/// High-level client: the aggregator plus an optional result cache.
#[derive(Clone)]
pub struct DomainIntelClient {
    intel: Arc<DomainIntel>,
    cache: Option<Arc<CacheService>>,
}

/// A lookup result and where it came from.
#[derive(Debug, Clone)]
pub struct LookupResponse {
    pub domain_info: DomainLookupResult,
    pub cached: bool,
    pub query_time_ms: u64,
}

impl DomainIntelClient {
    /// Create a client from the environment configuration
    pub fn new() -> Result<Self, IntelError> {
        let config = Arc::new(Config::load()?);
        Self::new_with_config(config)
    }

    pub fn new_with_config(config: Arc<Config>) -> Result<Self, IntelError> {
        let intel = Arc::new(DomainIntel::new(Arc::clone(&config))?);
        Ok(Self::from_parts(intel, &config))
    }

    /// Wrap an already built aggregator, caching according to `config`.
    pub fn from_parts(intel: Arc<DomainIntel>, config: &Config) -> Self {
        Self {
            intel,
            cache: CacheService::new(config).map(Arc::new),
        }
    }

    pub fn without_cache(intel: Arc<DomainIntel>) -> Self {
        Self { intel, cache: None }
    }

    pub async fn lookup(&self, domain: &str) -> Result<LookupResponse, IntelError> {
        self.lookup_with_options(domain, false).await
    }

    /// Bypass the cache; the fresh result still replaces the cached one.
    pub async fn lookup_fresh(&self, domain: &str) -> Result<LookupResponse, IntelError> {
        self.lookup_with_options(domain, true).await
    }

    pub async fn lookup_with_options(
        &self,
        domain: &str,
        fresh: bool,
    ) -> Result<LookupResponse, IntelError> {
        let start_time = std::time::Instant::now();
        let normalized_domain = domain::validate_domain(domain)?;

        if !fresh {
            if let Some(cache) = &self.cache {
                if let Some(mut cached) = cache.get(&normalized_domain).await {
                    // Stored results keep their expiry date, not the day count
                    cached.dates.refresh_expires_in_days(chrono::Utc::now());
                    return Ok(LookupResponse {
                        domain_info: cached,
                        cached: true,
                        query_time_ms: start_time.elapsed().as_millis() as u64,
                    });
                }
            }
        }

        let domain_info = self.intel.lookup_domain(&normalized_domain).await?;

        if let Some(cache) = &self.cache {
            cache.set(&normalized_domain, &domain_info).await;
        }

        Ok(LookupResponse {
            domain_info,
            cached: false,
            query_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}
