//! DNS lookups backing the address and record fields of a lookup result.

use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    ResolveError, TokioResolver,
};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{config::Config, errors::IntelError};

/// Raw MX answer before display formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

/// Record lookups for a single name. A name that exists but has no records of
/// the requested type answers with an empty list; NXDOMAIN is still an error.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn ipv4(&self, domain: &str) -> Result<Vec<String>, IntelError>;
    async fn ipv6(&self, domain: &str) -> Result<Vec<String>, IntelError>;
    async fn mx(&self, domain: &str) -> Result<Vec<MxRecord>, IntelError>;
    /// Each record as its list of character-string chunks.
    async fn txt(&self, domain: &str) -> Result<Vec<Vec<String>>, IntelError>;
    async fn ns(&self, domain: &str) -> Result<Vec<String>, IntelError>;
}

pub struct HickoryDns {
    resolver: TokioResolver,
}

impl HickoryDns {
    pub fn new(config: &Config) -> Self {
        Self {
            resolver: Self::build_resolver(config.dns_timeout()),
        }
    }

    /// System resolver configuration, or the default upstream set when it cannot be read.
    fn build_resolver(timeout: Duration) -> TokioResolver {
        match TokioResolver::builder_tokio() {
            Ok(mut builder) => {
                builder.options_mut().timeout = timeout;
                return builder.build();
            }
            Err(e) => {
                warn!("Failed to load system DNS configuration, using defaults: {}", e);
            }
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        TokioResolver::builder_with_config(ResolverConfig::default(), TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }
}

fn resolution_error(kind: &str, domain: &str, e: ResolveError) -> IntelError {
    debug!("{} lookup failed for {}: {}", kind, domain, e);
    IntelError::Resolution(e.to_string())
}

/// Map a resolver answer, treating an empty NOERROR answer as no records.
fn collect_answer<L, T>(
    kind: &str,
    domain: &str,
    result: Result<L, ResolveError>,
    map: impl FnOnce(L) -> Vec<T>,
) -> Result<Vec<T>, IntelError> {
    match result {
        Ok(lookup) => Ok(map(lookup)),
        Err(e) if e.is_no_records_found() && !e.is_nx_domain() => {
            debug!("No {} records for {}", kind, domain);
            Ok(Vec::new())
        }
        Err(e) => Err(resolution_error(kind, domain, e)),
    }
}

fn trim_root(name: String) -> String {
    match name.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

#[async_trait]
impl DnsProvider for HickoryDns {
    async fn ipv4(&self, domain: &str) -> Result<Vec<String>, IntelError> {
        let result = self.resolver.ipv4_lookup(domain).await;
        collect_answer("A", domain, result, |answer| {
            answer.iter().map(|a| a.to_string()).collect()
        })
    }

    async fn ipv6(&self, domain: &str) -> Result<Vec<String>, IntelError> {
        let result = self.resolver.ipv6_lookup(domain).await;
        collect_answer("AAAA", domain, result, |answer| {
            answer.iter().map(|aaaa| aaaa.to_string()).collect()
        })
    }

    async fn mx(&self, domain: &str) -> Result<Vec<MxRecord>, IntelError> {
        let result = self.resolver.mx_lookup(domain).await;
        collect_answer("MX", domain, result, |answer| {
            answer
                .iter()
                .map(|mx| MxRecord {
                    exchange: mx.exchange().to_string(),
                    priority: mx.preference(),
                })
                .collect()
        })
    }

    async fn txt(&self, domain: &str) -> Result<Vec<Vec<String>>, IntelError> {
        let result = self.resolver.txt_lookup(domain).await;
        collect_answer("TXT", domain, result, |answer| {
            answer
                .iter()
                .map(|txt| {
                    txt.iter()
                        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                        .collect()
                })
                .collect()
        })
    }

    async fn ns(&self, domain: &str) -> Result<Vec<String>, IntelError> {
        let result = self.resolver.ns_lookup(domain).await;
        collect_answer("NS", domain, result, |answer| {
            answer.iter().map(|ns| trim_root(ns.to_string())).collect()
        })
    }
}
