use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::domain::ParentDomainStrategy;

pub const DEFAULT_WHOISXML_ENDPOINT: &str = "https://www.whoisxmlapi.com/whoisserver/WhoisService";
pub const DEFAULT_GEOLOCATION_ENDPOINT: &str = "http://ip-api.com/json";

/// Service configuration, passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub whois_port: u16,
    pub whois_timeout_seconds: u64,
    pub discovery_timeout_seconds: u64,
    pub max_response_size: usize,
    pub max_referrals: usize,
    pub concurrent_whois_queries: usize,
    pub buffer_pool_size: usize,    // Max buffers in pool
    pub buffer_size: usize,         // Size of each buffer
    pub cache_ttl_seconds: u64,     // 0 disables the result cache
    pub cache_max_entries: u64,
    pub whoisxml_api_key: Option<String>,
    pub whoisxml_endpoint: String,
    pub geolocation_endpoint: String,
    pub dns_timeout_seconds: u64,
    pub tls_timeout_seconds: u64,
    pub http_timeout_seconds: u64,
    pub parent_domain_strategy: ParentDomainStrategy,
    pub auth_tokens: Vec<String>,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub port: u16,
    pub whois_port: u16,
    pub whois_timeout_seconds: u64,
    pub discovery_timeout_seconds: u64,
    pub max_response_size: usize,
    pub max_referrals: usize,
    pub concurrent_whois_queries: usize,
    pub buffer_pool_size: usize,
    pub buffer_size: usize,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    #[serde(default)]
    pub whoisxml_api_key: Option<String>,
    pub whoisxml_endpoint: String,
    pub geolocation_endpoint: String,
    pub dns_timeout_seconds: u64,
    pub tls_timeout_seconds: u64,
    pub http_timeout_seconds: u64,
    pub parent_domain_strategy: ParentDomainStrategy,
    #[serde(default)]
    pub auth_tokens: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_capabilities(&SystemCapabilities::development())
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let system_info = Self::detect_system_capabilities();
        let defaults = Self::from_capabilities(&system_info);

        let mut settings = config::Config::builder()
            .set_default("port", Self::get_default_port())?
            .set_default("whois_port", defaults.whois_port)?
            .set_default("whois_timeout_seconds", defaults.whois_timeout_seconds)?
            .set_default("discovery_timeout_seconds", defaults.discovery_timeout_seconds)?
            .set_default("max_response_size", defaults.max_response_size as i64)?
            .set_default("max_referrals", defaults.max_referrals as i64)?
            .set_default("concurrent_whois_queries", defaults.concurrent_whois_queries as i64)?
            .set_default("buffer_pool_size", defaults.buffer_pool_size as i64)?
            .set_default("buffer_size", defaults.buffer_size as i64)?
            .set_default("cache_ttl_seconds", defaults.cache_ttl_seconds)?
            .set_default("cache_max_entries", defaults.cache_max_entries)?
            .set_default("whoisxml_endpoint", defaults.whoisxml_endpoint.clone())?
            .set_default("geolocation_endpoint", defaults.geolocation_endpoint.clone())?
            .set_default("dns_timeout_seconds", defaults.dns_timeout_seconds)?
            .set_default("tls_timeout_seconds", defaults.tls_timeout_seconds)?
            .set_default("http_timeout_seconds", defaults.http_timeout_seconds)?
            .set_default("parent_domain_strategy", "heuristic")?
            .set_default("auth_tokens", "")?;

        settings = Self::apply_env_overrides(settings)?;

        let data: ConfigData = settings.build()?.try_deserialize()?;

        Ok(Config {
            port: data.port,
            whois_port: data.whois_port,
            whois_timeout_seconds: data.whois_timeout_seconds,
            discovery_timeout_seconds: data.discovery_timeout_seconds,
            max_response_size: data.max_response_size,
            max_referrals: data.max_referrals,
            concurrent_whois_queries: data.concurrent_whois_queries.max(1),
            buffer_pool_size: data.buffer_pool_size,
            buffer_size: data.buffer_size.max(512),
            cache_ttl_seconds: data.cache_ttl_seconds,
            cache_max_entries: data.cache_max_entries,
            whoisxml_api_key: data.whoisxml_api_key.filter(|key| !key.trim().is_empty()),
            whoisxml_endpoint: data.whoisxml_endpoint,
            geolocation_endpoint: data.geolocation_endpoint,
            dns_timeout_seconds: data.dns_timeout_seconds,
            tls_timeout_seconds: data.tls_timeout_seconds,
            http_timeout_seconds: data.http_timeout_seconds,
            parent_domain_strategy: data.parent_domain_strategy,
            auth_tokens: Self::split_tokens(&data.auth_tokens),
            start_time: Instant::now(),
        })
    }

    fn from_capabilities(system_info: &SystemCapabilities) -> Self {
        Config {
            port: 3000,
            whois_port: 43,
            whois_timeout_seconds: system_info.default_timeout,
            discovery_timeout_seconds: system_info.discovery_timeout,
            max_response_size: system_info.max_response_size,
            max_referrals: system_info.max_referrals,
            concurrent_whois_queries: system_info.concurrent_whois_queries,
            buffer_pool_size: system_info.buffer_pool_size,
            buffer_size: system_info.buffer_size,
            cache_ttl_seconds: system_info.cache_ttl,
            cache_max_entries: system_info.cache_max_entries,
            whoisxml_api_key: None,
            whoisxml_endpoint: DEFAULT_WHOISXML_ENDPOINT.to_string(),
            geolocation_endpoint: DEFAULT_GEOLOCATION_ENDPOINT.to_string(),
            dns_timeout_seconds: system_info.lookup_timeout,
            tls_timeout_seconds: system_info.lookup_timeout,
            http_timeout_seconds: system_info.lookup_timeout,
            parent_domain_strategy: ParentDomainStrategy::Heuristic,
            auth_tokens: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_seconds)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_seconds)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    fn split_tokens(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn detect_system_capabilities() -> SystemCapabilities {
        let available_memory = Self::get_available_memory();
        let cpu_cores = Self::get_cpu_cores();

        if Self::is_production_environment() {
            SystemCapabilities {
                default_timeout: 30,
                discovery_timeout: 20,
                lookup_timeout: 10,
                max_response_size: Self::calculate_max_response_size(available_memory),
                cache_ttl: 3600,
                cache_max_entries: Self::calculate_cache_size(available_memory),
                max_referrals: 10,
                concurrent_whois_queries: cpu_cores.min(8), // Cap at 8 for network sanity
                buffer_pool_size: Self::calculate_buffer_pool_size(available_memory),
                buffer_size: Self::calculate_buffer_size(available_memory),
            }
        } else {
            SystemCapabilities {
                concurrent_whois_queries: cpu_cores.min(8),
                max_response_size: Self::calculate_max_response_size(available_memory),
                cache_max_entries: Self::calculate_cache_size(available_memory),
                buffer_pool_size: Self::calculate_buffer_pool_size(available_memory),
                buffer_size: Self::calculate_buffer_size(available_memory),
                ..SystemCapabilities::development()
            }
        }
    }

    fn get_available_memory() -> u64 {
        #[cfg(target_os = "linux")]
        {
            if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
                for line in meminfo.lines() {
                    if let Some(rest) = line.strip_prefix("MemAvailable:") {
                        if let Some(kb_val) = rest
                            .split_whitespace()
                            .next()
                            .and_then(|kb| kb.parse::<u64>().ok())
                        {
                            return kb_val * 1024;
                        }
                    }
                }
            }
        }

        // Assume 4GB when unknown
        4 * 1024 * 1024 * 1024
    }

    fn get_cpu_cores() -> usize {
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4)
    }

    fn is_production_environment() -> bool {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .map(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
            .unwrap_or(false)
    }

    fn calculate_max_response_size(available_memory: u64) -> usize {
        // 0.1% of available memory, between 1MB and 10MB
        let calculated = (available_memory as f64 * 0.001) as usize;
        calculated.clamp(1024 * 1024, 10 * 1024 * 1024)
    }

    fn calculate_cache_size(available_memory: u64) -> u64 {
        let gb = available_memory / (1024 * 1024 * 1024);
        match gb {
            0..=2 => 500,
            3..=8 => 2000,
            9..=16 => 5000,
            _ => 10000,
        }
    }

    fn calculate_buffer_pool_size(available_memory: u64) -> usize {
        let gb = available_memory / (1024 * 1024 * 1024);
        match gb {
            0..=2 => 10,
            3..=8 => 50,
            9..=16 => 100,
            _ => 200,
        }
    }

    fn calculate_buffer_size(available_memory: u64) -> usize {
        let gb = available_memory / (1024 * 1024 * 1024);
        match gb {
            0..=2 => 4096,
            3..=8 => 8192,
            9..=16 => 16384,
            _ => 32768,
        }
    }

    fn get_default_port() -> u16 {
        std::env::var("PORT")
            .or_else(|_| std::env::var("HTTP_PORT"))
            .or_else(|_| std::env::var("SERVER_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000)
    }

    fn apply_env_overrides(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("PORT", "port"),
            ("WHOIS_PORT", "whois_port"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("DISCOVERY_TIMEOUT_SECONDS", "discovery_timeout_seconds"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
            ("MAX_REFERRALS", "max_referrals"),
            ("CONCURRENT_WHOIS_QUERIES", "concurrent_whois_queries"),
            ("BUFFER_POOL_SIZE", "buffer_pool_size"),
            ("BUFFER_SIZE", "buffer_size"),
            ("CACHE_TTL_SECONDS", "cache_ttl_seconds"),
            ("CACHE_TTL", "cache_ttl_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("WHOISXML_API_KEY", "whoisxml_api_key"),
            ("WHOISXML_ENDPOINT", "whoisxml_endpoint"),
            ("GEOLOCATION_ENDPOINT", "geolocation_endpoint"),
            ("DNS_TIMEOUT_SECONDS", "dns_timeout_seconds"),
            ("TLS_TIMEOUT_SECONDS", "tls_timeout_seconds"),
            ("HTTP_TIMEOUT_SECONDS", "http_timeout_seconds"),
            ("PARENT_DOMAIN_STRATEGY", "parent_domain_strategy"),
            ("AUTH_TOKENS", "auth_tokens"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }
}

struct SystemCapabilities {
    default_timeout: u64,
    discovery_timeout: u64,
    lookup_timeout: u64,
    max_response_size: usize,
    cache_ttl: u64,
    cache_max_entries: u64,
    max_referrals: usize,
    concurrent_whois_queries: usize,
    buffer_pool_size: usize,
    buffer_size: usize,
}

impl SystemCapabilities {
    fn development() -> Self {
        Self {
            default_timeout: 15,
            discovery_timeout: 10,
            lookup_timeout: 5,
            max_response_size: 1024 * 1024,
            cache_ttl: 1800,
            cache_max_entries: 1000,
            max_referrals: 5,
            concurrent_whois_queries: 4,
            buffer_pool_size: 10,
            buffer_size: 4096,
        }
    }
}
