use async_trait::async_trait;
use publicsuffix::Psl;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{RwLock, Semaphore},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    buffer_pool::BufferPool,
    config::Config,
    domain::SUFFIX_LIST,
    errors::IntelError,
    parser::WhoisParser,
    tld_mappings::known_whois_server,
    types::WhoisRecord,
};

/// A source of WHOIS data for a (parent) domain.
#[async_trait]
pub trait WhoisProvider: Send + Sync {
    async fn query(&self, domain: &str) -> Result<WhoisRecord, IntelError>;
}

const IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// Port-43 WHOIS client with TLD server discovery and referral following.
pub struct WhoisService {
    config: Arc<Config>,
    tld_servers: RwLock<HashMap<String, String>>,
    domain_query_semaphore: Semaphore,  // For actual domain lookups
    discovery_semaphore: Semaphore,     // For TLD discovery (higher limit)
    buffer_pool: Arc<BufferPool>,
}

impl WhoisService {
    pub fn new(config: Arc<Config>) -> Self {
        info!(
            "WhoisService initialized, buffer pool: {} buffers of {} bytes",
            config.buffer_pool_size, config.buffer_size
        );

        Self {
            tld_servers: RwLock::new(HashMap::new()),
            domain_query_semaphore: Semaphore::new(config.concurrent_whois_queries),
            discovery_semaphore: Semaphore::new(config.concurrent_whois_queries * 2),
            buffer_pool: BufferPool::new(config.buffer_size, config.buffer_pool_size),
            config,
        }
    }

    /// Raw text and the server that produced it, after following referrals.
    pub async fn lookup_raw(&self, domain: &str) -> Result<(String, String), IntelError> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() || !domain.contains('.') {
            return Err(IntelError::InvalidDomain(domain));
        }

        let tld = Self::extract_tld(&domain);
        let whois_server = self.find_whois_server(&tld).await?;
        let raw_data = self.raw_whois_query(&whois_server, &domain).await?;

        self.follow_referrals(&whois_server, raw_data, &domain).await
    }

    /// Public suffix of the domain, falling back to the last label.
    fn extract_tld(domain: &str) -> String {
        SUFFIX_LIST
            .suffix(domain.as_bytes())
            .and_then(|suffix| std::str::from_utf8(suffix.as_bytes()).ok().map(str::to_string))
            .unwrap_or_else(|| {
                warn!("Public suffix parsing failed for {}, using last label", domain);
                domain.rsplit('.').next().unwrap_or(domain).to_string()
            })
    }

    async fn find_whois_server(&self, tld: &str) -> Result<String, IntelError> {
        if let Some(server) = known_whois_server(tld) {
            return Ok(server.to_string());
        }

        if let Some(server) = self.tld_servers.read().await.get(tld) {
            return Ok(server.clone());
        }

        if let Some(server) = self.discover_whois_server(tld).await {
            self.tld_servers
                .write()
                .await
                .insert(tld.to_string(), server.clone());
            return Ok(server);
        }

        Err(IntelError::UnsupportedTld(tld.to_string()))
    }

    async fn discover_whois_server(&self, tld: &str) -> Option<String> {
        debug!("Discovering whois server for TLD: {}", tld);

        if let Some(server) = self.query_root_for_tld(tld).await {
            if self.test_whois_server(&server).await {
                info!("Discovered whois server via IANA for {}: {}", tld, server);
                return Some(server);
            }
        }

        for pattern in Self::generate_whois_patterns(tld) {
            if self.test_whois_server(&pattern).await {
                info!("Discovered whois server via pattern for {}: {}", tld, pattern);
                return Some(pattern);
            }
        }

        warn!("Could not discover whois server for TLD: {}", tld);
        None
    }

    fn generate_whois_patterns(tld: &str) -> Vec<String> {
        let mut patterns = vec![format!("whois.nic.{}", tld), format!("whois.{}", tld)];

        if tld.len() == 2 {
            patterns.push(format!("whois.domain.{}", tld));
            patterns.push(format!("whois.dns.{}", tld));
        }
        patterns.push(format!("whois.registry.{}", tld));

        patterns
    }

    async fn query_root_for_tld(&self, tld: &str) -> Option<String> {
        let _permit = self.discovery_semaphore.acquire().await.ok()?;

        match self.execute_whois_query(IANA_WHOIS_SERVER, tld).await {
            Ok(response) => Self::extract_whois_server(&response),
            Err(e) => {
                debug!("Failed to query {} for {}: {}", IANA_WHOIS_SERVER, tld, e);
                None
            }
        }
    }

    async fn test_whois_server(&self, server: &str) -> bool {
        let limit = Duration::from_secs(self.config.discovery_timeout_seconds.min(10));
        matches!(
            timeout(limit, TcpStream::connect((server, self.config.whois_port))).await,
            Ok(Ok(_))
        )
    }

    async fn raw_whois_query(&self, server: &str, query: &str) -> Result<String, IntelError> {
        let _permit = self
            .domain_query_semaphore
            .acquire()
            .await
            .map_err(|_| IntelError::Internal("WHOIS semaphore closed".to_string()))?;

        self.execute_whois_query(server, query).await
    }

    async fn execute_whois_query(&self, server: &str, query: &str) -> Result<String, IntelError> {
        let limit = self.config.whois_timeout();
        let mut stream =
            timeout(limit, TcpStream::connect((server, self.config.whois_port))).await??;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        stream.write_all(format!("{}\r\n", query).as_bytes()).await?;

        let mut pooled_buffer = self.buffer_pool.checkout();
        let buffer = pooled_buffer.as_mut();
        let mut response = Vec::new();

        loop {
            let n = timeout(limit, stream.read(buffer)).await??;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buffer[..n]);
            if response.len() > self.config.max_response_size {
                return Err(IntelError::ResponseTooLarge);
            }
        }

        // Registries occasionally answer in Latin-1
        Ok(match String::from_utf8(response) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    async fn follow_referrals(
        &self,
        initial_server: &str,
        initial_data: String,
        domain: &str,
    ) -> Result<(String, String), IntelError> {
        let mut current_server = initial_server.to_string();
        let mut current_data = initial_data;

        for _ in 0..self.config.max_referrals {
            let Some(referral) = Self::extract_whois_server(&current_data) else {
                break;
            };
            if referral.eq_ignore_ascii_case(&current_server) {
                break;
            }

            debug!("Following referral from {} to {}", current_server, referral);
            match self.raw_whois_query(&referral, domain).await {
                // Registrar servers sometimes answer with nothing useful
                Ok(data) if !WhoisParser::parse(&data).is_empty() => {
                    current_server = referral;
                    current_data = data;
                }
                Ok(_) => break,
                Err(e) => {
                    warn!("Failed to query referral server {}: {}", referral, e);
                    break;
                }
            }
        }

        Ok((current_server, current_data))
    }

    fn extract_whois_server(data: &str) -> Option<String> {
        data.lines().find_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            let key = key.trim().to_lowercase();
            let value = value
                .trim()
                .trim_start_matches("whois://")
                .trim_start_matches("rwhois://")
                .trim_end_matches('/');

            let is_referral =
                (key.contains("whois") && key.contains("server")) || key == "refer" || key == "whois";
            (is_referral && !value.is_empty()).then(|| value.to_string())
        })
    }
}

#[async_trait]
impl WhoisProvider for WhoisService {
    async fn query(&self, domain: &str) -> Result<WhoisRecord, IntelError> {
        let (server, raw) = self.lookup_raw(domain).await?;
        let fields = WhoisParser::parse(&raw);
        debug!("WHOIS {} answered {} fields for {}", server, fields.len(), domain);

        Ok(WhoisRecord {
            source: server,
            fields,
            backup: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn fake_whois_server(reply: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut query = [0u8; 256];
                let _ = socket.read(&mut query).await;
                let _ = socket.write_all(reply).await;
            }
        });
        port
    }

    fn service_on(port: u16, max_response_size: usize) -> WhoisService {
        let config = Config {
            whois_port: port,
            whois_timeout_seconds: 2,
            max_response_size,
            ..Config::default()
        };
        WhoisService::new(Arc::new(config))
    }

    #[test]
    fn test_extract_whois_server() {
        let data = "Domain Name: EXAMPLE.COM\nRegistrar WHOIS Server: whois.markmonitor.com\n";
        assert_eq!(
            WhoisService::extract_whois_server(data),
            Some("whois.markmonitor.com".to_string())
        );
        assert_eq!(
            WhoisService::extract_whois_server("refer: whois.verisign-grs.com"),
            Some("whois.verisign-grs.com".to_string())
        );
        assert_eq!(WhoisService::extract_whois_server("Domain Name: x.com"), None);
        assert_eq!(WhoisService::extract_whois_server("Registrar WHOIS Server:"), None);
    }

    #[test]
    fn test_extract_tld_uses_suffix_list() {
        assert_eq!(WhoisService::extract_tld("example.com"), "com");
        assert_eq!(WhoisService::extract_tld("example.co.uk"), "co.uk");
        assert_eq!(WhoisService::extract_tld("www.example.com.mx"), "com.mx");
        assert_eq!(WhoisService::extract_tld("user.github.io"), "io");
    }

    #[test]
    fn test_generate_patterns() {
        let cc = WhoisService::generate_whois_patterns("xy");
        assert_eq!(cc[0], "whois.nic.xy");
        assert!(cc.contains(&"whois.dns.xy".to_string()));

        let generic = WhoisService::generate_whois_patterns("example");
        assert!(!generic.contains(&"whois.dns.example".to_string()));
    }

    #[tokio::test]
    async fn test_execute_query_against_local_server() {
        let port = fake_whois_server(b"Domain Name: EXAMPLE.COM\r\nRegistrar: Test Registrar\r\n").await;
        let service = service_on(port, 1024 * 1024);

        let raw = service
            .execute_whois_query("127.0.0.1", "example.com")
            .await
            .unwrap();
        let fields = WhoisParser::parse(&raw);
        assert_eq!(fields.get("registrar"), Some("Test Registrar"));
    }

    #[tokio::test]
    async fn test_execute_query_rejects_oversized_response() {
        let port = fake_whois_server(&[b'a'; 4096]).await;
        let service = service_on(port, 1024);

        let result = service.execute_whois_query("127.0.0.1", "example.com").await;
        assert!(matches!(result, Err(IntelError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_invalid_domain_rejected() {
        let service = service_on(43, 1024);
        assert!(matches!(
            service.lookup_raw("localhost").await,
            Err(IntelError::InvalidDomain(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_whois_lookup_real() {
        let service = WhoisService::new(Arc::new(Config::default()));
        let record = service.query("example.com").await.unwrap();
        assert!(!record.fields.is_empty());
    }
}
