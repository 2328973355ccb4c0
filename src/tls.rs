//! Leaf certificate probe over a direct TLS handshake on port 443.

use async_trait::async_trait;
use chrono::DateTime;
use rustls::{crypto::CryptoProvider, ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};
use x509_parser::{
    objects::{oid2sn, oid_registry},
    prelude::*,
    public_key::PublicKey,
};

use crate::{config::Config, errors::IntelError, types::SslInfo};

const HTTPS_PORT: u16 = 443;
const VALIDITY_FORMAT: &str = "%b %e %H:%M:%S %Y GMT";

#[async_trait]
pub trait CertificateProvider: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<SslInfo, IntelError>;
}

/// Connects with SNI set to the domain, reads the peer's leaf certificate and closes.
pub struct RustlsProbe {
    connector: TlsConnector,
    config: Arc<Config>,
}

// Err only means a provider is already installed.
fn ensure_crypto_provider() {
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
}

impl RustlsProbe {
    pub fn new(config: Arc<Config>) -> Self {
        ensure_crypto_provider();

        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let client_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self {
            connector: TlsConnector::from(Arc::new(client_config)),
            config,
        }
    }

    async fn leaf_certificate(&self, domain: &str) -> Result<Vec<u8>, IntelError> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|_| IntelError::Tls(format!("Invalid server name: {}", domain)))?;

        let limit = self.config.tls_timeout();
        let stream = timeout(limit, TcpStream::connect((domain, HTTPS_PORT))).await??;
        trace!("[SSL] TCP connected to {}", domain);

        let mut tls_stream = timeout(limit, self.connector.connect(server_name, stream))
            .await?
            .map_err(|e| IntelError::Tls(e.to_string()))?;

        let leaf = {
            let (_, connection) = tls_stream.get_ref();
            connection
                .peer_certificates()
                .and_then(|certs| certs.first())
                .map(|cert| cert.as_ref().to_vec())
        };

        if let Err(e) = tls_stream.shutdown().await {
            debug!("[SSL] Shutdown after handshake with {} failed: {}", domain, e);
        }

        leaf.ok_or_else(|| IntelError::Tls("No peer certificate presented".to_string()))
    }
}

#[async_trait]
impl CertificateProvider for RustlsProbe {
    async fn fetch(&self, domain: &str) -> Result<SslInfo, IntelError> {
        let der = self.leaf_certificate(domain).await?;
        let info = summarize_certificate(&der)?;
        debug!("[SSL] {} issued by {} until {}", domain, info.issuer, info.valid_to);
        Ok(info)
    }
}

/// Extract the summary fields from a DER-encoded certificate.
pub fn summarize_certificate(der: &[u8]) -> Result<SslInfo, IntelError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| IntelError::Parse(format!("Certificate parsing failed: {}", e)))?;

    // Signature algorithm of the certificate, not the key curve
    let signature_oid = &cert.signature_algorithm.algorithm;
    let signature_algorithm = oid2sn(signature_oid, oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| signature_oid.to_id_string());

    Ok(SslInfo {
        issuer: first_attr(cert.issuer().iter_organization()),
        issuer_country: first_attr(cert.issuer().iter_country()),
        valid_from: format_validity(cert.validity().not_before.timestamp()),
        valid_to: format_validity(cert.validity().not_after.timestamp()),
        subject: first_attr(cert.subject().iter_common_name()),
        fingerprint: format_fingerprint(der),
        signature_algorithm,
        key_size: key_size_bits(cert.public_key()),
    })
}

fn first_attr<'a, 'b>(mut attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>) -> String
where
    'b: 'a,
{
    attrs
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn key_size_bits(spki: &SubjectPublicKeyInfo) -> u32 {
    let bits = match spki.parsed() {
        Ok(PublicKey::RSA(rsa)) => rsa.key_size(),
        Ok(PublicKey::EC(ec)) => ec.key_size(),
        _ => spki.subject_public_key.data.len() * 8,
    };
    u32::try_from(bits).unwrap_or(u32::MAX)
}

/// `Mar  1 12:00:00 2025 GMT`
pub fn format_validity(unix_seconds: i64) -> String {
    DateTime::from_timestamp(unix_seconds, 0)
        .map(|dt| dt.format(VALIDITY_FORMAT).to_string())
        .unwrap_or_default()
}

/// SHA-256 (not SHA-1) of the DER bytes as colon-separated uppercase hex.
pub fn format_fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fingerprint() {
        let fingerprint = format_fingerprint(b"");
        assert!(fingerprint.starts_with("E3:B0:C4:42:98:FC"));
        assert_eq!(fingerprint.split(':').count(), 32);
        assert_eq!(fingerprint, fingerprint.to_uppercase());
    }

    #[test]
    fn test_format_validity() {
        // 2025-03-01T12:00:00Z
        assert_eq!(format_validity(1_740_830_400), "Mar  1 12:00:00 2025 GMT");
        assert_eq!(format_validity(1_765_800_000), "Dec 15 12:00:00 2025 GMT");
    }

    // Self-signed fixtures: C=US, O=Example Trust Services, CN=rsa.example.com (RSA-2048)
    // and C=DE, O=Example EC Authority, CN=ec.example.org (P-256).
    const RSA_2048_CERT: &[u8] = include_bytes!("../testdata/rsa2048.der");
    const P256_CERT: &[u8] = include_bytes!("../testdata/p256.der");

    #[test]
    fn test_summarize_rsa_certificate() {
        let info = summarize_certificate(RSA_2048_CERT).unwrap();
        assert_eq!(
            info,
            SslInfo {
                issuer: "Example Trust Services".to_string(),
                issuer_country: "US".to_string(),
                valid_from: "Mar  1 12:00:00 2025 GMT".to_string(),
                valid_to: "Dec 15 12:00:00 2035 GMT".to_string(),
                subject: "rsa.example.com".to_string(),
                fingerprint: "6B:B5:5F:AB:8F:C6:12:A4:7D:A5:C2:69:09:62:FF:63:46:0F:B6:A0:8A:52:C2:17:42:19:E4:E6:38:C5:95:C3".to_string(),
                signature_algorithm: "sha256WithRSAEncryption".to_string(),
                key_size: 2048,
            }
        );
    }

    #[test]
    fn test_summarize_ec_certificate() {
        let info = summarize_certificate(P256_CERT).unwrap();
        assert_eq!(
            info,
            SslInfo {
                issuer: "Example EC Authority".to_string(),
                issuer_country: "DE".to_string(),
                valid_from: "Jan  1 00:00:00 2024 GMT".to_string(),
                valid_to: "Jan  1 00:00:00 2034 GMT".to_string(),
                subject: "ec.example.org".to_string(),
                fingerprint: "87:40:16:5D:E3:9D:20:65:D7:E4:94:D6:55:3D:38:C9:2B:5B:59:64:52:A0:16:99:46:89:A5:0D:A9:45:0B:26".to_string(),
                signature_algorithm: "ecdsa-with-SHA256".to_string(),
                key_size: 256,
            }
        );
    }

    #[test]
    fn test_garbage_certificate_is_parse_error() {
        assert!(matches!(
            summarize_certificate(b"not a certificate"),
            Err(IntelError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_server_name_rejected() {
        let probe = RustlsProbe::new(Arc::new(Config::default()));
        let result = probe.fetch("bad name with spaces").await;
        assert!(matches!(result, Err(IntelError::Tls(_))));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_real_certificate() {
        let probe = RustlsProbe::new(Arc::new(Config::default()));
        let info = probe.fetch("example.com").await.unwrap();
        assert!(!info.issuer.is_empty());
        assert!(info.key_size > 0);
        assert!(info.valid_to.ends_with("GMT"));
    }
}
