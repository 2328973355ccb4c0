//! Hand-written providers for exercising the aggregator without the network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    aggregator::Providers,
    dns::{DnsProvider, MxRecord},
    errors::IntelError,
    geo::GeoProvider,
    tls::CertificateProvider,
    types::{HostInfo, SslInfo, WhoisFields, WhoisRecord},
    whois::WhoisProvider,
};

pub fn sample_fields() -> WhoisFields {
    let mut fields = WhoisFields::new();
    for (key, value) in [
        ("domainName", "EXAMPLE.COM"),
        ("registrar", "Example Registrar, Inc."),
        ("registrarIanaId", "292"),
        ("registrarUrl", "http://www.example-registrar.com"),
        ("registryDomainId", "2336799_DOMAIN_COM-VRSN"),
        ("registryExpiryDate", "2030-08-13T04:00:00Z"),
        ("updatedDate", "2024-08-14T07:01:34Z"),
        ("creationDate", "1995-08-14T04:00:00Z"),
        ("registrantOrganization", "Example Org"),
        ("registrantCountry", "US"),
        ("registrarAbuseContactEmail", "abuse@example-registrar.com"),
        ("registrarAbuseContactPhone", "+1.5555551234"),
        ("dnssec", "signedDelegation"),
        ("domainStatus", "clientTransferProhibited https://icann.org/epp#clientTransferProhibited"),
        ("domainStatus", "clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited"),
    ] {
        fields.append(key.to_string(), value);
    }
    fields
}

pub struct MockWhois {
    record: Option<WhoisRecord>,
    calls: AtomicUsize,
    queried: Mutex<Vec<String>>,
}

impl MockWhois {
    pub fn answering(record: WhoisRecord) -> Arc<Self> {
        Arc::new(Self {
            record: Some(record),
            calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        })
    }

    pub fn with_fields(fields: WhoisFields) -> Arc<Self> {
        Self::answering(WhoisRecord {
            source: "whois.mock".to_string(),
            fields,
            backup: None,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            record: None,
            calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl WhoisProvider for MockWhois {
    async fn query(&self, domain: &str) -> Result<WhoisRecord, IntelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(domain.to_string());
        self.record
            .clone()
            .ok_or_else(|| IntelError::NotFound(format!("no WHOIS for {}", domain)))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Answer,
    Fail,
    Hang,
    Panic,
}

async fn act(behavior: Behavior) -> Result<(), IntelError> {
    match behavior {
        Behavior::Answer => Ok(()),
        Behavior::Fail => Err(IntelError::Resolution("simulated network failure".to_string())),
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
        Behavior::Panic => panic!("simulated provider panic"),
    }
}

pub struct MockDns {
    behavior: Behavior,
    ipv4: Vec<String>,
}

impl MockDns {
    pub fn answering() -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Answer,
            ipv4: vec!["93.184.215.14".to_string(), "93.184.215.15".to_string()],
        })
    }

    pub fn without_ipv4() -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Answer,
            ipv4: Vec::new(),
        })
    }

    pub fn behaving(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ipv4: vec!["93.184.215.14".to_string()],
        })
    }
}

#[async_trait]
impl DnsProvider for MockDns {
    async fn ipv4(&self, _domain: &str) -> Result<Vec<String>, IntelError> {
        act(self.behavior).await?;
        Ok(self.ipv4.clone())
    }

    async fn ipv6(&self, _domain: &str) -> Result<Vec<String>, IntelError> {
        act(self.behavior).await?;
        Ok(vec!["2606:2800:21f:cb07:6820:80da:af6b:8b2c".to_string()])
    }

    async fn mx(&self, _domain: &str) -> Result<Vec<MxRecord>, IntelError> {
        act(self.behavior).await?;
        Ok(vec![MxRecord {
            exchange: "mail.example.com.".to_string(),
            priority: 10,
        }])
    }

    async fn txt(&self, _domain: &str) -> Result<Vec<Vec<String>>, IntelError> {
        act(self.behavior).await?;
        Ok(vec![
            vec!["v=spf1 -all".to_string()],
            vec!["part one".to_string(), "part two".to_string()],
        ])
    }

    async fn ns(&self, _domain: &str) -> Result<Vec<String>, IntelError> {
        act(self.behavior).await?;
        Ok(vec!["a.iana-servers.net".to_string(), "b.iana-servers.net".to_string()])
    }
}

pub struct MockCertificates {
    behavior: Behavior,
}

impl MockCertificates {
    pub fn behaving(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { behavior })
    }
}

#[async_trait]
impl CertificateProvider for MockCertificates {
    async fn fetch(&self, domain: &str) -> Result<SslInfo, IntelError> {
        act(self.behavior).await?;
        Ok(SslInfo {
            issuer: "DigiCert Inc".to_string(),
            issuer_country: "US".to_string(),
            valid_from: "Jan 30 00:00:00 2025 GMT".to_string(),
            valid_to: "Jan 15 23:59:59 2026 GMT".to_string(),
            subject: format!("*.{}", domain),
            fingerprint: "AA:BB".to_string(),
            signature_algorithm: "RSA-SHA256".to_string(),
            key_size: 2048,
        })
    }
}

pub struct MockGeo {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockGeo {
    pub fn behaving(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoProvider for MockGeo {
    async fn lookup(&self, ip: &str) -> Result<HostInfo, IntelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        act(self.behavior).await?;
        Ok(HostInfo {
            query: ip.to_string(),
            country: Some("United States".to_string()),
            region: Some("Massachusetts".to_string()),
            ..HostInfo::default()
        })
    }
}

/// Everything answers; WHOIS comes from the primary only.
pub fn healthy_providers() -> Providers {
    Providers {
        whois: MockWhois::with_fields(sample_fields()),
        fallback_whois: MockWhois::failing(),
        dns: MockDns::answering(),
        certificates: MockCertificates::behaving(Behavior::Answer),
        geo: MockGeo::behaving(Behavior::Answer),
    }
}
