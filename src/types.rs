//! Output record of the aggregator and the WHOIS shapes it is assembled from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{errors::IntelError, parser::parse_whois_date};

/// Unified intelligence record for one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainLookupResult {
    pub domain_name: String,
    pub status: Vec<String>,
    pub ip_addresses: IpAddresses,
    pub dates: DomainDates,
    pub registrar: RegistrarInfo,
    pub whois: Contact,
    pub abuse: AbuseContact,
    pub dns: DnsInfo,
    pub ssl: SslInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<HostInfo>,
    pub errors: Vec<LookupFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpAddresses {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDates {
    pub expiry_date: Option<String>,
    pub updated_date: Option<String>,
    pub creation_date: Option<String>,
    /// Days until expiry, negative once expired. Absent when the expiry date is unparseable.
    pub expires_in_days: Option<i64>,
}

impl DomainDates {
    /// Recompute `expires_in_days` from `expiry_date` as seen at `now`.
    pub fn refresh_expires_in_days(&mut self, now: DateTime<Utc>) {
        self.expires_in_days = self
            .expiry_date
            .as_deref()
            .and_then(parse_whois_date)
            .map(|expiry| (expiry - now).num_days());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrarInfo {
    pub name: Option<String>,
    pub id: Option<String>,
    pub url: Option<String>,
    pub registry_domain_id: Option<String>,
}

/// Registrant contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbuseContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsInfo {
    pub dnssec: Option<String>,
    pub name_servers: Vec<String>,
    pub mx_records: Vec<String>,
    pub txt_records: Vec<String>,
}

/// Leaf certificate summary. Every field stays empty / zero when the probe fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslInfo {
    /// Issuer organization (O).
    pub issuer: String,
    /// Issuer country (C).
    pub issuer_country: String,
    /// `Mon DD HH:MM:SS YYYY GMT`
    pub valid_from: String,
    pub valid_to: String,
    /// Subject common name (CN).
    pub subject: String,
    /// SHA-256 over the DER certificate, uppercase hex pairs joined by `:`.
    /// Not the SHA-1 fingerprint OpenSSL prints by default.
    pub fingerprint: String,
    /// Short name of the certificate's signature algorithm, e.g.
    /// `sha256WithRSAEncryption` or `ecdsa-with-SHA256`. This is not the EC curve name.
    pub signature_algorithm: String,
    /// Public key size in bits: RSA modulus length, or the EC field size (256 for P-256).
    pub key_size: u32,
}

/// Geolocation and network ownership of the first IPv4 address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub query: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
    #[serde(rename = "as")]
    pub as_number: Option<String>,
}

/// Which best-effort lookup degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupKind {
    Ipv4,
    Ipv6,
    Mx,
    Txt,
    NameServers,
    Ssl,
    Host,
}

impl LookupKind {
    pub fn label(self) -> &'static str {
        match self {
            LookupKind::Ipv4 => "Failed to fetch IPv4 addresses",
            LookupKind::Ipv6 => "Failed to fetch IPv6 addresses",
            LookupKind::Mx => "Failed to fetch MX records",
            LookupKind::Txt => "Failed to fetch TXT records",
            LookupKind::NameServers => "Failed to fetch name servers",
            LookupKind::Ssl => "Failed to fetch SSL certificate details",
            LookupKind::Host => "Failed to fetch IP information",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::Ipv4 => "ipv4",
            LookupKind::Ipv6 => "ipv6",
            LookupKind::Mx => "mx",
            LookupKind::Txt => "txt",
            LookupKind::NameServers => "name_servers",
            LookupKind::Ssl => "ssl",
            LookupKind::Host => "host",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    Timeout,
    Resolution,
    Connection,
    Tls,
    Http,
    Parse,
    NotFound,
    Other,
}

/// One degraded sub-lookup: what failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFailure {
    pub lookup: LookupKind,
    pub reason: FailureReason,
    pub message: String,
}

impl LookupFailure {
    pub fn new(lookup: LookupKind, error: &IntelError) -> Self {
        Self {
            lookup,
            reason: error.failure_reason(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lookup.label())
    }
}

/// Flat WHOIS fields keyed by camelCase field name (`Registrar IANA ID` -> `registrarIanaId`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisFields(BTreeMap<String, String>);

impl WhoisFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeated keys are joined with a single space.
    pub fn append(&mut self, key: String, value: &str) {
        self.0
            .entry(key)
            .and_modify(|existing| {
                existing.push(' ');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// First non-empty value among `keys`, in priority order.
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Nested schema produced by the fallback WHOIS provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupWhois {
    pub domain_name: Option<String>,
    pub registrar: RegistrarInfo,
    pub dates: DomainDates,
    pub registrant: Contact,
}

/// WHOIS data as obtained from either provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhoisRecord {
    /// Server or API that answered.
    pub source: String,
    pub fields: WhoisFields,
    pub backup: Option<BackupWhois>,
}

impl WhoisRecord {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.backup.is_none()
    }
}
