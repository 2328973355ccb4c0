//! Fallback WHOIS source backed by the WhoisXML HTTP API, for suffixes whose
//! registries return nothing usable over port 43.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Config,
    errors::IntelError,
    types::{BackupWhois, Contact, DomainDates, RegistrarInfo, WhoisRecord},
    whois::WhoisProvider,
};

const UNKNOWN: &str = "Unknown";

pub struct WhoisXmlClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct WhoisXmlResponse {
    #[serde(rename = "WhoisRecord")]
    whois_record: Option<XmlRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlRecord {
    domain_name: Option<String>,
    registrar_name: Option<String>,
    #[serde(rename = "registrarIANAID")]
    registrar_iana_id: Option<String>,
    #[serde(default)]
    registry_data: XmlRegistryData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlRegistryData {
    registrar_name: Option<String>,
    whois_server: Option<String>,
    created_date_normalized: Option<String>,
    expires_date_normalized: Option<String>,
    updated_date_normalized: Option<String>,
    registrant: Option<XmlRegistrant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlRegistrant {
    name: Option<String>,
    organization: Option<String>,
    street1: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country_code: Option<String>,
    postal_code: Option<String>,
}

impl WhoisXmlClient {
    pub fn new(config: &Config) -> Result<Self, IntelError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("domain-intel/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            api_key: config.whoisxml_api_key.clone(),
            endpoint: config.whoisxml_endpoint.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_url(&self, api_key: &str, domain: &str) -> Result<Url, IntelError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("apiKey", api_key),
                ("outputFormat", "json"),
                ("domainName", domain),
            ],
        )
        .map_err(|e| IntelError::Internal(format!("Invalid WhoisXML endpoint '{}': {}", self.endpoint, e)))
    }

    fn into_backup(record: XmlRecord, domain: &str) -> BackupWhois {
        let registry = record.registry_data;
        let registrant = registry.registrant.unwrap_or_default();

        BackupWhois {
            domain_name: Some(record.domain_name.unwrap_or_else(|| domain.to_string())),
            registrar: RegistrarInfo {
                name: Some(
                    record
                        .registrar_name
                        .or(registry.registrar_name)
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                ),
                id: Some(record.registrar_iana_id.unwrap_or_else(|| UNKNOWN.to_string())),
                url: registry
                    .whois_server
                    .filter(|server| !server.is_empty())
                    .map(|server| format!("https://{}", server)),
                registry_domain_id: None,
            },
            dates: DomainDates {
                creation_date: Some(or_unknown(registry.created_date_normalized)),
                expiry_date: Some(or_unknown(registry.expires_date_normalized)),
                updated_date: Some(or_unknown(registry.updated_date_normalized)),
                expires_in_days: None,
            },
            registrant: Contact {
                name: registrant.name,
                organization: registrant.organization,
                street: registrant.street1,
                city: registrant.city,
                country: registrant.country_code,
                state: registrant.state,
                postal_code: registrant.postal_code,
            },
        }
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

#[async_trait]
impl WhoisProvider for WhoisXmlClient {
    async fn query(&self, domain: &str) -> Result<WhoisRecord, IntelError> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("[WHOISXML] API key not set. Skipping fallback lookup.");
            return Err(IntelError::FallbackUnavailable("API key not set".to_string()));
        };

        let url = self.request_url(api_key, domain)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!("[WHOISXML] API request failed for {}: {}", domain, response.status());
            return Err(IntelError::UpstreamStatus(response.status().as_u16()));
        }

        let body: WhoisXmlResponse = response.json().await?;
        let Some(record) = body.whois_record else {
            warn!("[WHOISXML] No valid WhoisRecord found for {}", domain);
            return Err(IntelError::NotFound(format!("No WhoisRecord for {}", domain)));
        };

        debug!("[WHOISXML] Record received for {}", domain);
        Ok(WhoisRecord {
            source: "whoisxmlapi".to_string(),
            fields: Default::default(),
            backup: Some(Self::into_backup(record, domain)),
        })
    }
}
