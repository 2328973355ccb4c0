//! Fan-out/fan-in pipeline that turns one domain name into a [`DomainLookupResult`].
//!
//! WHOIS is the only mandatory source: it is resolved first (primary port-43
//! client, then the HTTP fallback) and its failure fails the whole lookup. The
//! DNS and certificate lookups then run concurrently, each under its own
//! timeout, and a failure in one of them only adds a [`LookupFailure`] to the
//! result. Geolocation depends on the IPv4 answer and runs last.

use chrono::{DateTime, Utc};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    dns::{DnsProvider, HickoryDns, MxRecord},
    domain::{self, ParentDomainStrategy},
    errors::IntelError,
    geo::{GeoProvider, IpApiClient},
    tls::{CertificateProvider, RustlsProbe},
    types::{
        AbuseContact, Contact, DnsInfo, DomainDates, DomainLookupResult, HostInfo, IpAddresses,
        LookupFailure, LookupKind, RegistrarInfo, SslInfo, WhoisRecord,
    },
    whois::{WhoisProvider, WhoisService},
    whoisxml::WhoisXmlClient,
};

/// The collaborators a [`DomainIntel`] pulls data from.
pub struct Providers {
    pub whois: Arc<dyn WhoisProvider>,
    pub fallback_whois: Arc<dyn WhoisProvider>,
    pub dns: Arc<dyn DnsProvider>,
    pub certificates: Arc<dyn CertificateProvider>,
    pub geo: Arc<dyn GeoProvider>,
}

impl Providers {
    /// Network-backed providers built from the configuration.
    pub fn from_config(config: Arc<Config>) -> Result<Self, IntelError> {
        Ok(Self {
            whois: Arc::new(WhoisService::new(Arc::clone(&config))),
            fallback_whois: Arc::new(WhoisXmlClient::new(&config)?),
            dns: Arc::new(HickoryDns::new(&config)),
            certificates: Arc::new(RustlsProbe::new(Arc::clone(&config))),
            geo: Arc::new(IpApiClient::new(&config)?),
        })
    }
}

/// Primary-then-fallback WHOIS resolution against the parent domain.
pub struct WhoisResolver {
    primary: Arc<dyn WhoisProvider>,
    fallback: Arc<dyn WhoisProvider>,
    strategy: ParentDomainStrategy,
}

impl WhoisResolver {
    pub fn new(
        primary: Arc<dyn WhoisProvider>,
        fallback: Arc<dyn WhoisProvider>,
        strategy: ParentDomainStrategy,
    ) -> Self {
        Self {
            primary,
            fallback,
            strategy,
        }
    }

    pub async fn resolve(&self, domain: &str) -> Result<WhoisRecord, IntelError> {
        let parent = domain::parent_domain(domain, self.strategy);

        match self.primary.query(&parent).await {
            Ok(record) if !record.is_empty() => return Ok(record),
            Ok(_) => debug!("Primary WHOIS returned nothing for {}, trying fallback", parent),
            Err(e) => warn!("Primary WHOIS failed for {}: {}", parent, e),
        }

        match self.fallback.query(&parent).await {
            Ok(record) if !record.is_empty() => {
                info!("WHOIS for {} served by fallback {}", parent, record.source);
                Ok(record)
            }
            Ok(_) => {
                warn!("Fallback WHOIS returned nothing for {}", parent);
                Err(IntelError::WhoisUnavailable)
            }
            Err(e) => {
                warn!("Fallback WHOIS failed for {}: {}", parent, e);
                Err(IntelError::WhoisUnavailable)
            }
        }
    }
}

/// Answers of the best-effort lookups, already reduced to their output shape.
#[derive(Debug, Default)]
pub struct LookupOutcome {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub mx: Vec<MxRecord>,
    pub txt: Vec<Vec<String>>,
    pub name_servers: Vec<String>,
    pub ssl: SslInfo,
    pub host: Option<HostInfo>,
    pub errors: Vec<LookupFailure>,
}

pub struct DomainIntel {
    config: Arc<Config>,
    whois: WhoisResolver,
    dns: Arc<dyn DnsProvider>,
    certificates: Arc<dyn CertificateProvider>,
    geo: Arc<dyn GeoProvider>,
}

impl DomainIntel {
    pub fn new(config: Arc<Config>) -> Result<Self, IntelError> {
        let providers = Providers::from_config(Arc::clone(&config))?;
        Ok(Self::with_providers(config, providers))
    }

    pub fn with_providers(config: Arc<Config>, providers: Providers) -> Self {
        if config.whoisxml_api_key.is_none() {
            warn!("WHOISXML_API_KEY not set, fallback WHOIS lookups will be skipped");
        }

        Self {
            whois: WhoisResolver::new(
                providers.whois,
                providers.fallback_whois,
                config.parent_domain_strategy,
            ),
            dns: providers.dns,
            certificates: providers.certificates,
            geo: providers.geo,
            config,
        }
    }

    /// Gather everything known about `domain`.
    ///
    /// Fails with [`IntelError::InvalidDomain`] on malformed input and with
    /// [`IntelError::WhoisUnavailable`] when neither WHOIS source answers.
    /// Any other degraded lookup is reported in `errors`.
    pub async fn lookup_domain(&self, domain: &str) -> Result<DomainLookupResult, IntelError> {
        let domain = domain::validate_domain(domain)?;
        let whois = self.whois.resolve(&domain).await?;

        let dns_timeout = self.config.dns_timeout();
        let (ipv4, ipv6, mx, txt, name_servers, ssl) = futures::join!(
            settle(dns_timeout, self.dns.ipv4(&domain)),
            settle(dns_timeout, self.dns.ipv6(&domain)),
            settle(dns_timeout, self.dns.mx(&domain)),
            settle(dns_timeout, self.dns.txt(&domain)),
            settle(dns_timeout, self.dns.ns(&domain)),
            settle(self.config.tls_timeout(), self.certificates.fetch(&domain)),
        );

        let mut errors = Vec::new();
        let mut outcome = LookupOutcome {
            ipv4: keep(LookupKind::Ipv4, ipv4, &mut errors),
            ipv6: keep(LookupKind::Ipv6, ipv6, &mut errors),
            mx: keep(LookupKind::Mx, mx, &mut errors),
            txt: keep(LookupKind::Txt, txt, &mut errors),
            name_servers: keep(LookupKind::NameServers, name_servers, &mut errors),
            ssl: keep(LookupKind::Ssl, ssl, &mut errors),
            ..LookupOutcome::default()
        };

        if let Some(ip) = outcome.ipv4.first() {
            match settle(self.config.http_timeout(), self.geo.lookup(ip)).await {
                Ok(host) => outcome.host = Some(host),
                Err(e) => {
                    debug!("Geolocation failed for {} ({}): {}", domain, ip, e);
                    errors.push(LookupFailure::new(LookupKind::Host, &e));
                }
            }
        }
        outcome.errors = errors;

        if !outcome.errors.is_empty() {
            info!(
                "Lookup for {} completed with {} degraded lookups",
                domain,
                outcome.errors.len()
            );
        }

        Ok(assemble(&domain, &whois, outcome, Utc::now()))
    }
}

async fn settle<T, F>(limit: Duration, lookup: F) -> Result<T, IntelError>
where
    F: Future<Output = Result<T, IntelError>>,
{
    match timeout(limit, lookup).await {
        Ok(result) => result,
        Err(_) => Err(IntelError::Timeout),
    }
}

fn keep<T: Default>(
    kind: LookupKind,
    result: Result<T, IntelError>,
    errors: &mut Vec<LookupFailure>,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("{} lookup failed: {}", kind.as_str(), e);
            errors.push(LookupFailure::new(kind, &e));
            T::default()
        }
    }
}

/// Merge the WHOIS record and the lookup answers into the output record.
///
/// Flat port-43 fields win over the fallback's nested schema.
pub fn assemble(
    domain: &str,
    whois: &WhoisRecord,
    outcome: LookupOutcome,
    now: DateTime<Utc>,
) -> DomainLookupResult {
    let fields = &whois.fields;
    let backup = whois.backup.clone().unwrap_or_default();

    let expiry_date = fields
        .first_of(&[
            "expiryDate",
            "registryExpiryDate",
            "registrarRegistrationExpirationDate",
        ])
        .or(backup.dates.expiry_date);

    let mut dates = DomainDates {
        expiry_date,
        updated_date: fields
            .first_of(&["lastUpdated", "updatedDate"])
            .or(backup.dates.updated_date),
        creation_date: fields
            .first_of(&["creationDate"])
            .or(backup.dates.creation_date),
        expires_in_days: None,
    };
    dates.refresh_expires_in_days(now);

    DomainLookupResult {
        domain_name: fields
            .first_of(&["domainName"])
            .or(backup.domain_name)
            .unwrap_or_else(|| domain.to_string()),
        status: domain::extract_status_codes(fields.get("domainStatus")),
        ip_addresses: IpAddresses {
            ipv4: outcome.ipv4,
            ipv6: outcome.ipv6,
        },
        dates,
        registrar: RegistrarInfo {
            name: fields
                .first_of(&["registrarName", "registrar"])
                .or(backup.registrar.name),
            id: fields
                .first_of(&["registrarIanaId"])
                .or(backup.registrar.id),
            url: fields
                .first_of(&["registrarUrl"])
                .or(backup.registrar.url),
            registry_domain_id: fields.first_of(&["registryDomainId"]),
        },
        whois: Contact {
            name: fields.first_of(&["registrantName"]).or(backup.registrant.name),
            organization: fields
                .first_of(&["registrantOrganization"])
                .or(backup.registrant.organization),
            street: fields
                .first_of(&["registrantStreet"])
                .or(backup.registrant.street),
            city: fields.first_of(&["registrantCity"]).or(backup.registrant.city),
            country: fields
                .first_of(&["registrantCountry"])
                .or(backup.registrant.country),
            state: fields
                .first_of(&["registrantStateProvince"])
                .or(backup.registrant.state),
            postal_code: fields
                .first_of(&["registrantPostalCode"])
                .or(backup.registrant.postal_code),
        },
        abuse: AbuseContact {
            email: fields.first_of(&["abuseContactEmail", "registrarAbuseContactEmail"]),
            phone: fields.first_of(&["abuseContactPhone", "registrarAbuseContactPhone"]),
        },
        dns: DnsInfo {
            dnssec: fields.first_of(&["dnssec"]),
            name_servers: outcome.name_servers,
            mx_records: domain::format_mx(&outcome.mx),
            txt_records: domain::flatten_txt(outcome.txt),
        },
        ssl: outcome.ssl,
        host: outcome.host,
        errors: outcome.errors,
    }
}
