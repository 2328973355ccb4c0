use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{config::Config, errors::IntelError, types::HostInfo};

// country, regionName, city, lat, lon, timezone, isp, org, as, query
const IP_API_FIELDS: &str = "12249";

/// IP geolocation and network ownership lookup.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<HostInfo, IntelError>;
}

/// Client for the ip-api.com JSON endpoint.
pub struct IpApiClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    query: Option<String>,
    country: Option<String>,
    region_name: Option<String>,
    region: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    #[serde(rename = "as")]
    as_number: Option<String>,
}

impl IpApiClient {
    pub fn new(config: &Config) -> Result<Self, IntelError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("domain-intel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.geolocation_endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeoProvider for IpApiClient {
    async fn lookup(&self, ip: &str) -> Result<HostInfo, IntelError> {
        let url = format!("{}/{}", self.endpoint, ip);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", IP_API_FIELDS)])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Geolocation request for {} failed: {}", ip, response.status());
            return Err(IntelError::UpstreamStatus(response.status().as_u16()));
        }

        let body: IpApiResponse = response.json().await?;
        if body.status.as_deref() == Some("fail") {
            let message = body.message.unwrap_or_else(|| "lookup failed".to_string());
            debug!("Geolocation for {} rejected: {}", ip, message);
            return Err(IntelError::NotFound(message));
        }

        Ok(HostInfo {
            query: body.query.unwrap_or_else(|| ip.to_string()),
            country: body.country,
            region: body.region_name.or(body.region),
            city: body.city,
            lat: body.lat,
            lon: body.lon,
            timezone: body.timezone,
            isp: body.isp,
            org: body.org,
            as_number: body.as_number,
        })
    }
}
