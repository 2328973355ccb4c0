//! HTTP surface: `GET /domain-info`, `/health` and `/metrics`.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::{
    auth::{AuthVerifier, BearerTokenVerifier},
    config::Config,
    errors::IntelError,
    metrics,
    types::{DomainLookupResult, LookupFailure},
    DomainIntelClient,
};

#[derive(Clone)]
pub struct AppState {
    client: DomainIntelClient,
    auth: Arc<dyn AuthVerifier>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(client: DomainIntelClient, auth: Arc<dyn AuthVerifier>, config: Arc<Config>) -> Self {
        Self {
            client,
            auth,
            config,
        }
    }

    /// Bearer-token auth from `config.auth_tokens`.
    pub fn with_token_auth(client: DomainIntelClient, config: Arc<Config>) -> Self {
        let auth = Arc::new(BearerTokenVerifier::new(config.auth_tokens.clone()));
        Self::new(client, auth, config)
    }
}

#[derive(Debug, Deserialize)]
pub struct DomainInfoQuery {
    #[serde(default)]
    domain: Option<String>,
    /// Skip cache if true
    #[serde(default)]
    fresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInfoResponse {
    pub domain_info: DomainLookupResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<LookupFailure>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/domain-info", get(domain_info))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

async fn domain_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DomainInfoQuery>, QueryRejection>,
) -> Result<Json<DomainInfoResponse>, IntelError> {
    // Nothing is looked up for unauthenticated callers
    if let Err(e) = state.auth.verify(&headers) {
        metrics::increment_errors("unauthorized");
        return Err(e);
    }

    let Query(params) = query.map_err(|rejection| {
        metrics::increment_errors("invalid_query");
        IntelError::InvalidDomain(rejection.body_text())
    })?;

    let domain = params.domain.as_deref().map(str::trim).unwrap_or_default();
    if domain.is_empty() {
        metrics::increment_errors("missing_domain");
        return Err(IntelError::InvalidDomain(
            "Domain name is required".to_string(),
        ));
    }

    metrics::increment_requests(domain);

    // A panicking provider must not take the connection down with it
    let client = state.client.clone();
    let requested = domain.to_string();
    let fresh = params.fresh;
    let joined =
        tokio::spawn(async move { client.lookup_with_options(&requested, fresh).await }).await;

    let response = match joined {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            track_lookup_error(&e);
            return Err(e);
        }
        Err(join_error) => {
            error!("Lookup task for {} aborted: {}", domain, join_error);
            metrics::increment_errors("panic");
            return Err(IntelError::Internal(join_error.to_string()));
        }
    };

    if response.cached {
        metrics::increment_cache_hits();
    } else {
        metrics::increment_cache_misses();
        metrics::record_query_time(response.query_time_ms);
    }
    for failure in &response.domain_info.errors {
        metrics::increment_partial_failures(failure.lookup);
    }

    debug!(
        "Served {} ({} degraded, cached: {})",
        domain,
        response.domain_info.errors.len(),
        response.cached
    );

    let errors = response.domain_info.errors.clone();
    Ok(Json(DomainInfoResponse {
        domain_info: response.domain_info,
        errors,
    }))
}

fn track_lookup_error(error: &IntelError) {
    match error {
        IntelError::InvalidDomain(_) => metrics::increment_errors("invalid_domain"),
        IntelError::WhoisUnavailable => metrics::increment_errors("whois_unavailable"),
        IntelError::Timeout => metrics::increment_errors("timeout"),
        _ => metrics::increment_errors("other"),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::{DomainIntel, Providers},
        test_support::*,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn router(providers: Providers, auth_tokens: Vec<String>) -> Router {
        let config = Arc::new(Config {
            auth_tokens,
            dns_timeout_seconds: 1,
            tls_timeout_seconds: 1,
            http_timeout_seconds: 1,
            ..Config::default()
        });
        let intel = Arc::new(DomainIntel::with_providers(Arc::clone(&config), providers));
        let client = DomainIntelClient::from_parts(intel, &config);
        build_router(AppState::with_token_auth(client, config))
    }

    async fn get_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_domain_info_success() {
        let app = router(healthy_providers(), Vec::new());
        let (status, body) = get_json(app, get("/domain-info?domain=example.com")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["domainInfo"]["domainName"], "EXAMPLE.COM");
        assert_eq!(body["domainInfo"]["ipAddresses"]["ipv4"][0], "93.184.215.14");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_partial_failures_listed() {
        let providers = Providers {
            certificates: MockCertificates::behaving(Behavior::Fail),
            ..healthy_providers()
        };
        let app = router(providers, Vec::new());
        let (status, body) = get_json(app, get("/domain-info?domain=example.com")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["errors"][0]["lookup"], "ssl");
        assert_eq!(body["domainInfo"]["ssl"]["keySize"], 0);
    }

    #[tokio::test]
    async fn test_missing_domain_is_bad_request() {
        for uri in ["/domain-info", "/domain-info?domain=", "/domain-info?domain=%20"] {
            let app = router(healthy_providers(), Vec::new());
            let (status, body) = get_json(app, get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"], "Domain name is required");
        }
    }

    #[tokio::test]
    async fn test_unauthorized_performs_no_lookup() {
        let whois = MockWhois::with_fields(sample_fields());
        let providers = Providers {
            whois: whois.clone(),
            ..healthy_providers()
        };
        let app = router(providers, vec!["s3cret".to_string()]);
        let (status, body) = get_json(app, get("/domain-info?domain=example.com")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
        assert_eq!(whois.calls(), 0);
    }

    #[tokio::test]
    async fn test_authorized_request_passes() {
        let app = router(healthy_providers(), vec!["s3cret".to_string()]);
        let request = Request::builder()
            .uri("/domain-info?domain=example.com")
            .header(AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = get_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_whois_unavailable_is_bad_gateway() {
        let providers = Providers {
            whois: MockWhois::failing(),
            fallback_whois: MockWhois::failing(),
            ..healthy_providers()
        };
        let app = router(providers, Vec::new());
        let (status, body) = get_json(app, get("/domain-info?domain=example.com")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch WHOIS data");
    }

    #[tokio::test]
    async fn test_provider_panic_is_internal_error() {
        let providers = Providers {
            dns: MockDns::behaving(Behavior::Panic),
            ..healthy_providers()
        };
        let app = router(providers, Vec::new());
        let (status, body) = get_json(app, get("/domain-info?domain=example.com")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "An unexpected error occurred while processing domain information"
        );
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(healthy_providers(), Vec::new());
        let (status, body) = get_json(app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
