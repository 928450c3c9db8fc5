// Async client for the upstream travel API: OAuth2 client-credentials flow,
// flight-offer search (with result diversification), location lookup and
// destination content. The client owns its token and search caches; nothing
// is module-global.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::{search_cache_key, SearchCache, SearchCacheConfig, TokenCache};
use crate::diversify::{diversify, DEFAULT_MAX_RESULTS};
use crate::locations::{matching_fallback_airports, LocationSearchResponse};
use crate::offer::FlightSearchResponse;

pub const DEFAULT_BASE_URL: &str = "https://test.api.amadeus.com";

// Fetch a wide raw result set and let the diversifier curate it down
const RAW_SEARCH_LIMIT: u32 = 100;
const LOCATION_PAGE_LIMIT: u32 = 20;
const DEFAULT_GEO_RADIUS_KM: u32 = 5;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("travel API credentials are not configured")]
    MissingCredentials,

    #[error("failed to authenticate with the travel API: {0}")]
    AuthFailed(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream error: {status_code} - {detail}")]
    Upstream {
        status_code: u16,
        detail: String,
        is_retryable: bool,
    },

    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(err) => err.is_timeout() || err.is_connect(),
            ApiError::Upstream { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

// Exponential backoff with jitter to avoid thundering-herd retries
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let base_backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powf(retry_attempt as f64))
    .min(config.max_backoff_ms as f64);

    let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
    let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

    Duration::from_millis(backoff_ms as u64)
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    pub token_refresh_margin_secs: u64,
    pub search_cache: SearchCacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
            token_refresh_margin_secs: 300,
            search_cache: SearchCacheConfig::default(),
        }
    }
}

impl ClientConfig {
    // Credentials come from the environment, as in the original deployment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match std::env::var("AMADEUS_API_KEY") {
            Ok(key) if !key.is_empty() => config.api_key = key,
            _ => warn!("AMADEUS_API_KEY is not set"),
        }
        match std::env::var("AMADEUS_API_SECRET") {
            Ok(secret) if !secret.is_empty() => config.api_secret = secret,
            _ => warn!("AMADEUS_API_SECRET is not set"),
        }
        if let Ok(base_url) = std::env::var("AMADEUS_BASE_URL") {
            if !base_url.is_empty() {
                config.base_url = base_url;
            }
        }
        config
    }
}

#[derive(Debug, Default)]
pub struct ClientStats {
    pub requests_sent: AtomicUsize,
    pub requests_succeeded: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub requests_retried: AtomicUsize,
    pub token_refreshes: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientStatsReport {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub token_refreshes: usize,
}

impl ClientStats {
    pub fn report(&self) -> ClientStatsReport {
        ClientStatsReport {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_retried: self.requests_retried.load(Ordering::Relaxed),
            token_refreshes: self.token_refreshes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlightSearchParams {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    // None falls back to the curated default of 15
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct InspirationParams {
    pub origin: String,
    pub max_price: Option<u32>,
    pub departure_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct GeoSearchParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<u32>,
}

// Seam between the planner's HTTP layer and the upstream provider
#[async_trait]
pub trait TravelApi: Send + Sync + 'static {
    // Search flight offers and return a curated, price-sorted subset
    async fn search_flight_offers(
        &self,
        params: FlightSearchParams,
    ) -> Result<FlightSearchResponse, ApiError>;

    // Keyword lookup over airports and cities, merged with the static
    // fallback directory
    async fn search_airports(&self, keyword: &str) -> Result<LocationSearchResponse, ApiError>;

    // Keyword lookup over cities only
    async fn search_cities(&self, keyword: &str) -> Result<LocationSearchResponse, ApiError>;

    // Cheapest destinations from an origin (passthrough envelope)
    async fn flight_inspiration(&self, params: InspirationParams) -> Result<Value, ApiError>;

    async fn points_of_interest(&self, params: GeoSearchParams) -> Result<Value, ApiError>;

    async fn tours_and_activities(&self, params: GeoSearchParams) -> Result<Value, ApiError>;

    fn stats(&self) -> ClientStatsReport;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

pub struct AmadeusClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenCache,
    searches: SearchCache,
    stats: ClientStats,
}

impl AmadeusClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(ClientError::ConfigError(
                "API key and secret are required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ClientError::InitError(err.to_string()))?;

        Ok(Self {
            http,
            tokens: TokenCache::new(Duration::from_secs(config.token_refresh_margin_secs)),
            searches: SearchCache::new(config.search_cache.clone()),
            stats: ClientStats::default(),
            config,
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn search_cache(&self) -> &SearchCache {
        &self.searches
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.tokens.get() {
            debug!("using cached access token");
            return Ok(token);
        }

        if self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
            error!("travel API credentials missing");
            return Err(ApiError::MissingCredentials);
        }

        info!("requesting new access token");
        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.config.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.api_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = upstream_detail(response).await;
            error!(status, detail = detail.as_str(), "authentication failed");
            return Err(ApiError::AuthFailed(detail));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;

        self.tokens
            .store(token.access_token.clone(), Duration::from_secs(token.expires_in));
        self.stats.token_refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        with_retries(&self.config.retry, &self.stats, |_| {
            self.get_json_once(&url, query)
        })
        .await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = upstream_detail(response).await;
            return Err(ApiError::Upstream {
                status_code: status.as_u16(),
                detail,
                is_retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

// Run a request, retrying retryable failures with backoff until the retry
// budget is spent.
async fn with_retries<T, F, Fut>(
    retry: &RetryConfig,
    stats: &ClientStats,
    mut request: F,
) -> Result<T, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u32;
    loop {
        stats.requests_sent.fetch_add(1, Ordering::Relaxed);
        match request(attempt).await {
            Ok(value) => {
                stats.requests_succeeded.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                let backoff = calculate_backoff(attempt, retry);
                warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying upstream request"
                );
                stats.requests_retried.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                stats.requests_failed.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        }
    }
}

// The provider reports failures as { "errors": [{ "detail": ... }] }
async fn upstream_detail(response: reqwest::Response) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        errors: Vec<ErrorEntry>,
    }

    #[derive(Deserialize)]
    struct ErrorEntry {
        detail: Option<String>,
        title: Option<String>,
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => body
            .errors
            .into_iter()
            .next()
            .and_then(|entry| entry.detail.or(entry.title))
            .unwrap_or_else(|| "upstream request failed".to_string()),
        Err(_) => "upstream request failed".to_string(),
    }
}

fn flight_query(params: &FlightSearchParams) -> Vec<(String, String)> {
    let mut query = vec![
        ("originLocationCode".to_string(), params.origin.clone()),
        (
            "destinationLocationCode".to_string(),
            params.destination.clone(),
        ),
        (
            "departureDate".to_string(),
            params.departure_date.format("%Y-%m-%d").to_string(),
        ),
        ("adults".to_string(), params.adults.to_string()),
        ("max".to_string(), RAW_SEARCH_LIMIT.to_string()),
        ("currencyCode".to_string(), "USD".to_string()),
    ];
    if let Some(return_date) = params.return_date {
        query.push((
            "returnDate".to_string(),
            return_date.format("%Y-%m-%d").to_string(),
        ));
    }
    query
}

fn geo_query(params: &GeoSearchParams) -> Vec<(String, String)> {
    vec![
        ("latitude".to_string(), params.latitude.to_string()),
        ("longitude".to_string(), params.longitude.to_string()),
        (
            "radius".to_string(),
            params.radius_km.unwrap_or(DEFAULT_GEO_RADIUS_KM).to_string(),
        ),
    ]
}

fn location_query(keyword: &str, sub_type: &str) -> Vec<(String, String)> {
    vec![
        ("keyword".to_string(), keyword.to_string()),
        ("subType".to_string(), sub_type.to_string()),
        ("page[limit]".to_string(), LOCATION_PAGE_LIMIT.to_string()),
    ]
}

#[async_trait]
impl TravelApi for AmadeusClient {
    async fn search_flight_offers(
        &self,
        params: FlightSearchParams,
    ) -> Result<FlightSearchResponse, ApiError> {
        let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        let departure = params.departure_date.format("%Y-%m-%d").to_string();
        let return_date = params.return_date.map(|d| d.format("%Y-%m-%d").to_string());
        let key = search_cache_key(
            &params.origin,
            &params.destination,
            &departure,
            return_date.as_deref(),
            params.adults,
            max_results,
        );

        if let Some(cached) = self.searches.get(&key) {
            debug!(key = key.as_str(), "flight search served from cache");
            return Ok(cached);
        }

        info!(
            origin = %params.origin,
            destination = %params.destination,
            departure = %departure,
            adults = params.adults,
            "searching flights"
        );

        let mut response: FlightSearchResponse = self
            .get_json("/v2/shopping/flight-offers", &flight_query(&params))
            .await?;

        info!(found = response.data.len(), "flights returned by upstream");
        response.data = diversify(std::mem::take(&mut response.data), max_results);
        info!(curated = response.data.len(), "flights after diversification");

        self.searches.store(key, response.clone(), None);
        Ok(response)
    }

    async fn search_airports(&self, keyword: &str) -> Result<LocationSearchResponse, ApiError> {
        let fallback = matching_fallback_airports(keyword);

        match self
            .get_json::<LocationSearchResponse>(
                "/v1/reference-data/locations",
                &location_query(keyword, "AIRPORT,CITY"),
            )
            .await
        {
            Ok(mut response) => {
                info!(
                    upstream = response.data.len(),
                    fallback = fallback.len(),
                    keyword,
                    "airport search results"
                );
                let mut data = fallback;
                data.append(&mut response.data);
                response.meta = Some(serde_json::json!({ "count": data.len() }));
                response.data = data;
                Ok(response)
            }
            Err(err) if !fallback.is_empty() => {
                warn!(error = %err, keyword, "airport search failed, serving fallback directory");
                let meta = serde_json::json!({ "count": fallback.len() });
                Ok(LocationSearchResponse {
                    meta: Some(meta),
                    data: fallback,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn search_cities(&self, keyword: &str) -> Result<LocationSearchResponse, ApiError> {
        self.get_json(
            "/v1/reference-data/locations",
            &location_query(keyword, "CITY"),
        )
        .await
    }

    async fn flight_inspiration(&self, params: InspirationParams) -> Result<Value, ApiError> {
        let mut query = vec![("origin".to_string(), params.origin.clone())];
        if let Some(max_price) = params.max_price {
            query.push(("maxPrice".to_string(), max_price.to_string()));
        }
        if let Some(date) = params.departure_date {
            query.push(("departureDate".to_string(), date.format("%Y-%m-%d").to_string()));
        }
        self.get_json("/v1/shopping/flight-destinations", &query).await
    }

    async fn points_of_interest(&self, params: GeoSearchParams) -> Result<Value, ApiError> {
        self.get_json("/v1/reference-data/locations/pois", &geo_query(&params))
            .await
    }

    async fn tours_and_activities(&self, params: GeoSearchParams) -> Result<Value, ApiError> {
        self.get_json("/v1/shopping/activities", &geo_query(&params))
            .await
    }

    fn stats(&self) -> ClientStatsReport {
        self.stats.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.token_refresh_margin_secs, 300);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_new_rejects_missing_credentials() {
        let result = AmadeusClient::new(ClientConfig::default());
        assert!(matches!(result, Err(ClientError::ConfigError(_))));
    }

    #[test]
    fn test_backoff_grows_and_stays_bounded() {
        let config = RetryConfig::default();

        let first = calculate_backoff(0, &config);
        let fifth = calculate_backoff(5, &config);
        assert!(first < fifth);

        for attempt in 0..10 {
            let backoff = calculate_backoff(attempt, &config);
            let ceiling = config.max_backoff_ms as f64 * (1.0 + config.jitter_factor);
            assert!(backoff.as_millis() as f64 <= ceiling);
        }
    }

    #[test]
    fn test_flight_query_shape() {
        let params = FlightSearchParams {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
            return_date: Some(NaiveDate::from_ymd_opt(2025, 9, 21).unwrap()),
            adults: 2,
            max_results: None,
        };

        let query = flight_query(&params);
        assert!(query.contains(&("originLocationCode".to_string(), "JFK".to_string())));
        assert!(query.contains(&("departureDate".to_string(), "2025-09-14".to_string())));
        assert!(query.contains(&("returnDate".to_string(), "2025-09-21".to_string())));
        assert!(query.contains(&("max".to_string(), "100".to_string())));
        assert!(query.contains(&("currencyCode".to_string(), "USD".to_string())));

        let one_way = FlightSearchParams {
            return_date: None,
            ..params
        };
        assert!(!flight_query(&one_way)
            .iter()
            .any(|(name, _)| name == "returnDate"));
    }

    #[test]
    fn test_geo_query_defaults_radius() {
        let query = geo_query(&GeoSearchParams {
            latitude: 48.8566,
            longitude: 2.3522,
            radius_km: None,
        });
        assert!(query.contains(&("radius".to_string(), "5".to_string())));
    }

    #[test]
    fn test_upstream_error_retryability() {
        let throttled = ApiError::Upstream {
            status_code: 429,
            detail: "too many requests".to_string(),
            is_retryable: true,
        };
        assert!(throttled.is_retryable());

        let bad_request = ApiError::Upstream {
            status_code: 400,
            detail: "invalid query".to_string(),
            is_retryable: false,
        };
        assert!(!bad_request.is_retryable());

        assert!(!ApiError::MissingCredentials.is_retryable());
        assert!(!ApiError::AuthFailed("denied".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let stats = ClientStats::default();

        let counter = Arc::clone(&attempts);
        let result = with_retries(&quick_retry(), &stats, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ApiError::Upstream {
                        status_code: 503,
                        detail: "unavailable".to_string(),
                        is_retryable: true,
                    })
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let report = stats.report();
        assert_eq!(report.requests_sent, 3);
        assert_eq!(report.requests_retried, 2);
        assert_eq!(report.requests_succeeded, 1);
        assert_eq!(report.requests_failed, 0);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let stats = ClientStats::default();

        let counter = Arc::clone(&attempts);
        let result: Result<u32, ApiError> = with_retries(&quick_retry(), &stats, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::AuthFailed("denied".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::AuthFailed(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(stats.report().requests_failed, 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_exhausted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let stats = ClientStats::default();
        let retry = RetryConfig {
            max_retries: 2,
            ..quick_retry()
        };

        let counter = Arc::clone(&attempts);
        let result: Result<u32, ApiError> = with_retries(&retry, &stats, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Upstream {
                    status_code: 500,
                    detail: "boom".to_string(),
                    is_retryable: true,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let report = stats.report();
        assert_eq!(report.requests_retried, 2);
        assert_eq!(report.requests_failed, 1);
    }
}
