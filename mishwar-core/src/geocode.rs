//! Location resolution for Mishwar — Google Geocoding API client
//!
//! Provides a `LocationResolver` trait with a `GoogleGeocodeClient`
//! implementation covering both directions:
//! - **forward** — free-text place name to a formatted address
//! - **reverse** — latitude/longitude to a formatted address
//!
//! An optional `RegionFilter` restricts results to a designated
//! administrative region; a result outside the region resolves to `None`,
//! the same as a provider no-match.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::{MapsConfig, RegionConfig};

// ============================================================================
// LocationResolver trait
// ============================================================================

/// Abstraction over geocoding providers.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve a free-text place name to a formatted address.
    /// `Ok(None)` means no acceptable match (provider no-match or region
    /// filter rejection; callers cannot tell these apart).
    async fn resolve_forward(
        &self,
        name: &str,
        filter: Option<&RegionFilter>,
    ) -> Result<Option<String>, GeocodeError>;

    /// Resolve coordinates to a formatted address.
    async fn resolve_reverse(
        &self,
        lat: f64,
        lng: f64,
        filter: Option<&RegionFilter>,
    ) -> Result<Option<String>, GeocodeError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Region filter
// ============================================================================

/// Accepts a geocoding result only when its component list names the
/// designated region under either the localized or the English label.
#[derive(Debug, Clone)]
pub struct RegionFilter {
    pub name_ar: String,
    pub name_en: String,
}

impl RegionFilter {
    pub fn from_config(region: &RegionConfig) -> Self {
        Self {
            name_ar: region.name_ar.clone(),
            name_en: region.name_en.clone(),
        }
    }

    /// The provider decorates region names inconsistently across
    /// languages ("Riyadh" vs "Riyadh Province"), so containment is
    /// checked rather than equality.
    pub fn matches(&self, components: &[AddressComponent]) -> bool {
        components
            .iter()
            .any(|c| c.long_name.contains(&self.name_ar) || c.long_name.contains(&self.name_en))
    }
}

// ============================================================================
// Error types
// ============================================================================

/// Geocoding errors
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Provider status: {status}")]
    Provider { status: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config types
// ============================================================================

/// Google geocoding client configuration
#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    pub api_key: String,
    pub language: String,
    pub region_bias: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl GeocodeConfig {
    pub fn new(api_key: Option<String>, language: String, region_bias: String) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_MAPS_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            language,
            region_bias,
            timeout_seconds: 10,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }

    /// Build from the `[maps]` section, key from `GOOGLE_MAPS_API_KEY`.
    pub fn from_maps_config(maps: &MapsConfig) -> Self {
        let mut config = Self::new(None, maps.language.clone(), maps.region_bias.clone());
        config.timeout_seconds = maps.timeout_seconds;
        config.max_retries = maps.max_retries;
        config.retry_delay_ms = maps.retry_delay_ms;
        config
    }
}

// ============================================================================
// Google API structs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub formatted_address: String,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

// ============================================================================
// GoogleGeocodeClient
// ============================================================================

/// Geocoding client — calls the Google Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocodeClient {
    client: Client,
    config: GeocodeConfig,
    base_url: String,
}

impl GoogleGeocodeClient {
    pub fn new(config: GeocodeConfig) -> Result<Self, GeocodeError> {
        Self::with_base_url(config, "https://maps.googleapis.com".to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: GeocodeConfig, base_url: String) -> Result<Self, GeocodeError> {
        if config.api_key.is_empty() {
            return Err(GeocodeError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn fetch(&self, params: Vec<(String, String)>) -> Result<GeocodeResponse, GeocodeError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.fetch_once(&params)).await;

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All geocoding retry attempts failed"
                );
                Err(GeocodeError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn fetch_once(&self, params: &[(String, String)]) -> Result<GeocodeResponse, GeocodeError> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Geocoding API error");
            return Err(GeocodeError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: GeocodeResponse = response.json().await?;

        // OK and ZERO_RESULTS are answers; everything else (REQUEST_DENIED,
        // OVER_QUERY_LIMIT, UNKNOWN_ERROR) is a provider fault worth retrying.
        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body),
            other => {
                tracing::error!(status = other, "Geocoding provider returned error status");
                Err(GeocodeError::Provider {
                    status: other.to_string(),
                })
            }
        }
    }

    fn base_params(&self) -> Vec<(String, String)> {
        vec![
            ("language".to_string(), self.config.language.clone()),
            ("region".to_string(), self.config.region_bias.clone()),
            ("key".to_string(), self.config.api_key.clone()),
        ]
    }

    /// Pick the first result and apply the region filter to it. The
    /// provider orders results by relevance; only the top hit counts.
    fn first_match(response: GeocodeResponse, filter: Option<&RegionFilter>) -> Option<String> {
        let result = response.results.into_iter().next()?;
        if let Some(filter) = filter {
            if !filter.matches(&result.address_components) {
                return None;
            }
        }
        Some(result.formatted_address)
    }
}

#[async_trait]
impl LocationResolver for GoogleGeocodeClient {
    async fn resolve_forward(
        &self,
        name: &str,
        filter: Option<&RegionFilter>,
    ) -> Result<Option<String>, GeocodeError> {
        let mut params = vec![("address".to_string(), name.to_string())];
        params.extend(self.base_params());

        let response = self.fetch(params).await?;
        let resolved = Self::first_match(response, filter);
        tracing::debug!(query = name, resolved = ?resolved, "forward geocode");
        Ok(resolved)
    }

    async fn resolve_reverse(
        &self,
        lat: f64,
        lng: f64,
        filter: Option<&RegionFilter>,
    ) -> Result<Option<String>, GeocodeError> {
        let mut params = vec![("latlng".to_string(), format!("{},{}", lat, lng))];
        params.extend(self.base_params());

        let response = self.fetch(params).await?;
        let resolved = Self::first_match(response, filter);
        tracing::debug!(lat, lng, resolved = ?resolved, "reverse geocode");
        Ok(resolved)
    }

    fn name(&self) -> &str {
        "google-geocoding"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> GeocodeConfig {
        GeocodeConfig {
            api_key: api_key.to_string(),
            language: "ar".to_string(),
            region_bias: "SA".to_string(),
            timeout_seconds: 5,
            max_retries: 3,
            retry_delay_ms: 50,
        }
    }

    fn riyadh_response() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "العليا، الرياض، المملكة العربية السعودية",
                "address_components": [
                    { "long_name": "العليا", "types": ["sublocality"] },
                    { "long_name": "الرياض", "types": ["locality"] },
                    { "long_name": "منطقة الرياض", "types": ["administrative_area_level_1"] }
                ]
            }]
        })
    }

    fn dammam_response() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "الدمام، المملكة العربية السعودية",
                "address_components": [
                    { "long_name": "الدمام", "types": ["locality"] },
                    { "long_name": "المنطقة الشرقية", "types": ["administrative_area_level_1"] }
                ]
            }]
        })
    }

    #[tokio::test]
    async fn test_forward_geocode_returns_formatted_address() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .and(query_param("address", "العليا"))
            .and(query_param("language", "ar"))
            .and(query_param("region", "SA"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(riyadh_response()))
            .mount(&mock_server)
            .await;

        let result = client.resolve_forward("العليا", None).await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(
            result.unwrap().as_deref(),
            Some("العليا، الرياض، المملكة العربية السعودية")
        );
    }

    #[tokio::test]
    async fn test_reverse_geocode_sends_latlng_param() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .and(query_param("latlng", "24.7,46.7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(riyadh_response()))
            .mount(&mock_server)
            .await;

        let result = client.resolve_reverse(24.7, 46.7, None).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_zero_results_resolves_to_none() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ZERO_RESULTS",
                "results": []
            })))
            .mount(&mock_server)
            .await;

        let result = client.resolve_forward("مكان غير موجود", None).await.unwrap();
        assert!(result.is_none(), "ZERO_RESULTS must resolve to None");
    }

    #[tokio::test]
    async fn test_region_filter_accepts_in_region_result() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(riyadh_response()))
            .mount(&mock_server)
            .await;

        let filter = RegionFilter {
            name_ar: "منطقة الرياض".to_string(),
            name_en: "Riyadh".to_string(),
        };
        let result = client.resolve_forward("العليا", Some(&filter)).await.unwrap();
        assert!(result.is_some(), "In-region result must pass the filter");
    }

    #[tokio::test]
    async fn test_region_filter_rejects_out_of_region_result() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(dammam_response()))
            .mount(&mock_server)
            .await;

        let filter = RegionFilter {
            name_ar: "منطقة الرياض".to_string(),
            name_en: "Riyadh".to_string(),
        };
        let result = client.resolve_forward("الدمام", Some(&filter)).await.unwrap();
        assert!(result.is_none(), "Out-of-region result must resolve to None");
    }

    #[tokio::test]
    async fn test_http_500_exhausts_retries() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&mock_server)
            .await;

        let result = client.resolve_forward("العليا", None).await;

        match result {
            Err(GeocodeError::RetryExhausted { attempts }) => {
                assert_eq!(attempts, 3, "Expected 3 retry attempts");
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_error_status_retries_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = GoogleGeocodeClient::with_base_url(test_config("test-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "UNKNOWN_ERROR",
                "results": []
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(riyadh_response()))
            .mount(&mock_server)
            .await;

        let result = client.resolve_forward("العليا", None).await;
        assert!(result.is_ok(), "Expected success after retry");
        assert!(result.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_client_fails_with_missing_api_key() {
        let config = test_config("");
        let result = GoogleGeocodeClient::new(config);

        match result {
            Err(GeocodeError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }

    #[test]
    fn test_region_filter_matches_english_label() {
        let filter = RegionFilter {
            name_ar: "منطقة الرياض".to_string(),
            name_en: "Riyadh".to_string(),
        };
        let components = vec![AddressComponent {
            long_name: "Riyadh Province".to_string(),
            types: vec!["administrative_area_level_1".to_string()],
        }];
        assert!(filter.matches(&components));
    }
}
