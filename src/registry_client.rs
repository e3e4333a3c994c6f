use crate::config::Config;
use crate::errors::{AppError, RequestFailure};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Client for the Companies House data API.
///
/// Stateless apart from the in-flight permit pool: every call is an authenticated
/// GET returning decoded JSON or a [`RequestFailure`]. No retries are attempted.
#[derive(Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: Url,
    credential: String,
    permits: Arc<Semaphore>,
}

impl RegistryClient {
    /// Creates a new `RegistryClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Absolute base URL of the registry API.
    /// * `credential` - API key, sent as the basic-auth username with an empty password.
    /// * `timeout` - Per-request timeout.
    /// * `max_in_flight` - Upper bound on concurrent upstream requests.
    pub fn new(
        base_url: &str,
        credential: String,
        timeout: Duration,
        max_in_flight: usize,
    ) -> Result<Self, AppError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|e| {
            AppError::ConfigurationError(format!("Invalid registry base URL '{}': {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create registry client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            credential,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
            config.max_in_flight_requests,
        )
    }

    /// Base URL every relative registry link is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url.join(path).map_err(|e| {
            AppError::InternalError(format!("Failed to build registry URL for '{}': {}", path, e))
        })
    }

    /// `GET /company/{number}` URL.
    pub fn company_url(&self, company_number: &str) -> Result<Url, AppError> {
        self.endpoint(&format!("company/{}", company_number))
    }

    /// Performs an authenticated GET and decodes the JSON body.
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - The decoded body, or `AppError::TransportFailure`
    ///   for transport errors, non-2xx statuses and undecodable bodies.
    pub async fn get(&self, url: &Url, query: &[(&str, String)]) -> Result<Value, AppError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::InternalError("Registry request pool closed".to_string()))?;

        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.credential, Some(""))
            .query(query)
            .send()
            .await
            .map_err(|e| {
                AppError::TransportFailure(RequestFailure {
                    url: url.to_string(),
                    status: None,
                    message: e.to_string(),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::TransportFailure(RequestFailure {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: error_text,
            }));
        }

        response.json::<Value>().await.map_err(|e| {
            AppError::TransportFailure(RequestFailure {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("Failed to parse registry response: {}", e),
            })
        })
    }

    /// Fetches a company profile.
    pub async fn get_company(&self, company_number: &str) -> Result<Value, AppError> {
        let url = self.company_url(company_number)?;
        self.get(&url, &[]).await
    }

    /// Keyword search across all registry indices (`GET /search`).
    pub async fn search(
        &self,
        query: &str,
        items_per_page: u32,
        start_index: u32,
    ) -> Result<Value, AppError> {
        let url = self.endpoint("search")?;
        tracing::info!("Searching registry for '{}'", query);
        self.get(
            &url,
            &[
                ("q", query.to_string()),
                ("items_per_page", items_per_page.to_string()),
                ("start_index", start_index.to_string()),
            ],
        )
        .await
    }

    /// Company search by registered-office location (`GET /advanced-search/companies`).
    pub async fn advanced_search_by_location(
        &self,
        location: &str,
        size: u32,
    ) -> Result<Value, AppError> {
        let url = self.endpoint("advanced-search/companies")?;
        tracing::info!("Advanced search for location '{}'", location);
        self.get(
            &url,
            &[("location", location.to_string()), ("size", size.to_string())],
        )
        .await
    }
}
