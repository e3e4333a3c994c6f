use crate::errors::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Public Companies House data API.
pub const DEFAULT_BASE_URL: &str = "https://api.company-information.service.gov.uk/";

/// Credential file looked up in the working directory when `CH_AUTH_FILE` is unset.
pub const DEFAULT_AUTH_FILE: &str = "authentication.txt";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub port: u16,
    pub max_concurrent_companies: usize,
    pub max_in_flight_requests: usize,
    pub request_timeout_secs: u64,
}

#[derive(Deserialize)]
struct AuthFile {
    api_key: Option<String>,
}

/// Resolve the registry credential.
///
/// A non-empty `env_value` wins; otherwise the JSON file at `auth_file` must carry a
/// non-empty `api_key`. Anything else is a configuration error, never an empty key.
pub fn load_credential(
    env_value: Option<String>,
    auth_file: Option<&Path>,
) -> Result<String, AppError> {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }

    let Some(path) = auth_file else {
        return Err(AppError::ConfigurationError(
            "CH_API_KEY is not set and no credential file is available".to_string(),
        ));
    };

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigurationError(format!(
            "Credential file '{}' could not be read: {}",
            path.display(),
            e
        ))
    })?;

    let parsed: AuthFile = serde_json::from_str(&contents).map_err(|e| {
        AppError::ConfigurationError(format!(
            "Invalid JSON in credential file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parsed
        .api_key
        .filter(|k| !k.trim().is_empty())
        .map(|k| k.trim().to_string())
        .ok_or_else(|| {
            AppError::ConfigurationError(format!(
                "Credential file '{}' has no api_key",
                path.display()
            ))
        })
}

fn parse_positive<T: std::str::FromStr + PartialOrd + Default>(
    name: &str,
    default: &str,
) -> anyhow::Result<T> {
    let value: T = std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a positive number", name))?;
    if value <= T::default() {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let auth_file = std::env::var("CH_AUTH_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                let fallback = PathBuf::from(DEFAULT_AUTH_FILE);
                fallback.exists().then_some(fallback)
            });

        let config = Self {
            api_key: load_credential(std::env::var("CH_API_KEY").ok(), auth_file.as_deref())?,
            base_url: std::env::var("CH_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim()
                .to_string(),
            data_dir: std::env::var("DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            max_concurrent_companies: parse_positive("MAX_CONCURRENT_COMPANIES", "4")?,
            max_in_flight_requests: parse_positive("MAX_IN_FLIGHT_REQUESTS", "8")?,
            request_timeout_secs: parse_positive("REQUEST_TIMEOUT_SECS", "30")?,
        };

        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            anyhow::bail!("CH_BASE_URL must start with http:// or https://");
        }

        // Log successful configuration load (without the credential)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Registry base URL: {}", config.base_url);
        tracing::debug!("Data directory: {}", config.data_dir.display());
        tracing::debug!(
            "Concurrency: {} companies, {} in-flight requests",
            config.max_concurrent_companies,
            config.max_in_flight_requests
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
