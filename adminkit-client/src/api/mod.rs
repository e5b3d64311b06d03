//! HTTP access to the admin console backend
//!
//! The backend wraps every payload in an [`ApiEnvelope`]; failures carry a
//! human-readable `messages` field that is surfaced to the user verbatim.

use adminkit_core::{config_error, ApiConfig, ApiEnvelope, ApiError, ApiResult, ConsoleResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub mod endpoints;
pub mod http;


pub use http::HttpConsoleApi;

/// Scheme prefix of the credential header value
pub const CREDENTIAL_SCHEME: &str = "Token";

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &ApiConfig) -> ConsoleResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| config_error!(format!("Invalid user agent: {}", e), "create_client", e))?,
    );

    for (key, value) in &config.headers {
        let header_name =
            reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                config_error!(
                    format!("Invalid header name '{}': {}", key, e),
                    "create_client",
                    e
                )
            })?;

        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            config_error!(
                format!("Invalid header value for '{}': {}", key, e),
                "create_client",
                e
            )
        })?;

        headers.insert(header_name, header_value);
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| {
            config_error!(format!("Failed to create HTTP client: {}", e), "create_client", e)
        })?;

    Ok(client)
}

/// Error envelope; every field is optional since failing backends are not trusted
/// to send a complete one
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Option<String>,
}

/// Convert a non-success response body into an [`ApiError`]
pub(crate) fn backend_error(status: u16, body: &str) -> ApiError {
    let messages = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.messages)
        .filter(|m| !m.trim().is_empty());

    ApiError::Backend { status, messages }
}

/// Decode a success body and unwrap its envelope
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str::<ApiEnvelope<T>>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| ApiError::Decode(e.to_string()))
}
