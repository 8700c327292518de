// src/acquire/http.rs

use crate::constants::USER_AGENT;
use crate::errors::{classify_failure, Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response};

/// Builds a `reqwest` client with the crate's user agent and optional default headers.
pub(crate) fn build_client(accept: Option<&'static str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(accept) = accept {
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
    }
    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|e| Error::NetworkOrProtocolError(format!("Failed to build HTTP client: {}", e)))
}

/// Turns a non-success response into a classified error, keeping a short body excerpt.
pub(crate) async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    log::debug!("{} failed with {}: {}", what, status, excerpt);
    Err(classify_failure(
        Some(status.as_u16()),
        &format!("{} returned {}: {}", what, status, excerpt.trim()),
    ))
}
