//! HTTP client for delivery webhook endpoints.

use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use mailhub_core::config::delivery::WebhookEndpointConfig;
use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

use crate::types::{Request, Response};

/// HTTP client bound to one configured webhook endpoint.
#[derive(Debug)]
pub struct WebhookClient {
    endpoint: WebhookEndpointConfig,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl WebhookClient {
    /// Build a client for an endpoint, assembling its header set once.
    pub fn new(endpoint: WebhookEndpointConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_str(name.trim()).map_err(|e| {
                AppError::configuration(format!(
                    "Invalid header name '{name}' for webhook '{}': {e}",
                    endpoint.id
                ))
            })?;
            let value = HeaderValue::from_str(value.trim()).map_err(|e| {
                AppError::configuration(format!(
                    "Invalid header value for webhook '{}': {e}",
                    endpoint.id
                ))
            })?;
            headers.insert(name, value);
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = &endpoint.auth {
            let credentials = STANDARD.encode(format!("{}:{}", auth.username, auth.secret));
            let value = HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|e| {
                AppError::configuration(format!(
                    "Invalid credentials for webhook '{}': {e}",
                    endpoint.id
                ))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(|e| {
                AppError::external_service(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            endpoint,
            headers,
            client,
        })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &WebhookEndpointConfig {
        &self.endpoint
    }

    /// POST a delivery request and parse the endpoint's verdict.
    pub async fn send(&self, request: &Request) -> AppResult<Response> {
        let response = self
            .client
            .post(&self.endpoint.url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service(format!(
                    "Webhook request to '{}' failed: {e}",
                    self.endpoint.id
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service(format!(
                "Webhook '{}' returned {}: {}",
                self.endpoint.id,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let limit = self.endpoint.max_response_size_bytes;
        if response
            .content_length()
            .is_some_and(|len| len as usize > limit)
        {
            return Err(AppError::external_service(format!(
                "Webhook '{}' response too large",
                self.endpoint.id
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            AppError::external_service(format!(
                "Failed to read webhook response from '{}': {e}",
                self.endpoint.id
            ))
        })?;
        if body.len() > limit {
            return Err(AppError::external_service(format!(
                "Webhook '{}' response too large",
                self.endpoint.id
            )));
        }

        serde_json::from_slice(&body).map_err(|e| {
            AppError::external_service(format!(
                "Failed to parse webhook response from '{}': {e}",
                self.endpoint.id
            ))
        })
    }
}
