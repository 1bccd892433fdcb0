//! Raw HTTP transport.
//!
//! A `Transport` performs exactly one call: no token lookup, no refresh.
//! `AuthInterceptor` layers authentication on top, and the refresh call
//! itself goes straight through the transport so a failing refresh can
//! never recurse into refresh handling.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use super::{ApiError, ApiRequest};

pub trait Transport: Send + Sync {
    /// Send `request`, attaching `bearer` as the authorization credential
    /// when given. Non-success statuses come back as `ApiError`s; an empty
    /// success body is `Value::Null`.
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Value, ApiError>>;
}

/// `Transport` backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing client (and its connection pool)
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Value, ApiError> {
        let url = self.url(request.path());
        debug!(method = %request.method(), url = %url, retry = request.is_retry(), "Sending request");

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .header(header::ACCEPT, "application/json");
        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = Self::check_response(builder.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e)))
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        bearer: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(self.execute(request, bearer))
    }
}
