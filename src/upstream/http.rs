//! HTTP invoker backed by `reqwest`.
//!
//! `location` is the endpoint's base URL; the target path is joined onto it. JSON bodies
//! are sent for methods that carry one, inbound query parameters are appended in key
//! order, responses are parsed as JSON and fall back to a
//! plain string when the upstream answers with something else.

use super::{UpstreamError, UpstreamInvoker};
use crate::core::types::ServiceEndpoint;
use async_trait::async_trait;
use axum::http::Method;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Forwards calls to endpoints over HTTP
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: Client,
}

impl HttpInvoker {
    pub fn new() -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("travel-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn target_url(
        endpoint: &ServiceEndpoint,
        target_path: &str,
        query: &HashMap<String, String>,
    ) -> Result<Url, UpstreamError> {
        let invalid = |reason: String| UpstreamError::InvalidLocation {
            location: endpoint.location.clone(),
            reason,
        };

        let mut base = Url::parse(&endpoint.location).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("location cannot be a base URL".to_string()));
        }
        // Keep any path prefix of the location
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base
            .join(target_path.trim_start_matches('/'))
            .map_err(|e| invalid(e.to_string()))?;

        if !query.is_empty() {
            let mut pairs: Vec<_> = query.iter().collect();
            pairs.sort();
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    fn convert_method(method: &Method) -> reqwest::Method {
        match *method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::DELETE => reqwest::Method::DELETE,
            Method::PATCH => reqwest::Method::PATCH,
            Method::HEAD => reqwest::Method::HEAD,
            Method::OPTIONS => reqwest::Method::OPTIONS,
            _ => reqwest::Method::from_bytes(method.as_str().as_bytes())
                .unwrap_or(reqwest::Method::GET),
        }
    }
}

#[async_trait]
impl UpstreamInvoker for HttpInvoker {
    async fn invoke(
        &self,
        endpoint: &ServiceEndpoint,
        target_path: &str,
        method: &Method,
        query: &HashMap<String, String>,
        body: &JsonValue,
    ) -> Result<JsonValue, UpstreamError> {
        let url = Self::target_url(endpoint, target_path, query)?;
        debug!(service = %endpoint.service_name, url = %url, method = %method, "Forwarding upstream request");

        let mut request = self.client.request(Self::convert_method(method), url);
        if !body.is_null() {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)))
    }
}
