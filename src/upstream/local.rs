//! In-process invoker: each service name maps to an async handler closure.

use super::{UpstreamError, UpstreamInvoker};
use crate::core::types::ServiceEndpoint;
use async_trait::async_trait;
use axum::http::Method;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Owned description of one invocation handed to a local handler
#[derive(Debug, Clone)]
pub struct LocalCall {
    pub endpoint: ServiceEndpoint,
    pub target_path: String,
    pub method: Method,
    pub query: HashMap<String, String>,
    pub body: JsonValue,
}

type LocalHandler = Arc<dyn Fn(LocalCall) -> BoxFuture<'static, Result<JsonValue, String>> + Send + Sync>;

/// Invoker dispatching to handlers registered per service name
#[derive(Default, Clone)]
pub struct LocalInvoker {
    handlers: Arc<DashMap<String, LocalHandler>>,
}

impl LocalInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler backing a service
    pub fn register<F, Fut>(&self, service_name: impl Into<String>, handler: F)
    where
        F: Fn(LocalCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JsonValue, String>> + Send + 'static,
    {
        let handler: LocalHandler = Arc::new(move |call| Box::pin(handler(call)));
        self.handlers.insert(service_name.into(), handler);
    }
}

#[async_trait]
impl UpstreamInvoker for LocalInvoker {
    async fn invoke(
        &self,
        endpoint: &ServiceEndpoint,
        target_path: &str,
        method: &Method,
        query: &HashMap<String, String>,
        body: &JsonValue,
    ) -> Result<JsonValue, UpstreamError> {
        // Clone the Arc out so no DashMap guard is held across the await
        let handler = self
            .handlers
            .get(&endpoint.service_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| UpstreamError::NoHandler(endpoint.service_name.clone()))?;

        let call = LocalCall {
            endpoint: endpoint.clone(),
            target_path: target_path.to_string(),
            method: method.clone(),
            query: query.clone(),
            body: body.clone(),
        };

        handler(call).await.map_err(UpstreamError::Handler)
    }
}
