//! UAZ REST backend client.
//!
//! Every response is an envelope `{ success, data | error }`; see
//! [`types::decode_envelope`] for how failures are classified.

mod backend;
pub(crate) mod types;


use std::time::Duration;
use tracing::debug;
use uazdash_core::{config::BackendConfig, error::UazError};

/// HTTP client for the UAZ backend.
pub struct UazClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UazClient {
    /// Create from config values.
    pub fn from_config(config: &BackendConfig) -> Result<Self, UazError> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| UazError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    /// Send a request and decode its envelope.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        ctx: types::CallContext<'_>,
    ) -> Result<Option<T>, UazError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| UazError::Http(format!("{}: request failed: {e}", ctx.what)))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| UazError::Http(format!("{}: failed to read body: {e}", ctx.what)))?;
        debug!("uaz: {} -> {status}", ctx.what);
        types::decode_envelope(status, &body, ctx)
    }
}
