//! HTTP access to the divisor head's control API.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header::CACHE_CONTROL, Client};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::DeviceStatus,
    protocol::{
        decode_reply, AckReply, DivideQuery, DivideReply, Endpoint, MoveQuery, MoveReply,
        StatusReply,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ApiCallError;

#[async_trait]
pub trait DivisorApi: Send + Sync {
    async fn move_by(&self, query: MoveQuery) -> Result<MoveReply, ApiCallError>;
    async fn divide(&self, query: DivideQuery) -> Result<DivideReply, ApiCallError>;
    async fn reset(&self) -> Result<AckReply, ApiCallError>;
    async fn emergency_stop(&self) -> Result<AckReply, ApiCallError>;
    async fn enable_motor(&self) -> Result<AckReply, ApiCallError>;
    async fn status(&self) -> Result<DeviceStatus, ApiCallError>;
}

pub struct HttpDivisorApi {
    http: Client,
    base_url: String,
}

impl HttpDivisorApi {
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.route())
    }

    async fn get<T, Q>(&self, endpoint: Endpoint, query: Option<&Q>) -> Result<T, ApiCallError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .get(self.endpoint_url(endpoint))
            .header(CACHE_CONTROL, "no-cache");
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await?.error_for_status()?;
        let body = response.bytes().await?;
        debug!(%endpoint, bytes = body.len(), "device replied");
        Ok(decode_reply(&body)?)
    }
}

/// Validates the device address and strips any trailing slash so routes can
/// be appended directly.
pub fn parse_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid device url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "device url must start with http:// or https://, got '{raw}'"
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl DivisorApi for HttpDivisorApi {
    async fn move_by(&self, query: MoveQuery) -> Result<MoveReply, ApiCallError> {
        self.get(Endpoint::Move, Some(&query)).await
    }

    async fn divide(&self, query: DivideQuery) -> Result<DivideReply, ApiCallError> {
        self.get(Endpoint::Divide, Some(&query)).await
    }

    async fn reset(&self) -> Result<AckReply, ApiCallError> {
        self.get::<_, ()>(Endpoint::Reset, None).await
    }

    async fn emergency_stop(&self) -> Result<AckReply, ApiCallError> {
        self.get::<_, ()>(Endpoint::EmergencyStop, None).await
    }

    async fn enable_motor(&self) -> Result<AckReply, ApiCallError> {
        self.get::<_, ()>(Endpoint::EnableMotor, None).await
    }

    async fn status(&self) -> Result<DeviceStatus, ApiCallError> {
        let reply: StatusReply = self.get::<_, ()>(Endpoint::Status, None).await?;
        Ok(reply.data)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
