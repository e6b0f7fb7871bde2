//! Transfer seam between the engine and the network

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::error::DispatchError;
use crate::config::DispatchConfig;

/// Performs one outbound call and returns the response body
///
/// Each call is independent; the engine multiplexes many of them on a single
/// reactor, so implementations must not block the thread.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, DispatchError>;
}

/// HTTP transport backed by a shared reqwest connection pool
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn from_config(config: &DispatchConfig) -> Result<Self, DispatchError> {
        debug!(?config, "ReqwestTransport::from_config: called");
        let timeout = config.timeout();
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, timeout })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, DispatchError> {
        debug!(%url, "ReqwestTransport::get: called");
        let response = self.http.get(url.clone()).send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "ReqwestTransport::get: non-success status");
            return Err(DispatchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!(bytes = body.len(), "ReqwestTransport::get: body received");
        Ok(body.to_vec())
    }
}

impl ReqwestTransport {
    fn classify(&self, e: reqwest::Error) -> DispatchError {
        if e.is_timeout() {
            DispatchError::Timeout(self.timeout)
        } else {
            DispatchError::Network(e)
        }
    }
}
