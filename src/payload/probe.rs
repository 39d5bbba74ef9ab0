use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use crate::errors::WafsmithError;
use super::types::{Payload, Position, PAYLOAD_FIELD};
use tracing::{debug, warn};

/// Status reported for a probe whose request never produced a response.
pub const PROBE_FAILURE_STATUS: u16 = 500;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends a single payload and reports the status code the endpoint answered with.
#[derive(Clone)]
pub struct PayloadProbe {
    client: Client,
}

impl PayloadProbe {
    pub fn new(timeout: Duration) -> Result<Self, WafsmithError> {
        // Test stacks commonly run with self-signed certificates.
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| WafsmithError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn build_request(&self, payload: &Payload) -> RequestBuilder {
        let request = self.client.request(payload.method.to_reqwest(), &payload.endpoint);
        match &payload.position {
            Position::UrlParameters => request.query(&[(PAYLOAD_FIELD, payload.raw.as_str())]),
            Position::Header { name } => request.header(name.as_str(), payload.raw.as_str()),
            Position::Body(encoding) => request
                .header(CONTENT_TYPE, encoding.content_type())
                .body(encoding.encode(&payload.raw)),
        }
    }

    /// Never fails: transport errors, timeouts and invalid header values all
    /// collapse into [`PROBE_FAILURE_STATUS`].
    pub async fn probe(&self, payload: &Payload) -> u16 {
        debug!(
            endpoint = %payload.endpoint,
            method = %payload.method,
            position = %payload.position,
            payload = %payload.raw,
            "Sending payload"
        );
        match self.build_request(payload).send().await {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                warn!(payload = %payload.raw, error = %e, "Error sending request");
                PROBE_FAILURE_STATUS
            }
        }
    }
}
