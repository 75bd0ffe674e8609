//! Sequential multi-endpoint request fallback.
use crate::{
    endpoints::{build_url, EndpointList},
    transport::Transport,
    Error, Result,
};

/// Sends a request to each endpoint in order until one succeeds.
///
/// Every endpoint is tried at most once and attempts never overlap, so the worst-case latency is
/// the number of endpoints times the transport timeout. There is no backoff between attempts.
pub struct EndpointFallbackClient {
    transport: Box<dyn Transport + Send + Sync>,
}

impl EndpointFallbackClient {
    /// Create a fallback client on top of `transport`.
    pub fn new(transport: Box<dyn Transport + Send + Sync>) -> EndpointFallbackClient {
        EndpointFallbackClient { transport }
    }

    /// Post `payload` to `path` on each of `endpoints` in turn and return the first successful
    /// response body.
    ///
    /// # Errors
    ///
    /// Returns the error of the last endpoint if all of them fail, or [`Error::NoEndpoints`] if
    /// the list is empty.
    pub fn send(
        &self,
        endpoints: &EndpointList,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<String> {
        let mut last_error = None;

        for base_url in endpoints.urls() {
            let url = build_url(base_url, path);
            match self.transport.post_json(&url, payload) {
                Ok(body) => return Ok(body),
                Err(err) => {
                    log::debug!(target: "hyphen", url:display = url; "request failed, trying next endpoint: {:?}", err);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(Error::NoEndpoints))
    }
}
