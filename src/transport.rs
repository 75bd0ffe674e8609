//! HTTP transport used to reach horizon endpoints.
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use url::Url;

use crate::{Error, Result};

/// Sends a single JSON `POST` request.
///
/// Implementations must treat any non-2xx response as an error. The default implementation is
/// [`HttpTransport`]; a custom one can be supplied with
/// [`ClientConfig::transport`](crate::ClientConfig::transport).
pub trait Transport {
    /// Post `body` to `url` and return the response body.
    fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<String>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Header carrying the public key.
    pub const API_KEY_HEADER: &'static str = "x-api-key";

    /// Create a transport that authenticates with `public_key` and gives up on each request after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidApiKey`] if `public_key` is not a valid header value.
    /// - [`Error::Network`] if the underlying client cannot be initialized.
    pub fn new(public_key: &str, timeout: Duration) -> Result<HttpTransport> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            Self::API_KEY_HEADER,
            HeaderValue::from_str(public_key).map_err(|_| Error::InvalidApiKey)?,
        );

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<String> {
        let response = self.client.post(url.clone()).json(body).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text()?)
    }
}
