//! Reqwest-backed ipapi.co adapter.
//!
//! One `GET {base}/{ip}/json/` per lookup, bounded by the client timeout, no
//! retry. The adapter owns transport details only: HTTP status mapping and
//! JSON decoding of the `country_code` / `error` / `reason` fields.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use corpreg_auth::{RegionLookup, RegionLookupError};

pub const DEFAULT_IPAPI_BASE_URL: &str = "https://ipapi.co";

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Clone)]
pub struct IpApiClient {
    client: Client,
    base_url: String,
}

impl IpApiClient {
    /// Build a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, ip: &str) -> String {
        format!("{}/{}/json/", self.base_url, ip)
    }
}

#[async_trait]
impl RegionLookup for IpApiClient {
    #[instrument(skip(self), err)]
    async fn country_code(&self, ip: &str) -> Result<String, RegionLookupError> {
        let response = self
            .client
            .get(self.lookup_url(ip))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RegionLookupError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RegionLookupError::Transport(format!("failed to read response body: {e}")))?;

        if status != reqwest::StatusCode::OK {
            return Err(RegionLookupError::Status(
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        let decoded: IpApiResponse = serde_json::from_slice(&body)
            .map_err(|e| RegionLookupError::Decode(e.to_string()))?;
        if decoded.error {
            return Err(RegionLookupError::Service(decoded.reason));
        }

        debug!(country_code = %decoded.country_code, "Resolved caller region");
        Ok(decoded.country_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> IpApiClient {
        IpApiClient::new(server.base_url(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn returns_country_code() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/1.2.3.4/json/");
                then.status(200)
                    .json_body(json!({ "ip": "1.2.3.4", "country_code": "CY" }));
            })
            .await;

        let code = client(&server).country_code("1.2.3.4").await.unwrap();
        assert_eq!(code, "CY");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_ok_status_carries_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/1.2.3.4/json/");
                then.status(429).body("rate limited");
            })
            .await;

        let err = client(&server).country_code("1.2.3.4").await.unwrap_err();
        assert_eq!(err, RegionLookupError::Status("rate limited".to_string()));
        assert_eq!(err.to_string(), "got non OK response: rate limited");
    }

    #[tokio::test]
    async fn service_error_flag_yields_reason() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/127.0.0.1/json/");
                then.status(200)
                    .json_body(json!({ "error": true, "reason": "Reserved IP Address" }));
            })
            .await;

        let err = client(&server).country_code("127.0.0.1").await.unwrap_err();
        assert_eq!(err, RegionLookupError::Service("Reserved IP Address".to_string()));
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/1.2.3.4/json/");
                then.status(200).body("<html>");
            })
            .await;

        let err = client(&server).country_code("1.2.3.4").await.unwrap_err();
        assert!(matches!(err, RegionLookupError::Decode(_)));
    }

    #[test]
    fn trailing_slash_in_base_url_is_ignored() {
        let c = IpApiClient::new("https://ipapi.co/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.lookup_url("8.8.8.8"), "https://ipapi.co/8.8.8.8/json/");
    }
}
