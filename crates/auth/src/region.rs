//! Region lookup port: caller IP in, country code out.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionLookupError {
    /// Network failure or timeout talking to the lookup service.
    #[error("region lookup transport error: {0}")]
    Transport(String),

    /// The service answered with a non-OK status.
    #[error("got non OK response: {0}")]
    Status(String),

    /// The service answered OK but reported an error (e.g. reserved address).
    #[error("region lookup failed: {0}")]
    Service(String),

    /// The response body could not be decoded.
    #[error("region lookup decode error: {0}")]
    Decode(String),
}

/// Resolves the country of a caller address.
///
/// Implementations perform a single call with their own timeout and no retry.
#[async_trait]
pub trait RegionLookup: Send + Sync {
    async fn country_code(&self, ip: &str) -> Result<String, RegionLookupError>;
}
