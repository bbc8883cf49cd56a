//! Region lookup adapters.

pub mod ipapi;

pub use ipapi::{DEFAULT_IPAPI_BASE_URL, IpApiClient};
