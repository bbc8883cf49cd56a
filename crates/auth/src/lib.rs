//! `corpreg-auth` — caller identity and write-action approval.
//!
//! This crate is intentionally decoupled from HTTP and storage. The two checks
//! are independent: a token proves who the caller is, the action gate decides
//! whether the caller's region may perform a write.

pub mod actions;
pub mod claims;
pub mod region;

pub use actions::{Action, ActionGate, DEFAULT_ALLOWED_COUNTRY};
pub use claims::{
    CallerIdentity, HmacTokenVerifier, TokenClaims, TokenError, TokenVerifier, bearer_token,
    verify_user,
};
pub use region::{RegionLookup, RegionLookupError};
