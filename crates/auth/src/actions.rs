//! Region-based approval of write actions.

use std::sync::Arc;

use tracing::debug;

use crate::region::{RegionLookup, RegionLookupError};

/// Country allowed to perform gated actions unless configured otherwise.
pub const DEFAULT_ALLOWED_COUNTRY: &str = "CY";

/// Write operations that require region approval. Update is not one of
/// them and never reaches the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateCompany,
    DeleteCompany,
}

/// IsActionAllowed: approves gated actions for callers in the allowed country.
///
/// - One lookup per call; allowed iff the country equals the allowed code.
/// - Lookup failure: returned as `Err` so the caller can log it apart from a
///   plain denial. Callers must treat `Err` as "not allowed".
///
/// Development-mode bypass is not a property of the gate; callers evaluate it.
#[derive(Clone)]
pub struct ActionGate {
    lookup: Arc<dyn RegionLookup>,
    allowed_country: String,
}

impl ActionGate {
    pub fn new(lookup: Arc<dyn RegionLookup>, allowed_country: impl Into<String>) -> Self {
        Self {
            lookup,
            allowed_country: allowed_country.into(),
        }
    }

    pub fn allowed_country(&self) -> &str {
        &self.allowed_country
    }

    pub async fn is_action_allowed(
        &self,
        action: Action,
        ip: &str,
    ) -> Result<bool, RegionLookupError> {
        let country = self.lookup.country_code(ip).await?;
        let allowed = country == self.allowed_country;
        debug!(?action, ip, country = %country, allowed, "region gate decision");
        Ok(allowed)
    }
}

impl core::fmt::Debug for ActionGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionGate")
            .field("allowed_country", &self.allowed_country)
            .finish_non_exhaustive()
    }
}
