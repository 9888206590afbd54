//! Job portal classification and applier-queue routing.
//!
//! The closed set of "native provider" portals matches
//! `appliers_config.py::PROVIDER_PORTALS`. Anything outside that set is a
//! browser-automation ("skyvern") portal.

use serde::{Deserialize, Serialize};

pub const NATIVE_PROVIDER_PORTALS: &[&str] = &[
    "workday",
    "greenhouse",
    "smartrecruiters",
    "dice",
    "applytojob",
    "lever",
    "workable",
    "bamboohr",
    "breezyhr",
    "infojobs",
    "infojobs_net",
    "totaljobs",
];

/// Which downstream applier queue an application should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplierTarget {
    /// Native, non-browser-automation applier.
    Providers,
    /// Browser-automation fallback.
    Skyvern,
}

/// A job portal. Recognized native portals deserialize to `Portal::Known`;
/// anything else round-trips through `Portal::Other` so ingress never fails
/// on a portal name this core doesn't specifically reason about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Portal {
    Known(String),
    Other(String),
}

impl Portal {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if NATIVE_PROVIDER_PORTALS.contains(&raw.as_str()) {
            Portal::Known(raw)
        } else {
            Portal::Other(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Portal::Known(s) | Portal::Other(s) => s,
        }
    }

    /// Routing rule: a closed set of portal names routes to the providers
    /// queue; everything else falls back to skyvern.
    pub fn routes_to(&self) -> ApplierTarget {
        match self {
            Portal::Known(_) => ApplierTarget::Providers,
            Portal::Other(_) => ApplierTarget::Skyvern,
        }
    }
}

impl Serialize for Portal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Portal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Portal::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_portals_route_to_providers() {
        assert_eq!(Portal::new("workday").routes_to(), ApplierTarget::Providers);
        assert_eq!(Portal::new("totaljobs").routes_to(), ApplierTarget::Providers);
    }

    #[test]
    fn unknown_portals_route_to_skyvern() {
        assert_eq!(Portal::new("custom-ats").routes_to(), ApplierTarget::Skyvern);
    }

    #[test]
    fn round_trips_through_json() {
        let p = Portal::new("workday");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"workday\"");
        let back: Portal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
