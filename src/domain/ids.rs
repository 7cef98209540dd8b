//! Type-safe identifiers for sites, campaigns, experiments, and events.
//!
//! Site, campaign, and experiment identifiers are newtype wrappers around
//! [`uuid::Uuid`] (v4) so they cannot be confused with one another.
//! [`EventId`] is a string newtype because it is *derived* from the
//! provider id plus the provider-native event id (or a payload hash when
//! no native id exists), not randomly generated.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a merchant site.
    SiteId
}

uuid_id! {
    /// Unique identifier for a notification campaign.
    CampaignId
}

uuid_id! {
    /// Unique identifier for an A/B test.
    ExperimentId
}

/// Derived identifier for a canonical event.
///
/// Format is `{provider}:{native_id}` when the provider delivers a native
/// transaction/event id, or `{provider}:{hash16}` otherwise. The same raw
/// delivery always derives the same `EventId`, which is what makes
/// storage-level dedup of replayed webhooks possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Builds an event id from a provider id and a provider-native id.
    #[must_use]
    pub fn from_native(provider: &str, native_id: &str) -> Self {
        Self(format!("{provider}:{native_id}"))
    }

    /// Builds an event id from a provider id and a precomputed payload hash.
    #[must_use]
    pub fn from_hash(provider: &str, hash: &str) -> Self {
        Self(format!("{provider}:{hash}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        assert_ne!(SiteId::new(), SiteId::new());
        assert_ne!(CampaignId::new(), CampaignId::new());
    }

    #[test]
    fn site_id_serde_round_trip() {
        let id = SiteId::new();
        let json = serde_json::to_string(&id).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        let back: Option<SiteId> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(id));
    }

    #[test]
    fn event_id_from_native_is_prefixed() {
        let id = EventId::from_native("shopstack", "order-1001");
        assert_eq!(id.as_str(), "shopstack:order-1001");
    }

    #[test]
    fn event_ids_hash_in_maps() {
        use std::collections::HashMap;
        let id = EventId::from_native("paywave", "ch_1");
        let mut map = HashMap::new();
        map.insert(id.clone(), 1u32);
        assert_eq!(map.get(&id), Some(&1));
    }
}
