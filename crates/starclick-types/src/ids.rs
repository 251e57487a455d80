//! Type-safe identifier wrappers.
//!
//! Runtime entities (players, ledger entries, commands) use UUID v7
//! newtypes so they sort by creation time and index well. Catalog
//! entries (items, achievements) are keyed by stable human-readable
//! slugs such as `"double_click"` or `"clicks_1000"`, because the
//! catalog is authored by hand and referenced from client code.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Generates a newtype wrapper around a catalog slug.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create a key from any string-like value.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Borrow the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }
    };
}

define_id! {
    /// Opaque player identifier, resolved from credentials by the caller.
    PlayerId
}

define_id! {
    /// Unique identifier for a ledger entry.
    LedgerEntryId
}

define_id! {
    /// Identifier shared by every ledger entry produced by one command.
    CorrelationId
}

define_key! {
    /// Catalog key of a purchasable item (upgrade, booster, pack, artifact, bundle).
    ItemId
}

define_key! {
    /// Catalog key of an achievement.
    AchievementId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_displays_inner_uuid() {
        let id = PlayerId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
        assert_eq!(Uuid::from(id), id.0);
    }

    #[test]
    fn keys_serialize_as_plain_strings() {
        let key = ItemId::from("double_click");
        let json = serde_json::to_string(&key).ok();
        assert_eq!(json.as_deref(), Some("\"double_click\""));
        assert_eq!(key.to_string(), "double_click");
    }
}
