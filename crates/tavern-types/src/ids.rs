//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Characters, campaigns, users and events each get a strongly-typed ID so
//! a campaign ID can never be passed where a character ID is expected. All
//! IDs use UUID v7 (time-ordered), which keeps event IDs sortable in
//! publication order.

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

define_id! {
    /// Unique identifier for a character (the aggregate every mutation targets).
    CharacterId
}

define_id! {
    /// Unique identifier for a campaign that groups characters.
    CampaignId
}

define_id! {
    /// Unique identifier for a user acting on or owning a character.
    UserId
}

define_id! {
    /// Unique identifier for a published domain event.
    EventId
}
