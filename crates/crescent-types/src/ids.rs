//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Creatures and changes carry strongly-typed IDs so the two can never be
//! mixed up at compile time. All IDs use UUID v7 (time-ordered), which also
//! gives changes a natural creation order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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
    /// Unique identifier for a creature.
    CreatureId
}

define_id! {
    /// Unique identifier for a form change.
    ChangeId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_time_ordered() {
        let first = ChangeId::new();
        let second = ChangeId::new();
        assert!(first < second);
    }

    #[test]
    fn id_roundtrips_through_uuid() {
        let id = CreatureId::new();
        let raw: Uuid = id.into();
        assert_eq!(CreatureId::from(raw), id);
        assert_eq!(id.to_string(), raw.to_string());
    }

    #[test]
    fn id_serializes_as_plain_uuid() {
        let id = CreatureId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.into_inner()));
    }
}
