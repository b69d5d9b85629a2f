//! Opaque identifiers for sessions and streams.
//!
//! Format: `<prefix>_<millis-hex>_<uuid-v4-simple>`, e.g.
//! `sess_18f2a3b4c5d_0c1e...`. The time component keeps ids roughly sortable
//! in logs; the random component makes them unguessable.

use std::fmt;

use serde::{Deserialize, Serialize};

fn generate(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{prefix}_{millis:x}_{}", uuid::Uuid::new_v4().simple())
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Identifier prefix, including the separator.
            pub const PREFIX: &'static str = concat!($prefix, "_");

            /// Generate a fresh, unguessable identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(generate($prefix))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifies one suspended tool-calling conversation.
    SessionId,
    "sess"
);

opaque_id!(
    /// Identifies one in-flight invocation.
    StreamId,
    "str"
);
