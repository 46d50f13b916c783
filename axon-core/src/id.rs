//! Typed identifiers.
//!
//! Every reference an effect carries is one of these wrappers. Effects
//! never hold live handles; the interpreter resolves the string behind
//! an id to whatever resource it names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers keep agent ids, timer keys and child tags apart.
/// They are plain strings underneath with no format requirement.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(AgentId, "Identifier of an agent and of the server hosting it.");
typed_id!(SignalId, "Unique identifier of a single signal.");
typed_id!(CorrelationId, "Pairs a request signal with its reply.");
typed_id!(ActionName, "Name under which an action is registered.");
typed_id!(TimerKey, "Key of a pending timer; re-arming a key replaces the timer.");
typed_id!(ChildTag, "Tag under which a spawned child is tracked.");
typed_id!(ChildRef, "Opaque handle a supervisor returns for a started child.");

impl SignalId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl CorrelationId {
    /// Generate a fresh random correlation id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
