//! Anonymous installation identifier.
//!
//! A [`UserId`] groups telemetry events from one installation without
//! carrying any personal data. Fresh identifiers are `a-` followed by the
//! simple (hyphen-less) form of a UUID v4. Values read back from storage
//! are accepted verbatim, so older or hand-written identifiers survive.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix stamped on every freshly generated identifier.
pub const USER_ID_PREFIX: &str = "a-";

/// Opaque per-installation identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(format!("{USER_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Wrap an existing identifier string.
    ///
    /// Returns `None` for empty or whitespace-only input, since every
    /// dispatched event must carry a non-empty `user_id`.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
