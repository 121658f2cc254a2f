//! Identifier types for storybook records.
//!
//! All identifiers are opaque strings that end up as path segments in the
//! record store, so they share one validation rule: non-empty and free of the
//! characters the realtime database reserves for paths (`/ . # $ [ ]`).
//!
//! # Macro-based ID Types
//!
//! The `string_id_type!` macro keeps the four identifier types consistent in
//! serialization, parsing, and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters that may not appear in an identifier.
pub const RESERVED_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier contained a reserved path character.
    #[error("identifier {id:?} contains reserved character {ch:?}")]
    ReservedChar {
        /// The rejected identifier.
        id: String,
        /// The offending character.
        ch: char,
    },
}

/// Check that `value` can be used as a single store path segment.
///
/// # Errors
///
/// Returns `IdError` if the value is empty or contains a reserved character.
pub fn validate_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if let Some(ch) = value.chars().find(|c| RESERVED_KEY_CHARS.contains(c)) {
        return Err(IdError::ReservedChar {
            id: value.to_string(),
            ch,
        });
    }
    Ok(())
}

/// Macro to define a string-backed identifier type with standard trait implementations.
///
/// Generates a newtype wrapper around `String` with:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as validated string)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`, `AsRef<str>`
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier.
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the value is not a valid path segment.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate_segment(&value)?;
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id_type!(
    UserId,
    "A user identifier issued by the authentication provider.\n\nTreated as opaque; only validated as a store path segment."
);
string_id_type!(TemplateId, "A story template (catalog entry) identifier.");
string_id_type!(
    StoryId,
    "A personalized story identifier.\n\nComposed as `{templateId}_{userId}_{epochMillis}` when the service mints it."
);
string_id_type!(
    JobId,
    "A photo transform job identifier (UUID v4 when minted by the service)."
);

impl StoryId {
    /// Compose a story id from its parts.
    ///
    /// The timestamp component makes the id unique per checkout attempt; it
    /// cannot be re-derived from the template and user alone.
    #[must_use]
    pub fn compose(template_id: &TemplateId, user_id: &UserId, epoch_millis: i64) -> Self {
        // Both parts are already valid segments and `_` plus digits are allowed.
        Self(format!("{template_id}_{user_id}_{epoch_millis}"))
    }
}

impl JobId {
    /// Generate a new random job id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_id_composition() {
        let template = TemplateId::new("t1").unwrap();
        let user = UserId::new("u1").unwrap();
        let id = StoryId::compose(&template, &user, 1_700_000_000_123);
        assert_eq!(id.as_str(), "t1_u1_1700000000123");
    }

    #[test]
    fn rejects_reserved_characters() {
        assert_eq!(UserId::new(""), Err(IdError::Empty));
        assert!(matches!(
            UserId::new("a/b"),
            Err(IdError::ReservedChar { ch: '/', .. })
        ));
        assert!(TemplateId::new("bad.id").is_err());
        assert!(StoryId::new("x[0]").is_err());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: UserId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(ok.as_str(), "abc123");

        let bad: Result<UserId, _> = serde_json::from_str("\"a/b\"");
        assert!(bad.is_err());
    }

    #[test]
    fn generated_job_ids_are_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn display_and_debug() {
        let id = TemplateId::new("template-7").unwrap();
        assert_eq!(id.to_string(), "template-7");
        assert_eq!(format!("{id:?}"), "TemplateId(template-7)");
    }
}
