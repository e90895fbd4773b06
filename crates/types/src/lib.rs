//! Validated primitives shared across the visit workflow crates.
//!
//! Identifiers and clock selectors arriving from user input or configuration are
//! checked once, at the boundary, and trusted afterwards.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when constructing validated primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,
    /// The input was not a recognised AM/PM selector
    #[error("invalid time format {0:?} (expected AM or PM)")]
    InvalidTimeFormat(String),
}

// ============================================================================
// NON-EMPTY TEXT
// ============================================================================

/// A trimmed string that is guaranteed to contain at least one non-whitespace character.
///
/// Used for identifiers that must be present before a visit can be submitted,
/// such as the selected location uuid or the visit type uuid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if nothing remains after trimming.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// RESOURCE REFERENCES
// ============================================================================

/// A reference to a remote resource by uuid, with an optional human-readable label.
///
/// Catalog entries (locations, programs, visit types) all arrive in this shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResourceRef {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ResourceRef {
    pub fn new(uuid: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            display: Some(display.into()),
        }
    }

    /// The display label, falling back to the uuid when none was supplied.
    pub fn label(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.uuid)
    }
}

// ============================================================================
// TIME FORMAT
// ============================================================================

/// Half-of-day selector paired with a 12-hour clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TimeFormat {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl TimeFormat {
    /// The selector that matches a 24-hour clock hour.
    pub fn for_hour(hour: u32) -> Self {
        if hour >= 12 {
            Self::Pm
        } else {
            Self::Am
        }
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Am => f.write_str("AM"),
            Self::Pm => f.write_str("PM"),
        }
    }
}

impl FromStr for TimeFormat {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "PM" => Ok(Self::Pm),
            _ => Err(TextError::InvalidTimeFormat(s.to_owned())),
        }
    }
}
