//! Validated primitive types shared across the expediente workspace.
//!
//! These types push input validation to the edges: once a value has been
//! constructed it is known to be well-formed, so inner layers never need to
//! re-check it.

use uuid::Uuid;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing entity identifiers.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The input was not a structurally valid identifier
    #[error("invalid identifier")]
    Invalid,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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

/// An opaque, stable entity identifier.
///
/// Wraps a UUID so that identifier parsing happens exactly once, at the
/// boundary. Structural validity (is this string an identifier at all?) is
/// distinct from existence (does the entity resolve?), which is checked
/// separately against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Invalid` if the input is not a valid UUID.
    pub fn parse(input: &str) -> Result<Self, IdError> {
        Uuid::parse_str(input.trim())
            .map(Self)
            .map_err(|_| IdError::Invalid)
    }

    /// Returns the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EntityId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  hello  ").expect("should accept non-empty input");
        assert_eq!(text.as_str(), "hello");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace_only() {
        let err = NonEmptyText::new("   ").expect_err("whitespace-only input should fail");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn test_entity_id_round_trips_through_string() {
        let id = EntityId::new();
        let parsed = EntityId::parse(&id.to_string()).expect("should parse its own display form");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_entity_id_rejects_garbage() {
        let err = EntityId::parse("not-an-id").expect_err("garbage should not parse");
        assert!(matches!(err, IdError::Invalid));
    }

    #[test]
    fn test_entity_id_serializes_as_plain_string() {
        let id = EntityId::new();
        let json = serde_json::to_string(&id).expect("should serialize");
        assert_eq!(json, format!("\"{}\"", id));
    }
}
