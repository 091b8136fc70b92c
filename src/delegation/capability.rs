//! Capability classes
//!
//! A capability class names the kind of work a specialist handles (CULTURAL,
//! FOOD, OUTDOOR, ...). Names are normalized to upper case so requests coming
//! from an external classifier compare equal regardless of casing.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::policy::PolicyError;

/// A capability class identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    /// Create a capability from a raw name
    ///
    /// Surrounding whitespace is trimmed and the name is upper-cased. Only
    /// ASCII letters, digits, `_` and `-` are accepted.
    pub fn new(name: impl AsRef<str>) -> Result<Self, PolicyError> {
        let raw = name.as_ref();
        let trimmed = raw.trim();

        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PolicyError::InvalidCapability(raw.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn cultural() -> Self {
        Self("CULTURAL".to_string())
    }

    pub fn food() -> Self {
        Self("FOOD".to_string())
    }

    pub fn outdoor() -> Self {
        Self("OUTDOOR".to_string())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Capability {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::new(s)
    }
}

impl TryFrom<String> for Capability {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Capability::new(value)
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_normalizes_case_and_whitespace() {
        let cap = Capability::new("  food ").unwrap();
        assert_eq!(cap.as_str(), "FOOD");
        assert_eq!(cap, Capability::food());
    }

    #[test]
    fn test_capability_from_str() {
        assert_eq!(
            "cultural".parse::<Capability>().unwrap(),
            Capability::cultural()
        );
        assert_eq!(
            "Outdoor".parse::<Capability>().unwrap(),
            Capability::outdoor()
        );
        assert_eq!(
            "night-life".parse::<Capability>().unwrap().as_str(),
            "NIGHT-LIFE"
        );
    }

    #[test]
    fn test_capability_rejects_empty() {
        assert_eq!(
            Capability::new("   "),
            Err(PolicyError::InvalidCapability("   ".to_string()))
        );
    }

    #[test]
    fn test_capability_rejects_unparseable() {
        assert!("food & drink".parse::<Capability>().is_err());
        assert!("caf\u{e9}".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(format!("{}", Capability::outdoor()), "OUTDOOR");
    }

    #[test]
    fn test_capability_serialization() {
        let json = serde_json::to_string(&Capability::cultural()).unwrap();
        assert_eq!(json, "\"CULTURAL\"");

        let deserialized: Capability = serde_json::from_str("\"food\"").unwrap();
        assert_eq!(deserialized, Capability::food());

        assert!(serde_json::from_str::<Capability>("\"\"").is_err());
    }
}
