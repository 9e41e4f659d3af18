use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

/// The full wildcard token granting every permission.
pub const WILDCARD: &str = "*";

/// Permission string wrapper (`resource:action:scope` or `*`).
///
/// Permissions are compared as whole tokens. The only special value is the
/// full wildcard `*`; a `*` inside a segment (for example `post:*:own`) is a
/// legal literal but gets no pattern interpretation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Parses and validates a permission using the default validator.
    ///
    /// This trims whitespace and normalizes to lowercase.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        Self::new_with(value, &DefaultPermissionValidator, true)
    }

    /// Parses and validates a permission with a custom validator.
    ///
    /// When `normalize` is true, the value is trimmed and lowercased
    /// before validation.
    pub fn new_with(
        value: impl AsRef<str>,
        validator: &dyn PermissionValidator,
        normalize: bool,
    ) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not be empty".to_string(),
            ));
        }
        let normalized = if normalize {
            trimmed.to_ascii_lowercase()
        } else {
            trimmed.to_string()
        };
        validator.validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Creates a permission from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the full wildcard permission.
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    /// Returns whether this permission is the full wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Returns whether this granted permission satisfies `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        self.is_wildcard() || self == required
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// Permission validator interface for custom rules.
pub trait PermissionValidator: Send + Sync {
    /// Validates a normalized permission string.
    fn validate(&self, value: &str) -> Result<()>;
}

/// Default strict permission validator.
///
/// Accepts the full wildcard `*` or exactly three `:`-separated segments
/// where each segment is `*` or lowercase alphanumeric with `_`/`-`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissionValidator;

impl PermissionValidator for DefaultPermissionValidator {
    fn validate(&self, value: &str) -> Result<()> {
        if value == WILDCARD {
            return Ok(());
        }
        let segments: Vec<&str> = value.split(':').collect();
        if segments.len() != 3 {
            return Err(Error::InvalidPermission(
                "permission must be in resource:action:scope format".to_string(),
            ));
        }
        for segment in segments {
            if !is_valid_segment(segment) {
                return Err(Error::InvalidPermission(
                    "permission segment contains invalid characters".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn is_valid_segment(segment: &str) -> bool {
    if segment == WILDCARD {
        return true;
    }
    if segment.is_empty() {
        return false;
    }
    segment
        .chars()
        .all(|ch| matches!(ch, 'a'..='z' | '0'..='9' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_should_trim_and_lowercase() {
        let permission = Permission::try_from(" Users:Read:Own ").unwrap();
        assert_eq!(permission.as_str(), "users:read:own");
    }

    #[test]
    fn try_from_should_accept_full_wildcard() {
        let permission = Permission::try_from("*").unwrap();
        assert!(permission.is_wildcard());
    }

    #[test]
    fn try_from_should_reject_missing_scope() {
        let result = Permission::try_from("users:read");
        assert!(matches!(result, Err(Error::InvalidPermission(_))));
    }

    #[test]
    fn try_from_should_reject_empty_segments() {
        let result = Permission::try_from("users::own");
        assert!(matches!(result, Err(Error::InvalidPermission(_))));
    }

    #[test]
    fn wildcard_should_grant_any_permission() {
        let wildcard = Permission::wildcard();
        let required = Permission::try_from("monitoring:read:any").unwrap();
        assert!(wildcard.grants(&required));
    }

    #[test]
    fn segment_wildcard_should_only_match_exact_token() {
        let granted = Permission::try_from("post:*:own").unwrap();
        assert!(granted.grants(&Permission::try_from("post:*:own").unwrap()));
        assert!(!granted.grants(&Permission::try_from("post:read:own").unwrap()));
    }
}
