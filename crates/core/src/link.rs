//! Link-key parsing.
//!
//! Outgoing links are stored as a mapping whose keys have the form
//! `"<uuid>@<version-token>"`. The version token is either the sentinel
//! `"current"` (a link to the draft head) or a SemVer string (a link to a
//! published version).

use uuid::Uuid;

use crate::error::CoreError;

/// Sentinel version token for a link to the draft head of a document.
pub const CURRENT_VERSION: &str = "current";

/// A parsed link key: the target document and the pinned version token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    pub target_id: Uuid,
    pub target_version: String,
}

impl LinkKey {
    /// Parse `"<uuid>@<version-token>"`.
    ///
    /// The token must be `"current"` or a valid SemVer string; anything else
    /// is an `InvalidArgument`.
    pub fn parse(key: &str) -> Result<Self, CoreError> {
        let (id_part, version_part) = key.split_once('@').ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "invalid link key {key:?}: expected \"<uuid>@<version>\""
            ))
        })?;

        let target_id = Uuid::parse_str(id_part).map_err(|_| {
            CoreError::InvalidArgument(format!("invalid link key {key:?}: bad target id"))
        })?;

        if version_part != CURRENT_VERSION {
            semver::Version::parse(version_part).map_err(|_| {
                CoreError::InvalidArgument(format!(
                    "invalid link key {key:?}: version must be {CURRENT_VERSION:?} or a SemVer string"
                ))
            })?;
        }

        Ok(LinkKey {
            target_id,
            target_version: version_part.to_string(),
        })
    }

    /// Whether the link points at the draft head rather than a published
    /// version.
    pub fn is_current(&self) -> bool {
        self.target_version == CURRENT_VERSION
    }
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.target_id, self.target_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_link() {
        let id = Uuid::new_v4();
        let key = LinkKey::parse(&format!("{id}@current")).unwrap();
        assert_eq!(key.target_id, id);
        assert!(key.is_current());
    }

    #[test]
    fn parses_semver_link() {
        let id = Uuid::new_v4();
        let key = LinkKey::parse(&format!("{id}@1.2.3")).unwrap();
        assert_eq!(key.target_version, "1.2.3");
        assert!(!key.is_current());
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(LinkKey::parse("not-a-link").is_err());
    }

    #[test]
    fn rejects_bad_uuid() {
        assert!(LinkKey::parse("not-a-uuid@current").is_err());
    }

    #[test]
    fn rejects_bad_version_token() {
        let id = Uuid::new_v4();
        assert!(LinkKey::parse(&format!("{id}@latest")).is_err());
        assert!(LinkKey::parse(&format!("{id}@v1")).is_err());
    }

    #[test]
    fn display_round_trips() {
        let id = Uuid::new_v4();
        let raw = format!("{id}@0.1.0");
        assert_eq!(LinkKey::parse(&raw).unwrap().to_string(), raw);
    }
}
