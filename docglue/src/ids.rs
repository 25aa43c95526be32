//! Identifier generation
//!
//! ```rust
//! use docglue::ids::generate_uuid;
//!
//! let id = generate_uuid("user");
//! assert!(id.starts_with("user-"));
//! ```

use uuid::Uuid;

/// Separator between a prefix and the generated UUID
pub const PREFIX_SEPARATOR: char = '-';

/// Generate a random (v4) identifier, optionally prefixed.
///
/// A non-empty `prefix` yields `prefix-<uuid>`; an empty one yields the bare
/// hyphenated UUID.
#[must_use]
pub fn generate_uuid(prefix: &str) -> String {
    let id = Uuid::new_v4();
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}{PREFIX_SEPARATOR}{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_uuid_without_prefix() {
        let id = generate_uuid("");
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_prefixed_uuid() {
        let id = generate_uuid("user");
        let suffix = id.strip_prefix("user-").unwrap();
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn test_successive_ids_differ() {
        assert_ne!(generate_uuid("user"), generate_uuid("user"));
        assert_ne!(generate_uuid(""), generate_uuid(""));
    }
}
