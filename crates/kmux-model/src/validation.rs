//! Session-name grammar (spec ยง6): non-empty, free of path-hostile
//! characters, not a directory reference. This predicate is the single
//! gate every mutating entry point (save, attach, rename, ...) calls
//! before touching disk or the emulator.

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

pub fn is_valid_session_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    !name.chars().any(|c| FORBIDDEN.contains(&c))
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid session name: {0:?}")]
pub struct InvalidSessionName(pub String);

/// Validate and return an owned copy, or a descriptive error.
pub fn validate_session_name(name: &str) -> Result<String, InvalidSessionName> {
    if is_valid_session_name(name) {
        Ok(name.to_string())
    } else {
        Err(InvalidSessionName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["demo", "my-session", "proj_1", "a"] {
            assert!(is_valid_session_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert!(!is_valid_session_name(""));
    }

    #[test]
    fn test_rejects_dot_and_dotdot() {
        assert!(!is_valid_session_name("."));
        assert!(!is_valid_session_name(".."));
    }

    #[test]
    fn test_rejects_forbidden_chars() {
        for name in ["a/b", "a\\b", "a:b", "a*b", "a?b", "a\"b", "a<b", "a>b", "a|b"] {
            assert!(!is_valid_session_name(name), "{name} should be invalid");
        }
    }

    #[test]
    fn test_validate_session_name_error_message() {
        let err = validate_session_name("bad/name").unwrap_err();
        assert!(err.to_string().contains("bad/name"));
    }

    #[test]
    fn test_validate_session_name_ok() {
        assert_eq!(validate_session_name("demo").unwrap(), "demo");
    }
}
