//! Common validation utilities.

use validator::ValidationError;

/// Characters used in group codes. Excludes 0, O, 1 and I.
pub const GROUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of every group code.
pub const GROUP_CODE_LENGTH: usize = 6;

/// Canonical form of a user-typed group code: trimmed and upper-cased.
pub fn normalize_group_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Validates that a group code has the expected length and alphabet.
///
/// The code is checked as given; callers normalise user input first.
pub fn validate_group_code(code: &str) -> Result<(), ValidationError> {
    let well_formed = code.len() == GROUP_CODE_LENGTH
        && code.bytes().all(|b| GROUP_CODE_ALPHABET.contains(&b));

    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("group_code_format");
        err.message = Some("Group code must be 6 characters (A-Z, 2-9)".into());
        Err(err)
    }
}

/// Validates that a string is not empty after trimming whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_group_code() {
        assert_eq!(normalize_group_code("  abc234 "), "ABC234");
    }

    #[test]
    fn test_validate_group_code_ok() {
        assert!(validate_group_code("ABC234").is_ok());
        assert!(validate_group_code("ZZZZZZ").is_ok());
    }

    #[test]
    fn test_validate_group_code_wrong_length() {
        assert!(validate_group_code("ABC23").is_err());
        assert!(validate_group_code("ABC2345").is_err());
        assert!(validate_group_code("").is_err());
    }

    #[test]
    fn test_validate_group_code_confusing_chars() {
        assert!(validate_group_code("ABC0DE").is_err());
        assert!(validate_group_code("ABCODE").is_err());
        assert!(validate_group_code("ABC1DE").is_err());
        assert!(validate_group_code("ABCIDE").is_err());
    }

    #[test]
    fn test_validate_group_code_is_case_sensitive() {
        assert!(validate_group_code("abc234").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Amina").is_ok());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("").is_err());
    }

    #[test]
    fn test_validation_error_message() {
        let err = validate_group_code("bad").unwrap_err();
        assert_eq!(err.code, "group_code_format");
        assert!(err.message.unwrap().contains("6 characters"));
    }
}
