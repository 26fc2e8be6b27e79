use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use validator::ValidationError;

/// Characters the account database refuses in user and group names.
pub static ILLEGAL_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["/\\\[\]:|<>+=;,?*@\x00-\x1F]"#).unwrap());

/// Maximum length of a local user name.
pub const MAX_USER_NAME_LENGTH: usize = 20;

/// Maximum length of a local group name.
pub const MAX_GROUP_NAME_LENGTH: usize = 256;

/// Maximum length of a user or group description.
pub const MAX_DESCRIPTION_LENGTH: u64 = 48;

/// Maximum length of a user's full name.
pub const MAX_FULL_NAME_LENGTH: u64 = 256;

pub fn validate_user_name(name: &str) -> Result<(), ValidationError> {
    validate_account_name(name, MAX_USER_NAME_LENGTH)
}

pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    validate_account_name(name, MAX_GROUP_NAME_LENGTH)
}

/// Validate an account name against the local account database rules.
///
/// Ensures that the name:
/// - is not empty and does not exceed `max_len` characters
/// - contains none of `" / \ [ ] : | < > + = ; , ? * @` or control characters
/// - is not made up only of periods and spaces
pub fn validate_account_name(name: &str, max_len: usize) -> Result<(), ValidationError> {
    if name.is_empty() {
        let mut err = ValidationError::new("empty_name");
        err.message = Some(Cow::Borrowed("Name cannot be empty"));
        return Err(err);
    }

    if name.chars().count() > max_len {
        let mut err = ValidationError::new("name_too_long");
        err.message = Some(Cow::Owned(format!(
            "Name cannot exceed {} characters",
            max_len
        )));
        return Err(err);
    }

    if let Some(found) = ILLEGAL_NAME_CHARS.find(name) {
        let mut err = ValidationError::new("illegal_character");
        err.message = Some(Cow::Owned(format!(
            "Name contains the illegal character {:?}",
            found.as_str()
        )));
        return Err(err);
    }

    if name.chars().all(|c| c == '.' || c == ' ') {
        let mut err = ValidationError::new("dots_and_spaces");
        err.message = Some(Cow::Borrowed(
            "Name cannot consist solely of periods and spaces",
        ));
        return Err(err);
    }

    Ok(())
}

/// Flatten `validator` errors into one readable reason.
pub fn describe_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut reasons: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect();
    reasons.sort();
    reasons.join("; ")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("alice")]
    #[case("svc-backup")]
    #[case("Jane Doe")]
    #[case(".hidden")]
    #[case("a.b")]
    fn test_valid_user_names(#[case] name: &str) {
        assert!(validate_user_name(name).is_ok(), "{name:?} should be valid");
    }

    #[rstest]
    #[case("", "empty_name")]
    #[case("abcdefghijklmnopqrstu", "name_too_long")]
    #[case("bad/name", "illegal_character")]
    #[case("bad\\name", "illegal_character")]
    #[case("a[b]", "illegal_character")]
    #[case("who?", "illegal_character")]
    #[case("user@host", "illegal_character")]
    #[case("tab\tname", "illegal_character")]
    #[case("...", "dots_and_spaces")]
    #[case(". .", "dots_and_spaces")]
    fn test_invalid_user_names(#[case] name: &str, #[case] code: &str) {
        let err = validate_user_name(name).unwrap_err();
        assert_eq!(err.code, code, "{name:?}");
    }

    #[test]
    fn test_group_names_allow_longer_names() {
        let name = "g".repeat(200);
        assert!(validate_group_name(&name).is_ok());
        assert!(validate_user_name(&name).is_err());
        assert!(validate_group_name(&"g".repeat(257)).is_err());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 20 two-byte characters
        let name = "é".repeat(20);
        assert!(validate_user_name(&name).is_ok());
    }
}
