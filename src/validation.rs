//! Field validation for incoming requests
//!
//! All checks operate on already-trimmed input; see [`sanitize`].

use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::models::Priority;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$";

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Minimum display name length in characters
pub const MIN_NAME_LEN: usize = 2;

/// Maximum task title length in characters
pub const MAX_TITLE_LEN: usize = 255;

fn email_regex() -> Option<&'static regex_lite::Regex> {
    static EMAIL_RE: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| regex_lite::Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
}

/// Trim surrounding whitespace
pub fn sanitize(input: &str) -> String {
    input.trim().to_string()
}

/// Check an email address against the accepted shape
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    match email_regex() {
        Some(re) if re.is_match(email) => Ok(()),
        _ => Err(ValidationError::InvalidEmail),
    }
}

/// Password must be at least 8 characters with at least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::field(
            "name",
            format!("must be at least {} characters", MIN_NAME_LEN),
        ));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::field("title", "is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::field(
            "title",
            format!("must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(())
}

/// Parse an optional priority, defaulting to medium when absent or empty
pub fn parse_priority(priority: Option<&str>) -> Result<Priority, ValidationError> {
    match priority.map(str::trim) {
        None | Some("") => Ok(Priority::default()),
        Some(p) => p.parse(),
    }
}

/// Parse an RFC 3339 due date
///
/// `None` and the empty string both mean "no due date".
pub fn parse_due_date(due_date: Option<&str>) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match due_date.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ValidationError::InvalidDueDate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Well-formed emails pass
    #[test]
    fn test_validate_email_accepts() {
        for email in [
            "user@example.com",
            "first.last+tag@sub.domain.org",
            "a_b%c-d@x-y.io",
        ] {
            assert!(validate_email(email).is_ok(), "{}", email);
        }
    }

    // Test 2: Malformed emails fail
    #[test]
    fn test_validate_email_rejects() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@example",
            "user@example.c",
            "user name@example.com",
        ] {
            assert_eq!(
                validate_email(email),
                Err(ValidationError::InvalidEmail),
                "{}",
                email
            );
        }
    }

    // Test 3: Password policy
    #[test]
    fn test_validate_password() {
        assert!(validate_password("password1").is_ok());
        assert!(validate_password("12345abc").is_ok());

        assert_eq!(
            validate_password("pass1"),
            Err(ValidationError::WeakPassword)
        );
        assert_eq!(
            validate_password("onlyletters"),
            Err(ValidationError::WeakPassword)
        );
        assert_eq!(
            validate_password("1234567890"),
            Err(ValidationError::WeakPassword)
        );
    }

    // Test 4: Name and title bounds
    #[test]
    fn test_validate_name_and_title() {
        assert!(validate_name("Al").is_ok());
        assert!(validate_name("A").is_err());

        assert!(validate_title("x").is_ok());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    // Test 5: Priority parsing with default
    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(None).unwrap(), Priority::Medium);
        assert_eq!(parse_priority(Some("")).unwrap(), Priority::Medium);
        assert_eq!(parse_priority(Some("high")).unwrap(), Priority::High);
        assert_eq!(
            parse_priority(Some("critical")),
            Err(ValidationError::InvalidPriority)
        );
    }

    // Test 6: Due date parsing
    #[test]
    fn test_parse_due_date() {
        assert_eq!(parse_due_date(None).unwrap(), None);
        assert_eq!(parse_due_date(Some("")).unwrap(), None);

        let parsed = parse_due_date(Some("2024-12-31T23:59:59Z")).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-12-31T23:59:59+00:00");

        let offset = parse_due_date(Some("2024-12-31T23:59:59+02:00"))
            .unwrap()
            .unwrap();
        assert_eq!(offset.to_rfc3339(), "2024-12-31T21:59:59+00:00");

        assert_eq!(
            parse_due_date(Some("2024-12-31")),
            Err(ValidationError::InvalidDueDate)
        );
    }

    // Test 7: sanitize trims whitespace
    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  hello \n"), "hello");
        assert_eq!(sanitize(""), "");
    }
}
