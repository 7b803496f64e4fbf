use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::ApiError;

const MAX_FIELD_LEN: usize = 64;

static USERNAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").ok());

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.is_empty() {
        return Err(FieldError::new("email", "Email is required"));
    }
    if email.len() > MAX_FIELD_LEN {
        return Err(FieldError::new(
            "email",
            format!("Email must be {MAX_FIELD_LEN} characters or less"),
        ));
    }

    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !email.chars().any(char::is_whitespace)
    });

    if !valid {
        return Err(FieldError::new("email", "Invalid email address"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), FieldError> {
    if username.is_empty() {
        return Err(FieldError::new("username", "Username is required"));
    }
    if username.len() > MAX_FIELD_LEN {
        return Err(FieldError::new(
            "username",
            format!("Username must be {MAX_FIELD_LEN} characters or less"),
        ));
    }

    let matches = USERNAME_RE
        .as_ref()
        .is_some_and(|re| re.is_match(username));
    if !matches {
        return Err(FieldError::new(
            "username",
            "Usernames must start with a letter and contain only letters, numbers, dots or underscores",
        ));
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), FieldError> {
    if password.is_empty() {
        return Err(FieldError::new("password", "Password is required"));
    }
    if password != confirmation {
        return Err(FieldError::new("password", "Passwords must match"));
    }
    Ok(())
}

/// Runs every registration check and reports all failures at once.
pub fn validate_registration(
    email: &str,
    username: &str,
    password: &str,
    password2: &str,
) -> Result<(), ApiError> {
    collect([
        validate_email(email),
        validate_username(username),
        validate_new_password(password, password2),
    ])
}

fn validate_optional_len(field: &str, label: &str, value: Option<&str>) -> Result<(), FieldError> {
    match value {
        Some(v) if v.trim().len() > MAX_FIELD_LEN => Err(FieldError::new(
            field,
            format!("{label} must be {MAX_FIELD_LEN} characters or less"),
        )),
        _ => Ok(()),
    }
}

fn collect(checks: impl IntoIterator<Item = Result<(), FieldError>>) -> Result<(), ApiError> {
    let errors: Vec<FieldError> = checks.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::FieldErrors(errors))
    }
}

/// Name and location are short; about-me is free text.
pub fn validate_profile(name: Option<&str>, location: Option<&str>) -> Result<(), ApiError> {
    collect([
        validate_optional_len("name", "Real name", name),
        validate_optional_len("location", "Location", location),
    ])
}

pub fn validate_account_edit(
    email: &str,
    username: &str,
    name: Option<&str>,
    location: Option<&str>,
) -> Result<(), ApiError> {
    collect([
        validate_email(email),
        validate_username(username),
        validate_optional_len("name", "Real name", name),
        validate_optional_len("location", "Location", location),
    ])
}

pub fn validate_post_body(body: &str) -> Result<&str, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::validation("Post body cannot be empty"));
    }
    Ok(body)
}

pub fn validate_id(kind: &str, id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {kind} ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

/// Only same-site absolute paths are followed after login.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("john@example.com").is_ok());
        assert!(validate_email("anony@mous.me").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("john").is_err());
        assert!(validate_email("john@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("john@localhost").is_err());
        assert!(validate_email("jo hn@example.com").is_err());
        assert!(validate_email(&format!("{}@example.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("annie").is_ok());
        assert!(validate_username("a.b_c9").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("9lives").is_err());
        assert!(validate_username("_x").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("emoji😀").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
        assert!(validate_username(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("cat", "cat").is_ok());
        assert!(validate_new_password("cat", "dog").is_err());
        assert!(validate_new_password("", "").is_err());
    }

    #[test]
    fn test_validate_registration_collects_all_errors() {
        let Err(ApiError::FieldErrors(errors)) =
            validate_registration("nope", "1bad", "cat", "dog")
        else {
            panic!("expected field errors");
        };

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "username", "password"]);
    }

    #[test]
    fn test_validate_profile_lengths() {
        assert!(validate_profile(None, None).is_ok());
        assert!(validate_profile(Some("Annie"), Some("Lisbon")).is_ok());

        let long = "x".repeat(65);
        let Err(ApiError::FieldErrors(errors)) = validate_profile(Some(&long), Some(&long)) else {
            panic!("expected field errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "location"]);
    }

    #[test]
    fn test_validate_account_edit() {
        assert!(validate_account_edit("a@b.io", "annie", None, None).is_ok());
        let Err(ApiError::FieldErrors(errors)) =
            validate_account_edit("nope", "annie", None, None)
        else {
            panic!("expected field errors");
        };
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/auth/me")), "/auth/me");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
    }

    #[test]
    fn test_validate_post_body() {
        assert!(validate_post_body("hello").is_ok());
        assert!(validate_post_body("  \n").is_err());
    }
}
