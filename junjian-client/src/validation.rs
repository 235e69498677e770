//! Form rules checked before any request leaves the client.

use std::sync::LazyLock;

use regex::Regex;
use shared::models::{LoginRequest, RegisterData};
use thiserror::Error;

const NICKNAME_MIN: usize = 2;
const NICKNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 8;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

static NICKNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\x{4e00}-\x{9fa5}_-]+$").expect("nickname pattern is valid")
});

static PASSWORD_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9@$!%*?&]+$").expect("password pattern is valid"));

/// A rejected form field.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// # Errors
/// Returns a [`ValidationError`] when `email` is empty or malformed.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::new("email", "please enter an email address"));
    }
    if !EMAIL.is_match(email) {
        return Err(ValidationError::new(
            "email",
            "please enter a valid email address",
        ));
    }
    Ok(())
}

/// Registration password rules: at least eight characters from the allowed
/// set, mixing lower case, upper case and digits.
///
/// # Errors
/// Returns a [`ValidationError`] naming the first rule that fails.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new("password", "please enter a password"));
    }
    if password.chars().count() < PASSWORD_MIN {
        return Err(ValidationError::new(
            "password",
            "password must be at least 8 characters",
        ));
    }
    let mixed = password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit());
    if !mixed || !PASSWORD_CHARS.is_match(password) {
        return Err(ValidationError::new(
            "password",
            "password must contain upper and lower case letters and digits",
        ));
    }
    Ok(())
}

/// # Errors
/// Returns a [`ValidationError`] for empty, too short, too long or
/// disallowed nicknames.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    if nickname.is_empty() {
        return Err(ValidationError::new("nickname", "please enter a nickname"));
    }
    let length = nickname.chars().count();
    if !(NICKNAME_MIN..=NICKNAME_MAX).contains(&length) {
        return Err(ValidationError::new(
            "nickname",
            "nickname must be 2-20 characters",
        ));
    }
    if !NICKNAME.is_match(nickname) {
        return Err(ValidationError::new(
            "nickname",
            "nickname may only contain Chinese characters, letters, digits, underscores and hyphens",
        ));
    }
    Ok(())
}

/// Checks the login form. Only presence is required of the password.
///
/// # Errors
/// Returns the first failing field.
pub fn validate_login(request: &LoginRequest) -> Result<(), ValidationError> {
    validate_email(&request.email)?;
    if request.password.is_empty() {
        return Err(ValidationError::new("password", "please enter a password"));
    }
    Ok(())
}

/// Checks the registration form, in the order the fields are presented.
///
/// # Errors
/// Returns the first failing field.
pub fn validate_registration(form: &RegisterData) -> Result<(), ValidationError> {
    validate_email(&form.email)?;
    validate_nickname(&form.nickname)?;
    validate_password(&form.password)?;
    if form.confirm_password.is_empty() {
        return Err(ValidationError::new(
            "confirmPassword",
            "please confirm the password",
        ));
    }
    if form.confirm_password != form.password {
        return Err(ValidationError::new(
            "confirmPassword",
            "the two passwords do not match",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegisterData {
        RegisterData {
            email: "d@x.com".to_string(),
            password: "Passw0rd".to_string(),
            confirm_password: "Passw0rd".to_string(),
            nickname: "设计师_01".to_string(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("u@x.com").is_ok());
        assert_eq!(validate_email("").unwrap_err().field, "email");
        assert!(validate_email("u@x").is_err());
        assert!(validate_email("u x@y.com").is_err());
        assert!(validate_email("@x.com").is_err());
    }

    #[test]
    fn password_complexity() {
        assert!(validate_password("Passw0rd").is_ok());
        assert!(validate_password("Pa$$w0rd!").is_ok());
        assert!(validate_password("Pa0").is_err());
        assert!(validate_password("password1").is_err());
        assert!(validate_password("PASSWORD1").is_err());
        assert!(validate_password("Password").is_err());
        assert!(validate_password("Passw0rd#").is_err());
    }

    #[test]
    fn nickname_rules() {
        assert!(validate_nickname("钧鉴").is_ok());
        assert!(validate_nickname("user-name_1").is_ok());
        assert!(validate_nickname("a").is_err());
        assert!(validate_nickname(&"a".repeat(21)).is_err());
        assert!(validate_nickname("bad name").is_err());
        assert!(validate_nickname("emoji🙂").is_err());
    }

    #[test]
    fn login_requires_password_presence_only() {
        let request = LoginRequest {
            email: "u@x.com".to_string(),
            password: "secret1".to_string(),
            remember_me: false,
        };
        assert!(validate_login(&request).is_ok());

        let request = LoginRequest {
            password: String::new(),
            ..request
        };
        assert_eq!(validate_login(&request).unwrap_err().field, "password");
    }

    #[test]
    fn registration_checks_confirmation() {
        assert!(validate_registration(&form()).is_ok());

        let mismatched = RegisterData {
            confirm_password: "Passw0rd2".to_string(),
            ..form()
        };
        let error = validate_registration(&mismatched).unwrap_err();
        assert_eq!(error.field, "confirmPassword");
        assert_eq!(error.to_string(), "confirmPassword: the two passwords do not match");
    }
}
