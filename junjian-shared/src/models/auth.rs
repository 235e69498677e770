use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{User, UserRole};

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Forwarded to the backend as a hint; it has no local effect.
    #[serde(default)]
    pub remember_me: bool,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// The fields collected by the registration form.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub nickname: String,
}

impl fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterData")
            .field("email", &self.email)
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

/// Body of `POST /auth/register`.
///
/// The backend expects an invite code and an emailed verification code; both
/// are optional here so that a plain [`RegisterData`] form can be submitted.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    pub password: String,
    pub confirm_password: String,
    pub nickname: String,
}

impl RegisterRequest {
    /// Attach the invite and verification codes to a form submission.
    #[must_use]
    pub fn invited(
        data: RegisterData,
        invite_code: impl Into<String>,
        verification_code: impl Into<String>,
    ) -> Self {
        Self {
            invite_code: Some(invite_code.into()),
            verification_code: Some(verification_code.into()),
            ..Self::from(data)
        }
    }

    /// The form-level view of this request.
    #[must_use]
    pub fn form(&self) -> RegisterData {
        RegisterData {
            email: self.email.clone(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
            nickname: self.nickname.clone(),
        }
    }
}

impl From<RegisterData> for RegisterRequest {
    fn from(data: RegisterData) -> Self {
        Self {
            invite_code: None,
            email: data.email,
            verification_code: None,
            password: data.password,
            confirm_password: data.confirm_password,
            nickname: data.nickname,
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("invite_code", &self.invite_code)
            .field("email", &self.email)
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

/// Successful login or registration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Opaque bearer credential.
    pub token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Token lifetime in seconds as reported by the backend.
    #[serde(default)]
    pub expires_in: i64,
    pub user: User,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Purpose of an emailed verification code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Register,
    ResetPassword,
}

impl VerificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ResetPassword => "reset_password",
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "register" => Ok(Self::Register),
            "reset_password" => Ok(Self::ResetPassword),
            _ => Err("unsupported verification type"),
        }
    }
}

/// Response of `POST /auth/validate-invite-code`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InviteCodeValidation {
    pub valid: bool,
    /// Role the invite grants, present only for valid codes.
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `POST /auth/validate-verification-code`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeValidation {
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Plain acknowledgement such as the one returned when a code is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// Response of `GET /auth/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}
