use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Marketplace role assigned to an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Designer,
    Owner,
    Admin,
}

impl UserRole {
    /// Return the canonical wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Designer => "DESIGNER",
            Self::Owner => "OWNER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DESIGNER" => Ok(Self::Designer),
            "OWNER" => Ok(Self::Owner),
            "ADMIN" => Ok(Self::Admin),
            _ => Err("unknown user role"),
        }
    }
}

/// Lifecycle status of an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Banned,
}

impl UserStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Banned => "BANNED",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "BANNED" => Ok(Self::Banned),
            _ => Err("unknown user status"),
        }
    }
}

/// The authenticated account as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend identifier.
    pub id: i64,

    /// Login email address.
    pub email: String,

    /// Public display name.
    pub nickname: String,

    /// Avatar URL, if one was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    pub role: UserRole,

    pub status: UserStatus,

    /// Whether the email address has been confirmed.
    #[serde(default)]
    pub email_verified: bool,
}
