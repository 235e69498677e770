use http::StatusCode;
use thiserror::Error;

use crate::notice::Notice;

/// Failure of a single gateway request, classified by outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// 401 on an authenticated call. The session has already been cleared.
    #[error("session expired")]
    SessionExpired { message: Option<String> },

    /// 401 on a public call, e.g. rejected credentials.
    #[error("{}", .message.as_deref().unwrap_or("unauthorized"))]
    Unauthorized { message: Option<String> },

    #[error("no permission to access this resource")]
    Forbidden { message: Option<String> },

    #[error("requested resource not found")]
    NotFound { message: Option<String> },

    #[error("server error ({status})")]
    Server {
        status: StatusCode,
        message: Option<String>,
    },

    /// Any other non-2xx status.
    #[error("{}", describe_status(*.status, .message.as_deref()))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    /// No response was received, including timeouts.
    #[error("network unreachable: {0}")]
    Network(String),

    /// The request could not be constructed.
    #[error("request configuration error: {0}")]
    RequestConfig(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Map a transport failure onto the gateway taxonomy.
    #[must_use]
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_builder() {
            Self::RequestConfig(error.to_string())
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }

    /// HTTP status of the rejection, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::SessionExpired { .. } | Self::Unauthorized { .. } => {
                Some(StatusCode::UNAUTHORIZED)
            }
            Self::Forbidden { .. } => Some(StatusCode::FORBIDDEN),
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::Server { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Network(_) | Self::RequestConfig(_) | Self::Decode(_) => None,
        }
    }

    /// Message supplied by the backend in the error body.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::SessionExpired { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Server { message, .. }
            | Self::Status { message, .. } => message.as_deref(),
            Self::Network(_) | Self::RequestConfig(_) | Self::Decode(_) => None,
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// The notice surfaced to the user for this failure.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::SessionExpired { .. } => Some(Notice::SessionExpired),
            Self::Forbidden { .. } => Some(Notice::Forbidden),
            Self::NotFound { .. } => Some(Notice::NotFound),
            Self::Server { .. } => Some(Notice::ServerError),
            Self::Unauthorized { message } | Self::Status { message, .. } => {
                Some(Notice::RequestFailed {
                    message: message.clone(),
                })
            }
            Self::Network(_) => Some(Notice::NetworkUnreachable),
            Self::RequestConfig(_) => Some(Notice::RequestConfiguration),
            Self::Decode(_) => None,
        }
    }
}

fn describe_status(status: StatusCode, message: Option<&str>) -> String {
    message.map_or_else(
        || format!("request failed with status {status}"),
        str::to_string,
    )
}

/// Which credential exchange an [`AuthError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    Login,
    Register,
}

impl AuthFlow {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }

    /// Message used when the backend does not supply one.
    #[must_use]
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Login => "login failed",
            Self::Register => "registration failed",
        }
    }
}

impl std::fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a session store operation.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the login or registration, or it could not be
    /// reached. `message` is suitable for display.
    #[error("{message}")]
    Authentication {
        message: String,
        #[source]
        source: GatewayError,
    },

    /// Another login or registration is still in flight.
    #[error("an authentication request is already in progress")]
    InFlight,
}

impl AuthError {
    pub(crate) fn rejected(flow: AuthFlow, source: GatewayError) -> Self {
        let message = source
            .server_message()
            .map_or_else(|| flow.failure_message().to_string(), str::to_string);
        Self::Authentication { message, source }
    }

    /// The underlying gateway failure, if any.
    #[must_use]
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Authentication { source, .. } => Some(source),
            Self::InFlight => None,
        }
    }
}
