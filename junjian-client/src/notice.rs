//! User-facing notices raised by the gateway and the hooks that surface them.

use std::fmt;

use tracing::{info, warn};

/// A human-readable notice produced when a request fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The bearer credential was rejected; the session has been cleared.
    SessionExpired,
    Forbidden,
    NotFound,
    ServerError,
    /// Any other rejection, with the server-supplied message when present.
    RequestFailed { message: Option<String> },
    NetworkUnreachable,
    RequestConfiguration,
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::SessionExpired => "Your session has expired, please log in again",
            Self::Forbidden => "You do not have permission to access this resource",
            Self::NotFound => "The requested resource does not exist",
            Self::ServerError => "Internal server error",
            Self::RequestFailed { message } => message.as_deref().unwrap_or("Request failed"),
            Self::NetworkUnreachable => {
                "Network connection failed, please check your network settings"
            }
            Self::RequestConfiguration => "Request configuration error",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The UI surface the gateway reports to.
pub trait UiHooks: Send + Sync {
    /// Show a notice to the user.
    fn notify(&self, notice: &Notice);

    /// Send the user back to the login entry point.
    fn redirect_to_login(&self);
}

/// Hooks that only log, for headless embedding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl UiHooks for TracingHooks {
    fn notify(&self, notice: &Notice) {
        warn!(notice = %notice, "request failed");
    }

    fn redirect_to_login(&self) {
        info!("login required");
    }
}
