#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Client-side session handling for the Junjian marketplace API.
//!
//! A [`SessionStore`] owns the authentication state and drives the
//! [`Gateway`], a tower pipeline that attaches the bearer credential to every
//! authenticated request and classifies failures in one place. Session state
//! survives restarts through a [`SessionStorage`] implementation.

pub mod api;
pub mod error;
pub mod gateway;
pub mod notice;
pub mod session;
pub mod storage;
pub mod validation;

pub use error::{AuthError, GatewayError};
pub use gateway::{Access, ApiRequest, ApiResponse, Gateway};
pub use notice::{Notice, TracingHooks, UiHooks};
pub use session::{Session, SessionPhase, SessionStore};
pub use storage::{FileStorage, MemoryStorage, PersistedSession, SessionStorage, StorageError};
pub use validation::ValidationError;
