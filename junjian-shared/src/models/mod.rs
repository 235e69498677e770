pub mod auth;
pub mod errors;
pub mod user;

pub use auth::{
    AuthResponse, CodeValidation, HealthStatus, InviteCodeValidation, LoginRequest,
    MessageResponse, RegisterData, RegisterRequest, VerificationKind,
};
pub use errors::ErrorResponse;
pub use user::{User, UserRole, UserStatus};
