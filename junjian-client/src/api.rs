//! Typed calls against the marketplace REST API.

use shared::models::{
    AuthResponse, CodeValidation, HealthStatus, InviteCodeValidation, LoginRequest,
    MessageResponse, RegisterRequest, User, VerificationKind,
};

use crate::{
    error::GatewayError,
    gateway::{ApiRequest, Gateway},
};

impl Gateway {
    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    /// Returns [`GatewayError::Unauthorized`] or another rejection when the
    /// backend refuses the credentials.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, GatewayError> {
        self.send_json(ApiRequest::post("/auth/login").json(request)?.public())
            .await
    }

    /// Create an account and receive a bearer token for it.
    ///
    /// # Errors
    /// Returns the classified rejection from the backend.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, GatewayError> {
        self.send_json(ApiRequest::post("/auth/register").json(request)?.public())
            .await
    }

    /// Ask the backend to mail a verification code to `email`.
    ///
    /// # Errors
    /// Returns the classified rejection from the backend.
    pub async fn send_verification_code(
        &self,
        email: &str,
        kind: VerificationKind,
    ) -> Result<MessageResponse, GatewayError> {
        let request = ApiRequest::post("/auth/send-verification-code")
            .query("email", email)
            .query("type", kind.as_str())
            .public();
        self.send_json(request).await
    }

    /// # Errors
    /// Returns the classified rejection from the backend.
    pub async fn validate_invite_code(
        &self,
        code: &str,
    ) -> Result<InviteCodeValidation, GatewayError> {
        let request = ApiRequest::post("/auth/validate-invite-code")
            .query("code", code)
            .public();
        self.send_json(request).await
    }

    /// # Errors
    /// Returns the classified rejection from the backend.
    pub async fn validate_verification_code(
        &self,
        email: &str,
        code: &str,
        kind: VerificationKind,
    ) -> Result<CodeValidation, GatewayError> {
        let request = ApiRequest::post("/auth/validate-verification-code")
            .query("email", email)
            .query("code", code)
            .query("type", kind.as_str())
            .public();
        self.send_json(request).await
    }

    /// # Errors
    /// Returns [`GatewayError::Network`] when the backend cannot be reached.
    pub async fn health(&self) -> Result<HealthStatus, GatewayError> {
        self.send_json(ApiRequest::get("/auth/health").public()).await
    }

    /// Fetch the profile of the user the credential belongs to.
    ///
    /// # Errors
    /// Returns [`GatewayError::SessionExpired`] when the credential is
    /// rejected; the session has been torn down by then.
    pub async fn current_user(&self) -> Result<User, GatewayError> {
        self.send_json(ApiRequest::get("/user/profile")).await
    }
}
