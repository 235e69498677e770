//! HTTP gateway: a tower pipeline around the transport.
//!
//! ```text
//! ClassifyLayer -> CredentialLayer -> HttpTransport
//! ```
//!
//! The credential stage attaches `Authorization: Bearer <token>` from the
//! durable session record (falling back to the default credential pushed by
//! the session store). The classify stage turns every non-2xx response or
//! transport failure into a [`GatewayError`], reports a [`Notice`](crate::Notice)
//! and handles session expiry on 401.

mod classify;
mod credentials;
mod transport;

use std::{fmt, sync::Arc};

use http::{HeaderMap, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use shared::config::ClientConfig;
use tower::{Service, ServiceBuilder, ServiceExt, util::BoxCloneSyncService};
use tracing::debug;

pub use classify::{ClassifyLayer, ClassifyService, SessionExpiry};
pub use credentials::{CredentialLayer, CredentialService, DefaultCredential};
pub use transport::HttpTransport;

use crate::{error::GatewayError, notice::UiHooks, storage::SessionStorage};

/// Whether a request takes part in the bearer-credential scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Carries the stored credential; a 401 means the session expired.
    #[default]
    Authenticated,
    /// Credential exchange and other anonymous endpoints; no credential is
    /// attached and a 401 is an ordinary rejection.
    Public,
}

/// A request relative to the configured API base URL.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub access: Access,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            access: Access::Authenticated,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    /// Returns [`GatewayError::RequestConfig`] when `body` cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, GatewayError> {
        let value = serde_json::to_value(body)
            .map_err(|err| GatewayError::RequestConfig(err.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.access = Access::Public;
        self
    }
}

// Bodies and headers carry passwords and bearer tokens.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// A fully received response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns [`GatewayError::Decode`] when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_slice(&self.body).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

type GatewayService = BoxCloneSyncService<ApiRequest, ApiResponse, GatewayError>;

/// The single configured client every API call goes through.
#[derive(Clone)]
pub struct Gateway {
    service: GatewayService,
    defaults: DefaultCredential,
    expiry: SessionExpiry,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("has_default_credential", &self.defaults.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Build a gateway over a `reqwest` transport.
    ///
    /// # Errors
    /// Returns [`GatewayError::RequestConfig`] when the HTTP client cannot be
    /// built.
    pub fn new(
        config: &ClientConfig,
        storage: Arc<dyn SessionStorage>,
        ui: Arc<dyn UiHooks>,
    ) -> Result<Self, GatewayError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(transport, storage, ui))
    }

    /// Build a gateway over any transport service.
    pub fn with_transport<T>(
        transport: T,
        storage: Arc<dyn SessionStorage>,
        ui: Arc<dyn UiHooks>,
    ) -> Self
    where
        T: Service<ApiRequest, Response = ApiResponse, Error = GatewayError>
            + Clone
            + Send
            + Sync
            + 'static,
        T::Future: Send + 'static,
    {
        let defaults = DefaultCredential::default();
        let expiry = SessionExpiry::new(storage.clone(), defaults.clone());
        let service = ServiceBuilder::new()
            .layer(ClassifyLayer::new(ui, expiry.clone()))
            .layer(CredentialLayer::new(storage, defaults.clone()))
            .service(transport);

        Self {
            service: BoxCloneSyncService::new(service),
            defaults,
            expiry,
        }
    }

    /// Register `token` as the default credential for subsequent requests.
    pub fn set_auth_token(&self, token: &str) {
        self.defaults.set(token);
    }

    /// Remove the default credential.
    pub fn clear_auth_token(&self) {
        self.defaults.clear();
    }

    /// Remove the default credential and stop sending `token` from any
    /// source, including a durable record that could not be cleared.
    /// Registering the token again with [`Gateway::set_auth_token`] lifts it.
    pub fn revoke_auth_token(&self, token: Option<&str>) {
        self.defaults.revoke(token);
    }

    /// The currently registered default credential.
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.defaults.get()
    }

    /// Register a callback run when an authenticated call receives a 401.
    ///
    /// The callback returns whether it tore down a live session; the login
    /// redirect is only issued when some party did.
    pub fn on_unauthorized<F>(&self, listener: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.expiry.add_listener(listener);
    }

    /// Dispatch a request through the pipeline.
    ///
    /// # Errors
    /// Returns the classified [`GatewayError`] for any non-2xx response or
    /// transport failure.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        debug!(method = %request.method, path = %request.path, access = ?request.access, "dispatching request");
        self.service.clone().oneshot(request).await
    }

    /// Dispatch a request and decode the JSON response body.
    ///
    /// # Errors
    /// Returns the classified [`GatewayError`], or [`GatewayError::Decode`]
    /// when the body does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, GatewayError> {
        self.send(request).await?.json()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use crate::notice::{Notice, UiHooks};

    #[derive(Debug, Default)]
    pub struct RecordingHooks {
        pub notices: Mutex<Vec<Notice>>,
        pub redirects: AtomicUsize,
    }

    impl RecordingHooks {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        pub fn redirects(&self) -> usize {
            self.redirects.load(Ordering::SeqCst)
        }
    }

    impl UiHooks for RecordingHooks {
        fn notify(&self, notice: &Notice) {
            self.notices.lock().unwrap().push(notice.clone());
        }

        fn redirect_to_login(&self) {
            self.redirects.fetch_add(1, Ordering::SeqCst);
        }
    }
}
