use std::{
    sync::{Arc, Mutex, RwLock},
    task::{Context, Poll},
};

use futures_util::future::BoxFuture;
use http::StatusCode;
use shared::models::ErrorResponse;
use tower::{Layer, Service};
use tracing::{info, warn};

use super::{Access, ApiRequest, ApiResponse, DefaultCredential};
use crate::{
    error::GatewayError,
    notice::{Notice, UiHooks},
    storage::SessionStorage,
};

type ExpiryListener = Arc<dyn Fn() -> bool + Send + Sync>;

/// Tears the session down when an authenticated call is rejected with 401.
#[derive(Clone)]
pub struct SessionExpiry {
    storage: Arc<dyn SessionStorage>,
    defaults: DefaultCredential,
    listeners: Arc<RwLock<Vec<ExpiryListener>>>,
    teardown: Arc<Mutex<()>>,
}

impl std::fmt::Debug for SessionExpiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionExpiry").finish_non_exhaustive()
    }
}

impl SessionExpiry {
    pub fn new(storage: Arc<dyn SessionStorage>, defaults: DefaultCredential) -> Self {
        Self {
            storage,
            defaults,
            listeners: Arc::default(),
            teardown: Arc::default(),
        }
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        if let Ok(mut guard) = self.listeners.write() {
            guard.push(Arc::new(listener));
        }
    }

    /// Purge the persisted session, revoke the default credential and notify
    /// listeners. Every call reports the expiry notice; the login redirect is
    /// issued only when a live session was actually torn down, so concurrent
    /// 401s redirect once.
    pub fn expire(&self, ui: &dyn UiHooks) -> bool {
        // Concurrent teardowns must not each observe part of the live state.
        let _teardown = self.teardown.lock();
        let mut live = match self.storage.clear() {
            Ok(previous) => previous.is_some_and(|record| record.is_live()),
            Err(err) => {
                warn!(error = %err, "failed to purge persisted session");
                false
            }
        };
        self.defaults.revoke(None);

        let listeners = self
            .listeners
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        for listener in listeners {
            live |= listener();
        }

        ui.notify(&Notice::SessionExpired);
        if live {
            info!("session expired; redirecting to login");
            ui.redirect_to_login();
        }
        live
    }
}

/// Classify a non-2xx response.
#[must_use]
pub fn classify_response(access: Access, response: &ApiResponse) -> GatewayError {
    let message = ErrorResponse::message_from_body(&response.body);
    match response.status {
        StatusCode::UNAUTHORIZED if access == Access::Authenticated => {
            GatewayError::SessionExpired { message }
        }
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized { message },
        StatusCode::FORBIDDEN => GatewayError::Forbidden { message },
        StatusCode::NOT_FOUND => GatewayError::NotFound { message },
        StatusCode::INTERNAL_SERVER_ERROR => GatewayError::Server {
            status: response.status,
            message,
        },
        status => GatewayError::Status { status, message },
    }
}

/// Uniform failure classification and reporting.
#[derive(Clone)]
pub struct ClassifyLayer {
    ui: Arc<dyn UiHooks>,
    expiry: SessionExpiry,
}

impl ClassifyLayer {
    pub fn new(ui: Arc<dyn UiHooks>, expiry: SessionExpiry) -> Self {
        Self { ui, expiry }
    }
}

impl std::fmt::Debug for ClassifyLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifyLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for ClassifyLayer {
    type Service = ClassifyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClassifyService {
            inner,
            ui: self.ui.clone(),
            expiry: self.expiry.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ClassifyService<S> {
    inner: S,
    ui: Arc<dyn UiHooks>,
    expiry: SessionExpiry,
}

impl<S> std::fmt::Debug for ClassifyService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifyService").finish_non_exhaustive()
    }
}

impl<S> Service<ApiRequest> for ClassifyService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = GatewayError>,
    S::Future: Send + 'static,
{
    type Response = ApiResponse;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<ApiResponse, GatewayError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let access = request.access;
        let path = request.path.clone();
        let ui = self.ui.clone();
        let expiry = self.expiry.clone();
        let response = self.inner.call(request);

        Box::pin(async move {
            let error = match response.await {
                Ok(response) if response.status.is_success() => return Ok(response),
                Ok(response) => classify_response(access, &response),
                Err(error) => error,
            };

            warn!(path = %path, error = %error, "request failed");
            if error.is_session_expired() {
                expiry.expire(ui.as_ref());
            } else if let Some(notice) = error.notice() {
                ui.notify(&notice);
            }
            Err(error)
        })
    }
}
