use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
    task::{Context, Poll},
};

use futures_util::future::{Either, Ready, ready};
use http::{HeaderValue, header::AUTHORIZATION};
use tower::{Layer, Service};
use tracing::warn;

use super::{Access, ApiRequest, ApiResponse};
use crate::{error::GatewayError, storage::SessionStorage};

#[derive(Debug, Default)]
struct CredentialState {
    token: Option<String>,
    revoked: HashSet<String>,
}

/// The credential registered directly with the gateway by the session store,
/// plus the tokens it has signed out of.
#[derive(Debug, Clone, Default)]
pub struct DefaultCredential {
    state: Arc<RwLock<CredentialState>>,
}

impl DefaultCredential {
    pub fn set(&self, token: &str) {
        if let Ok(mut guard) = self.state.write() {
            guard.revoked.remove(token);
            guard.token = Some(token.to_string()).filter(|token| !token.is_empty());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.state.write() {
            guard.token = None;
        }
    }

    /// Clear the default and refuse `token` (and the cleared default) even
    /// when a durable record still holds it. Lifted by [`Self::set`].
    pub fn revoke(&self, token: Option<&str>) {
        if let Ok(mut guard) = self.state.write() {
            if let Some(current) = guard.token.take() {
                guard.revoked.insert(current);
            }
            if let Some(token) = token.filter(|token| !token.is_empty()) {
                guard.revoked.insert(token.to_string());
            }
        }
    }

    #[must_use]
    pub fn is_revoked(&self, token: &str) -> bool {
        self.state
            .read()
            .map(|guard| guard.revoked.contains(token))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.state.read().ok().and_then(|guard| guard.token.clone())
    }
}

/// Attaches the bearer credential to authenticated requests.
#[derive(Clone)]
pub struct CredentialLayer {
    storage: Arc<dyn SessionStorage>,
    defaults: DefaultCredential,
}

impl CredentialLayer {
    pub fn new(storage: Arc<dyn SessionStorage>, defaults: DefaultCredential) -> Self {
        Self { storage, defaults }
    }
}

impl std::fmt::Debug for CredentialLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for CredentialLayer {
    type Service = CredentialService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CredentialService {
            inner,
            storage: self.storage.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CredentialService<S> {
    inner: S,
    storage: Arc<dyn SessionStorage>,
    defaults: DefaultCredential,
}

impl<S> std::fmt::Debug for CredentialService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService").finish_non_exhaustive()
    }
}

impl<S> CredentialService<S> {
    /// The token to send: the durable record first, then the default. A
    /// revoked token is never sent, whichever source still holds it.
    fn current_token(&self) -> Option<String> {
        let persisted = match self.storage.load() {
            Ok(record) => record
                .and_then(|record| record.bearer_token().map(str::to_string))
                .filter(|token| !self.defaults.is_revoked(token)),
            Err(err) => {
                warn!(error = %err, "failed to read persisted session");
                None
            }
        };
        persisted.or_else(|| self.defaults.get())
    }
}

impl<S> Service<ApiRequest> for CredentialService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = GatewayError>,
{
    type Response = ApiResponse;
    type Error = GatewayError;
    type Future = Either<S::Future, Ready<Result<ApiResponse, GatewayError>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: ApiRequest) -> Self::Future {
        request.headers.remove(AUTHORIZATION);

        if request.access == Access::Authenticated {
            if let Some(token) = self.current_token() {
                match HeaderValue::from_str(&format!("Bearer {token}")) {
                    Ok(mut value) => {
                        value.set_sensitive(true);
                        request.headers.insert(AUTHORIZATION, value);
                    }
                    Err(err) => {
                        return Either::Right(ready(Err(GatewayError::RequestConfig(format!(
                            "stored credential is not a valid header value: {err}"
                        )))));
                    }
                }
            }
        }

        Either::Left(self.inner.call(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, PersistedSession};
    use http::StatusCode;
    use std::sync::Mutex;
    use tower::{ServiceExt, service_fn};

    type Seen = Arc<Mutex<Option<String>>>;

    fn stack(
        storage: Arc<dyn SessionStorage>,
        defaults: DefaultCredential,
        seen: Seen,
    ) -> impl Service<ApiRequest, Response = ApiResponse, Error = GatewayError> {
        CredentialLayer::new(storage, defaults).layer(service_fn(move |request: ApiRequest| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = request
                    .headers
                    .get(AUTHORIZATION)
                    .map(|value| value.to_str().unwrap().to_string());
                Ok::<_, GatewayError>(ApiResponse::new(StatusCode::OK, Vec::new()))
            }
        }))
    }

    fn record(token: &str) -> PersistedSession {
        PersistedSession {
            user: None,
            token: Some(token.to_string()),
            is_authenticated: true,
        }
    }

    #[tokio::test]
    async fn attaches_persisted_token() {
        let seen = Seen::default();
        let service = stack(
            Arc::new(MemoryStorage::with_record(record("abc"))),
            DefaultCredential::default(),
            seen.clone(),
        );

        service.oneshot(ApiRequest::get("/user/profile")).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn sends_unauthenticated_without_any_token() {
        let seen = Seen::default();
        let service = stack(
            Arc::new(MemoryStorage::new()),
            DefaultCredential::default(),
            seen.clone(),
        );

        service.oneshot(ApiRequest::get("/user/profile")).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), None);
    }

    #[tokio::test]
    async fn falls_back_to_default_credential() {
        let seen = Seen::default();
        let defaults = DefaultCredential::default();
        defaults.set("from-store");
        let service = stack(Arc::new(MemoryStorage::new()), defaults, seen.clone());

        service.oneshot(ApiRequest::get("/user/profile")).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer from-store"));
    }

    #[tokio::test]
    async fn strips_caller_supplied_authorization_on_public_requests() {
        let seen = Seen::default();
        let service = stack(
            Arc::new(MemoryStorage::with_record(record("abc"))),
            DefaultCredential::default(),
            seen.clone(),
        );
        let mut request = ApiRequest::post("/auth/login").public();
        request
            .headers
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));

        service.oneshot(request).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), None);
    }

    #[tokio::test]
    async fn invalid_token_is_a_configuration_error() {
        let seen = Seen::default();
        let service = stack(
            Arc::new(MemoryStorage::with_record(record("bad\ntoken"))),
            DefaultCredential::default(),
            seen.clone(),
        );

        let error = service
            .oneshot(ApiRequest::get("/user/profile"))
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::RequestConfig(_)));
        assert!(seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn revoked_token_is_not_sent_from_stale_record() {
        let seen = Seen::default();
        let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::with_record(record("abc")));
        let defaults = DefaultCredential::default();
        defaults.set("abc");
        defaults.revoke(None);

        stack(storage.clone(), defaults.clone(), seen.clone())
            .oneshot(ApiRequest::get("/user/profile"))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), None);
        assert!(defaults.is_revoked("abc"));

        defaults.set("abc");
        stack(storage, defaults, seen.clone())
            .oneshot(ApiRequest::get("/user/profile"))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn empty_default_token_is_ignored() {
        let defaults = DefaultCredential::default();
        defaults.set("");
        assert_eq!(defaults.get(), None);
        defaults.set("abc");
        defaults.clear();
        assert_eq!(defaults.get(), None);
    }
}
