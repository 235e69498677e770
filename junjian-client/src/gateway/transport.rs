use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use reqwest::Client;
use shared::config::ClientConfig;
use tower::Service;
use url::Url;

use super::{ApiRequest, ApiResponse};
use crate::error::GatewayError;

/// The innermost stage: sends requests with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build the transport with the configured timeout and user agent.
    ///
    /// # Errors
    /// Returns [`GatewayError::RequestConfig`] when the client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| GatewayError::RequestConfig(err.to_string()))?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    #[must_use]
    pub fn with_client(client: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL.
    ///
    /// # Errors
    /// Returns [`GatewayError::RequestConfig`] for paths that do not form a
    /// valid URL.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, GatewayError> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|err| GatewayError::RequestConfig(format!("invalid path '{}': {err}", request.path)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
        }
        Ok(url)
    }
}

impl Service<ApiRequest> for HttpTransport {
    type Response = ApiResponse;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<ApiResponse, GatewayError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let client = self.client.clone();
        let url = self.url_for(&request);

        Box::pin(async move {
            let mut builder = client
                .request(request.method, url?)
                .headers(request.headers);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|err| GatewayError::from_transport(&err))?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|err| GatewayError::from_transport(&err))?;

            Ok(ApiResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        })
    }
}
