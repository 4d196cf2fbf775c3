//! HTTP client shared by every resource module.
//!
//! All calls go through [`ApiClient::send`], which runs the request half of
//! the [`AuthInterceptor`] before sending and the response half after.

use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::api::{AuthApi, MetricsApi, OpportunitiesApi, ProfileApi};
use crate::auth::{AuthInterceptor, SessionExpiredHook, SessionStore};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    interceptor: AuthInterceptor,
}

pub struct ApiClientBuilder {
    config: ClientConfig,
    session: Option<SessionStore>,
    on_expired: Option<SessionExpiredHook>,
}

impl ApiClientBuilder {
    /// Session shared with whoever commits credentials after login.
    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Hook run when a 401 invalidates the session.
    pub fn on_session_expired<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_expired = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ApiResult<ApiClient> {
        let http = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;
        let session = self.session.unwrap_or_else(SessionStore::in_memory);
        Ok(ApiClient {
            http,
            config: self.config,
            interceptor: AuthInterceptor::new(session, self.on_expired),
        })
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            session: None,
            on_expired: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        self.interceptor.session()
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn opportunities(&self) -> OpportunitiesApi<'_> {
        OpportunitiesApi::new(self)
    }

    pub fn metrics(&self) -> MetricsApi<'_> {
        MetricsApi::new(self)
    }

    pub fn profile(&self) -> ProfileApi<'_> {
        ProfileApi::new(self)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.config.endpoint(path))
    }

    /// Run a request through the interceptor pair.
    pub async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = self.interceptor.prepare(request);
        self.interceptor.inspect(request.send().await).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        tracing::debug!(path, "GET");
        self.send_json(self.request(Method::GET, path)).await
    }

    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        tracing::debug!(path, params = query.len(), "GET");
        self.send_json(self.request(Method::GET, path).query(query))
            .await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        tracing::debug!(path, "POST");
        self.send_json(self.request(Method::POST, path).json(body))
            .await
    }

    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        tracing::debug!(path, "POST");
        self.send_json(self.request(Method::POST, path)).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        tracing::debug!(path, "PUT");
        self.send_json(self.request(Method::PUT, path).json(body))
            .await
    }

    pub(crate) async fn delete(&self, path: &str) -> ApiResult<()> {
        tracing::debug!(path, "DELETE");
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> ApiResult<T> {
        tracing::debug!(path, "POST multipart");
        self.send_json(self.request(Method::POST, path).multipart(form))
            .await
    }
}
