use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response};
use std::sync::Arc;

use crate::auth::session::SessionStore;
use crate::error::{ApiError, ApiResult};

/// Called once each time a 401 invalidates a live session.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Request/response transform pair applied around every API call.
///
/// The request half attaches the bearer token when one exists. The response
/// half turns non-2xx statuses into [`ApiError`]s and, on 401, clears the
/// session and fires the expiry hook before handing the error back.
#[derive(Clone)]
pub struct AuthInterceptor {
    session: SessionStore,
    on_expired: Option<SessionExpiredHook>,
}

impl AuthInterceptor {
    pub fn new(session: SessionStore, on_expired: Option<SessionExpiredHook>) -> Self {
        Self {
            session,
            on_expired,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Request phase. Never fails; no token means no header.
    pub fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Response phase.
    pub async fn inspect(
        &self,
        outcome: Result<Response, reqwest::Error>,
    ) -> ApiResult<Response> {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(timeout = e.is_timeout(), "Transport error: {}", e);
                return Err(ApiError::Transport(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let body = response.bytes().await.unwrap_or_default();
        let err = ApiError::from_status(status, &body);

        if err.is_unauthorized() {
            self.invalidate();
        }
        tracing::debug!(%status, %url, "Request failed: {}", err);
        Err(err)
    }

    /// Clear the session and notify the host. Only the call that actually
    /// removed a session fires the hook.
    fn invalidate(&self) {
        if !self.session.clear() {
            return;
        }
        tracing::warn!("Session invalidated by 401 response");
        if let Some(hook) = &self.on_expired {
            hook();
        }
    }
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("session", &self.session)
            .field("on_expired", &self.on_expired.is_some())
            .finish()
    }
}
