use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, TokenResponse};

/// `/auth` endpoints. Results are returned to the caller, who decides
/// whether to commit them to the session store.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        self.client.post("/auth/register", request).await
    }

    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        self.client.post("/auth/login", request).await
    }

    /// Exchange the current bearer token for a fresh one.
    pub async fn refresh_token(&self) -> ApiResult<TokenResponse> {
        self.client.post_empty("/auth/refresh").await
    }
}
