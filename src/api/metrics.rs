use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::SystemMetrics;

pub struct MetricsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> MetricsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Full metrics read; callers replace whatever they held before.
    pub async fn get(&self) -> ApiResult<SystemMetrics> {
        self.client.get("/metrics").await
    }
}
