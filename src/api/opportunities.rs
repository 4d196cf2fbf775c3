use chrono::NaiveDate;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Opportunity, OpportunityPage, OpportunityPayload};

/// Query for `GET /opportunities`. Unset fields are left out of the query
/// string entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpportunityFilter {
    pub kind: Option<String>,
    pub competition_level: Option<String>,
    pub major: Option<String>,
    pub deadline_after: Option<NaiveDate>,
    pub deadline_before: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub tags: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OpportunityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn competition_level(mut self, level: impl Into<String>) -> Self {
        self.competition_level = Some(level.into());
        self
    }

    pub fn major(mut self, major: impl Into<String>) -> Self {
        self.major = Some(major.into());
        self
    }

    pub fn deadline_between(mut self, after: Option<NaiveDate>, before: Option<NaiveDate>) -> Self {
        self.deadline_after = after;
        self.deadline_before = before;
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Query pairs in wire form. Tags repeat the `tags` key.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(kind) = &self.kind {
            query.push(("type", kind.clone()));
        }
        if let Some(level) = &self.competition_level {
            query.push(("competition_level", level.clone()));
        }
        if let Some(major) = &self.major {
            query.push(("major", major.clone()));
        }
        if let Some(after) = self.deadline_after {
            query.push(("deadline_after", after.format("%Y-%m-%d").to_string()));
        }
        if let Some(before) = self.deadline_before {
            query.push(("deadline_before", before.format("%Y-%m-%d").to_string()));
        }
        if let Some(active) = self.is_active {
            query.push(("is_active", active.to_string()));
        }
        for tag in &self.tags {
            query.push(("tags", tag.clone()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("offset", offset.to_string()));
        }
        query
    }
}

pub struct OpportunitiesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> OpportunitiesApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: Option<&OpportunityFilter>) -> ApiResult<OpportunityPage> {
        let query = filter.map(OpportunityFilter::to_query).unwrap_or_default();
        self.client.get_with_query("/opportunities", &query).await
    }

    /// Fails with `ApiError::NotFound` for an unknown id.
    pub async fn get(&self, id: i64) -> ApiResult<Opportunity> {
        self.client.get(&format!("/opportunities/{id}")).await
    }

    pub async fn create(&self, payload: &OpportunityPayload) -> ApiResult<Opportunity> {
        self.client.post("/opportunities", payload).await
    }

    pub async fn update(&self, id: i64, payload: &OpportunityPayload) -> ApiResult<Opportunity> {
        self.client
            .put(&format!("/opportunities/{id}"), payload)
            .await
    }

    /// Deleting an id that is already gone yields `ApiError::NotFound`.
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        self.client.delete(&format!("/opportunities/{id}")).await
    }
}
