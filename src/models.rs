use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// User as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub school: String,
    pub major: String,
    pub grade: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub school: String,
    pub major: String,
    pub grade: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token plus user summary, returned by register and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub source_url: String,
    pub competition_level: Option<String>,
    pub organizer: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub event_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub target_majors: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub save_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One page of `GET /opportunities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<Opportunity>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Body for creating or replacing an opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPayload {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_majors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl OpportunityPayload {
    pub fn new(
        title: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            kind: kind.into(),
            description: description.into(),
            source_url: source_url.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub status: String,
    #[serde(default)]
    pub timestamp: MetricsTimestamp,
    #[serde(default)]
    pub system: SystemInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTimestamp {
    /// The backend sometimes sends an empty object here; that reads as absent.
    #[serde(default, deserialize_with = "string_or_none")]
    pub current_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub resume_text: Option<String>,
    pub skills: Option<Vec<String>>,
    pub certificates: Option<Vec<Certificate>>,
    pub interests: Option<Vec<String>>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. Fields left as `None` are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<Certificate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.resume_text.is_none()
            && self.skills.is_none()
            && self.certificates.is_none()
            && self.interests.is_none()
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
