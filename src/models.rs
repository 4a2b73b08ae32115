use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value; // free-form analytics metadata
use utoipa::ToSchema;

pub type Id = i64;

/// Kind of pain a marker records. Serialized as its color key name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PainType {
    Sharp,
    Dull,
    Burning,
    Stiffness,
    Numbness,
}

impl PainType {
    /// Hex color the canvas paints this marker with.
    pub fn color(self) -> &'static str {
        match self {
            PainType::Sharp => "#ef4444",
            PainType::Dull => "#f97316",
            PainType::Burning => "#eab308",
            PainType::Stiffness => "#3b82f6",
            PainType::Numbness => "#a855f7",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One annotation stroke on the reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PainMarker {
    #[serde(rename = "type")]
    pub pain_type: PainType,
    pub intensity: u8,
    pub points: Vec<Point>,
    pub brush_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PainEntry {
    pub id: Id,
    pub image_url: String,
    pub date: DateTime<Utc>,
    pub pain_markers: Vec<PainMarker>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPainEntry {
    pub image_url: String,
    pub pain_markers: Vec<PainMarker>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Id,
    pub date: NaiveDate,
    pub steps: i64,
    pub activity: String,
    pub symptoms: String,
    pub pain_level: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityLog {
    pub date: NaiveDate,
    pub steps: i64,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub symptoms: String,
    pub pain_level: f64,
}

/// Body of the upsert-by-date endpoint; the date comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogFields {
    pub steps: i64,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub symptoms: String,
    pub pain_level: f64,
}

impl ActivityLogFields {
    pub fn on(self, date: NaiveDate) -> NewActivityLog {
        NewActivityLog {
            date,
            steps: self.steps,
            activity: self.activity,
            symptoms: self.symptoms,
            pain_level: self.pain_level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    #[default]
    Active,
    Recovering,
    Recovered,
}

impl InjuryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InjuryStatus::Active => "active",
            InjuryStatus::Recovering => "recovering",
            InjuryStatus::Recovered => "recovered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(InjuryStatus::Active),
            "recovering" => Some(InjuryStatus::Recovering),
            "recovered" => Some(InjuryStatus::Recovered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Injury {
    pub id: Id,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub date_of_injury: NaiveDate,
    pub status: InjuryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewInjury {
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date_of_injury: NaiveDate,
    #[serde(default)]
    pub status: InjuryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubscription {
    pub id: Id,
    pub email: String,
    pub verification_token: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: Id,
    pub event: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub user_agent: Option<String>,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// What the client posts; user agent and session are filled in server side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsPayload {
    pub event: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalyticsEvent {
    pub event: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub user_agent: Option<String>,
    pub session_id: String,
}
