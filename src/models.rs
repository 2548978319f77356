use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Owner of a record: an authenticated user or an anonymous browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    User(Uuid),
    Session(String),
}

impl Identity {
    /// Picks the user id when present, otherwise a non-empty session id.
    pub fn resolve(user_id: Option<Uuid>, session_id: Option<&str>) -> Option<Self> {
        match (user_id, session_id) {
            (Some(id), _) => Some(Self::User(id)),
            (None, Some(session)) if !session.trim().is_empty() => {
                Some(Self::Session(session.to_string()))
            }
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Session(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Session(session) => Some(session.as_str()),
        }
    }

    /// True when a stored row's identity columns belong to this identity.
    pub fn owns(&self, user_id: Option<Uuid>, session_id: Option<&str>) -> bool {
        match self {
            Self::User(id) => user_id == Some(*id),
            Self::Session(session) => session_id == Some(session.as_str()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Session(session) => write!(f, "session {session}"),
        }
    }
}

/// Closed interval of creation timestamps used by range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// Length of the window in days, partial days rounded up.
    pub fn total_days(&self) -> i64 {
        let day = Duration::days(1).num_milliseconds();
        let span = (self.end - self.start).num_milliseconds().max(0);
        ((span + day - 1) / day).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub mood_value: i32,
    pub mood_label: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMoodEntry {
    pub identity: Identity,
    pub mood_value: i32,
    pub mood_label: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WellnessAssessment {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub stress_level: i32,
    pub sleep_quality: i32,
    pub social_connection: i32,
    pub academic_pressure: i32,
    pub total_score: i32,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub identity: Identity,
    pub stress_level: i32,
    pub sleep_quality: i32,
    pub social_connection: i32,
    pub academic_pressure: i32,
    pub total_score: i32,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrisisAlert {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub alert_level: AlertLevel,
    pub trigger_data: serde_json::Value,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCrisisAlert {
    pub identity: Identity,
    pub alert_level: AlertLevel,
    pub trigger_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_check_ins: i32,
    pub last_check_in: Option<NaiveDate>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceInteraction {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub resource_type: String,
    pub resource_id: String,
    pub interaction_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResourceInteraction {
    pub identity: Identity,
    pub resource_type: String,
    pub resource_id: String,
    pub interaction_type: String,
    pub created_at: DateTime<Utc>,
}
