use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::crisis::{CrisisRequest, CrisisResponse, CrisisRiskEvaluator};
use crate::error::ApiError;
use crate::models::{Identity, MoodEntry, NewMoodEntry, UserProfile};
use crate::store::RecordStore;

pub const MOOD_RANGE: std::ops::RangeInclusive<i32> = 1..=5;
pub const DEFAULT_MOOD_HISTORY: i64 = 30;

/// Streak after a check-in on `today`, given the previous check-in date.
pub fn next_streak(last_check_in: Option<NaiveDate>, current: i32, today: NaiveDate) -> i32 {
    match last_check_in {
        Some(last) if last == today => current.max(1),
        Some(last) if today.pred_opt() == Some(last) => current + 1,
        _ => 1,
    }
}

pub fn default_label(mood_value: i32) -> &'static str {
    match mood_value {
        1 => "Very Sad",
        2 => "Sad",
        3 => "Neutral",
        4 => "Happy",
        _ => "Very Happy",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoodCheckInRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<Uuid>,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(alias = "moodValue")]
    pub mood_value: i32,
    #[serde(default, alias = "moodLabel")]
    pub mood_label: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodCheckInResponse {
    pub entry: MoodEntry,
    pub current_streak: i32,
    pub crisis: CrisisResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_check_ins: i32,
}

impl From<Option<UserProfile>> for ProfileStats {
    fn from(profile: Option<UserProfile>) -> Self {
        profile
            .map(|p| Self {
                current_streak: p.current_streak,
                longest_streak: p.longest_streak,
                total_check_ins: p.total_check_ins,
            })
            .unwrap_or_default()
    }
}

/// Identity and paging parameters shared by the history and profile reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<Uuid>,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn identity(&self) -> Result<Identity, ApiError> {
        require_identity(self.user_id, self.session_id.as_deref())
    }
}

pub fn require_identity(
    user_id: Option<Uuid>,
    session_id: Option<&str>,
) -> Result<Identity, ApiError> {
    Identity::resolve(user_id, session_id)
        .ok_or_else(|| ApiError::BadRequest("userId or sessionId is required".to_string()))
}

/// Records a mood check-in, advances the streak and screens it for crisis signals.
#[derive(Clone)]
pub struct MoodCheckIn {
    store: Arc<dyn RecordStore>,
    evaluator: CrisisRiskEvaluator,
}

impl MoodCheckIn {
    pub fn new(store: Arc<dyn RecordStore>, evaluator: CrisisRiskEvaluator) -> Self {
        Self { store, evaluator }
    }

    #[instrument(skip_all, fields(mood_value = request.mood_value))]
    pub async fn submit(
        &self,
        request: MoodCheckInRequest,
    ) -> Result<MoodCheckInResponse, ApiError> {
        let identity = require_identity(request.user_id, request.session_id.as_deref())?;
        if !MOOD_RANGE.contains(&request.mood_value) {
            return Err(ApiError::BadRequest(format!(
                "mood_value must be between {} and {}",
                MOOD_RANGE.start(),
                MOOD_RANGE.end()
            )));
        }

        let notes = request.notes.filter(|n| !n.trim().is_empty());
        let mood_label = request
            .mood_label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| default_label(request.mood_value).to_string());

        let created_at = Utc::now();
        let today = created_at.with_timezone(&Local).date_naive();

        let entry = self
            .store
            .insert_mood_entry(NewMoodEntry {
                identity: identity.clone(),
                mood_value: request.mood_value,
                mood_label,
                notes: notes.clone(),
                created_at,
            })
            .await?;

        let current_streak = match self.store.update_user_streak(&identity, today).await {
            Ok(streak) => streak,
            Err(err) => {
                error!(error = %err, identity = %identity, "failed to update streak");
                self.store
                    .user_profile(&identity)
                    .await
                    .map(|p| ProfileStats::from(p).current_streak)
                    .unwrap_or(0)
            }
        };

        info!(identity = %identity, current_streak, "mood check-in recorded");

        let crisis = self
            .evaluator
            .evaluate(CrisisRequest {
                user_id: identity.user_id(),
                session_id: identity.session_id().map(str::to_string),
                mood_value: Some(entry.mood_value),
                assessment_data: None,
                notes,
            })
            .await;

        Ok(MoodCheckInResponse {
            entry,
            current_streak,
            crisis,
        })
    }

    pub async fn history(&self, query: HistoryQuery) -> Result<Vec<MoodEntry>, ApiError> {
        let identity = query.identity()?;
        let limit = query.limit.unwrap_or(DEFAULT_MOOD_HISTORY).max(1);
        Ok(self.store.recent_mood_entries(&identity, limit).await?)
    }

    pub async fn profile(&self, query: HistoryQuery) -> Result<ProfileStats, ApiError> {
        let identity = query.identity()?;
        Ok(self.store.user_profile(&identity).await?.into())
    }
}
