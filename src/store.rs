use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;
use crate::models::{
    CrisisAlert, Identity, MoodEntry, NewAssessment, NewCrisisAlert, NewMoodEntry,
    NewResourceInteraction, ResourceInteraction, TimeWindow, UserProfile, WellnessAssessment,
};

/// Persistence capability shared by every handler.
///
/// Each call is attempted once; callers decide whether a failure is fatal.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_mood_entry(&self, entry: NewMoodEntry) -> Result<MoodEntry, StoreError>;

    /// Entries created inside `window`, oldest first.
    async fn mood_entries_in(
        &self,
        identity: &Identity,
        window: &TimeWindow,
    ) -> Result<Vec<MoodEntry>, StoreError>;

    /// Most recent entries, newest first.
    async fn recent_mood_entries(
        &self,
        identity: &Identity,
        limit: i64,
    ) -> Result<Vec<MoodEntry>, StoreError>;

    async fn insert_assessment(
        &self,
        assessment: NewAssessment,
    ) -> Result<WellnessAssessment, StoreError>;

    /// Assessments created inside `window`, oldest first.
    async fn assessments_in(
        &self,
        identity: &Identity,
        window: &TimeWindow,
    ) -> Result<Vec<WellnessAssessment>, StoreError>;

    /// Most recent assessments, newest first.
    async fn recent_assessments(
        &self,
        identity: &Identity,
        limit: i64,
    ) -> Result<Vec<WellnessAssessment>, StoreError>;

    async fn insert_alert(&self, alert: NewCrisisAlert) -> Result<CrisisAlert, StoreError>;

    /// Unresolved alerts for `identity` created at or after `since`.
    async fn unresolved_alerts_since(
        &self,
        identity: &Identity,
        since: DateTime<Utc>,
    ) -> Result<Vec<CrisisAlert>, StoreError>;

    /// Records a check-in made on `today` and returns the current streak.
    async fn update_user_streak(
        &self,
        identity: &Identity,
        today: NaiveDate,
    ) -> Result<i32, StoreError>;

    async fn user_profile(&self, identity: &Identity) -> Result<Option<UserProfile>, StoreError>;

    async fn insert_resource_interaction(
        &self,
        interaction: NewResourceInteraction,
    ) -> Result<ResourceInteraction, StoreError>;
}
