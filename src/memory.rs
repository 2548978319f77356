use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::checkin::next_streak;
use crate::error::StoreError;
use crate::models::{
    CrisisAlert, Identity, MoodEntry, NewAssessment, NewCrisisAlert, NewMoodEntry,
    NewResourceInteraction, ResourceInteraction, TimeWindow, UserProfile, WellnessAssessment,
};
use crate::store::RecordStore;

#[derive(Default)]
struct Tables {
    mood_entries: Vec<MoodEntry>,
    assessments: Vec<WellnessAssessment>,
    alerts: Vec<CrisisAlert>,
    profiles: Vec<UserProfile>,
    interactions: Vec<ResourceInteraction>,
}

/// In-process record store for local runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_alert_writes: AtomicBool,
    fail_alert_lookups: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every range, history and profile read fail.
    #[cfg(test)]
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes alert inserts and alert lookups fail.
    #[cfg(test)]
    pub fn fail_alerts(&self, fail: bool) {
        self.fail_alert_writes.store(fail, Ordering::SeqCst);
        self.fail_alert_lookups.store(fail, Ordering::SeqCst);
    }

    /// Makes only the unresolved-alert lookup fail; inserts still succeed.
    #[cfg(test)]
    pub fn fail_alert_lookups(&self, fail: bool) {
        self.fail_alert_lookups.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn alerts(&self) -> Vec<CrisisAlert> {
        self.tables.read().await.alerts.clone()
    }

    /// Stores an alert with an arbitrary age and resolution state.
    #[cfg(test)]
    pub async fn push_alert(
        &self,
        identity: &Identity,
        alert_level: crate::models::AlertLevel,
        created_at: DateTime<Utc>,
        resolved: bool,
    ) {
        self.tables.write().await.alerts.push(CrisisAlert {
            id: Uuid::new_v4(),
            user_id: identity.user_id(),
            session_id: identity.session_id().map(str::to_string),
            alert_level,
            trigger_data: serde_json::json!({}),
            is_resolved: resolved,
            created_at,
            resolved_at: resolved.then_some(created_at),
        });
    }

    #[cfg(test)]
    pub async fn interactions(&self) -> Vec<ResourceInteraction> {
        self.tables.read().await.interactions.clone()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_alerts(&self, switch: &AtomicBool) -> Result<(), StoreError> {
        if switch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("crisis_alerts unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_mood_entry(&self, entry: NewMoodEntry) -> Result<MoodEntry, StoreError> {
        let row = MoodEntry {
            id: Uuid::new_v4(),
            user_id: entry.identity.user_id(),
            session_id: entry.identity.session_id().map(str::to_string),
            mood_value: entry.mood_value,
            mood_label: entry.mood_label,
            notes: entry.notes,
            created_at: entry.created_at,
        };
        self.tables.write().await.mood_entries.push(row.clone());
        Ok(row)
    }

    async fn mood_entries_in(
        &self,
        identity: &Identity,
        window: &TimeWindow,
    ) -> Result<Vec<MoodEntry>, StoreError> {
        self.check_reads()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<MoodEntry> = tables
            .mood_entries
            .iter()
            .filter(|e| identity.owns(e.user_id, e.session_id.as_deref()))
            .filter(|e| window.contains(e.created_at))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.created_at);
        Ok(rows)
    }

    async fn recent_mood_entries(
        &self,
        identity: &Identity,
        limit: i64,
    ) -> Result<Vec<MoodEntry>, StoreError> {
        self.check_reads()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<MoodEntry> = tables
            .mood_entries
            .iter()
            .filter(|e| identity.owns(e.user_id, e.session_id.as_deref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_assessment(
        &self,
        assessment: NewAssessment,
    ) -> Result<WellnessAssessment, StoreError> {
        let row = WellnessAssessment {
            id: Uuid::new_v4(),
            user_id: assessment.identity.user_id(),
            session_id: assessment.identity.session_id().map(str::to_string),
            stress_level: assessment.stress_level,
            sleep_quality: assessment.sleep_quality,
            social_connection: assessment.social_connection,
            academic_pressure: assessment.academic_pressure,
            total_score: assessment.total_score,
            recommendations: assessment.recommendations,
            created_at: assessment.created_at,
        };
        self.tables.write().await.assessments.push(row.clone());
        Ok(row)
    }

    async fn assessments_in(
        &self,
        identity: &Identity,
        window: &TimeWindow,
    ) -> Result<Vec<WellnessAssessment>, StoreError> {
        self.check_reads()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<WellnessAssessment> = tables
            .assessments
            .iter()
            .filter(|a| identity.owns(a.user_id, a.session_id.as_deref()))
            .filter(|a| window.contains(a.created_at))
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.created_at);
        Ok(rows)
    }

    async fn recent_assessments(
        &self,
        identity: &Identity,
        limit: i64,
    ) -> Result<Vec<WellnessAssessment>, StoreError> {
        self.check_reads()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<WellnessAssessment> = tables
            .assessments
            .iter()
            .filter(|a| identity.owns(a.user_id, a.session_id.as_deref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_alert(&self, alert: NewCrisisAlert) -> Result<CrisisAlert, StoreError> {
        self.check_alerts(&self.fail_alert_writes)?;
        let row = CrisisAlert {
            id: Uuid::new_v4(),
            user_id: alert.identity.user_id(),
            session_id: alert.identity.session_id().map(str::to_string),
            alert_level: alert.alert_level,
            trigger_data: alert.trigger_data,
            is_resolved: false,
            created_at: alert.created_at,
            resolved_at: None,
        };
        self.tables.write().await.alerts.push(row.clone());
        Ok(row)
    }

    async fn unresolved_alerts_since(
        &self,
        identity: &Identity,
        since: DateTime<Utc>,
    ) -> Result<Vec<CrisisAlert>, StoreError> {
        self.check_alerts(&self.fail_alert_lookups)?;
        let tables = self.tables.read().await;
        Ok(tables
            .alerts
            .iter()
            .filter(|a| identity.owns(a.user_id, a.session_id.as_deref()))
            .filter(|a| !a.is_resolved && a.created_at >= since)
            .cloned()
            .collect())
    }

    async fn update_user_streak(
        &self,
        identity: &Identity,
        today: NaiveDate,
    ) -> Result<i32, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;

        let existing = tables
            .profiles
            .iter_mut()
            .find(|p| identity.owns(p.user_id, p.session_id.as_deref()));

        match existing {
            Some(profile) => {
                let streak = next_streak(profile.last_check_in, profile.current_streak, today);
                profile.current_streak = streak;
                profile.longest_streak = profile.longest_streak.max(streak);
                profile.total_check_ins += 1;
                profile.last_check_in = Some(today);
                profile.updated_at = now;
                Ok(streak)
            }
            None => {
                tables.profiles.push(UserProfile {
                    id: Uuid::new_v4(),
                    user_id: identity.user_id(),
                    session_id: identity.session_id().map(str::to_string),
                    current_streak: 1,
                    longest_streak: 1,
                    total_check_ins: 1,
                    last_check_in: Some(today),
                    is_anonymous: identity.user_id().is_none(),
                    created_at: now,
                    updated_at: now,
                });
                Ok(1)
            }
        }
    }

    async fn user_profile(&self, identity: &Identity) -> Result<Option<UserProfile>, StoreError> {
        self.check_reads()?;
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .iter()
            .find(|p| identity.owns(p.user_id, p.session_id.as_deref()))
            .cloned())
    }

    async fn insert_resource_interaction(
        &self,
        interaction: NewResourceInteraction,
    ) -> Result<ResourceInteraction, StoreError> {
        let row = ResourceInteraction {
            id: Uuid::new_v4(),
            user_id: interaction.identity.user_id(),
            session_id: interaction.identity.session_id().map(str::to_string),
            resource_type: interaction.resource_type,
            resource_id: interaction.resource_id,
            interaction_type: interaction.interaction_type,
            created_at: interaction.created_at,
        };
        self.tables.write().await.interactions.push(row.clone());
        Ok(row)
    }
}
