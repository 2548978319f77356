use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::error::StoreError;
use crate::import::ImportedMoodEntry;
use crate::models::{
    CrisisAlert, Identity, MoodEntry, NewAssessment, NewCrisisAlert, NewMoodEntry,
    NewResourceInteraction, ResourceInteraction, TimeWindow, UserProfile, WellnessAssessment,
};
use crate::store::RecordStore;

const MOOD_COLUMNS: &str =
    "id, user_id, session_id, mood_value, mood_label, notes, created_at";
const ASSESSMENT_COLUMNS: &str = "id, user_id, session_id, stress_level, sleep_quality, \
     social_connection, academic_pressure, total_score, recommendations, created_at";
const ALERT_COLUMNS: &str =
    "id, user_id, session_id, alert_level, trigger_data, is_resolved, created_at, resolved_at";

pub async fn init_db(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed record store.
///
/// Identity filters bind both columns; the unused one is NULL and never matches.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    #[instrument(skip_all)]
    async fn insert_mood_entry(&self, entry: NewMoodEntry) -> Result<MoodEntry, StoreError> {
        let row = sqlx::query_as::<_, MoodEntry>(&format!(
            "INSERT INTO mood_entries \
             (id, user_id, session_id, mood_value, mood_label, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {MOOD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(entry.identity.user_id())
        .bind(entry.identity.session_id())
        .bind(entry.mood_value)
        .bind(&entry.mood_label)
        .bind(entry.notes.as_deref())
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip_all)]
    async fn mood_entries_in(
        &self,
        identity: &Identity,
        window: &TimeWindow,
    ) -> Result<Vec<MoodEntry>, StoreError> {
        let rows = sqlx::query_as::<_, MoodEntry>(&format!(
            "SELECT {MOOD_COLUMNS} FROM mood_entries \
             WHERE (user_id = $1 OR session_id = $2) \
             AND created_at >= $3 AND created_at <= $4 \
             ORDER BY created_at ASC"
        ))
        .bind(identity.user_id())
        .bind(identity.session_id())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip_all)]
    async fn recent_mood_entries(
        &self,
        identity: &Identity,
        limit: i64,
    ) -> Result<Vec<MoodEntry>, StoreError> {
        let rows = sqlx::query_as::<_, MoodEntry>(&format!(
            "SELECT {MOOD_COLUMNS} FROM mood_entries \
             WHERE (user_id = $1 OR session_id = $2) \
             ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(identity.user_id())
        .bind(identity.session_id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip_all)]
    async fn insert_assessment(
        &self,
        assessment: NewAssessment,
    ) -> Result<WellnessAssessment, StoreError> {
        let row = sqlx::query_as::<_, WellnessAssessment>(&format!(
            "INSERT INTO wellness_assessments \
             (id, user_id, session_id, stress_level, sleep_quality, social_connection, \
              academic_pressure, total_score, recommendations, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ASSESSMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(assessment.identity.user_id())
        .bind(assessment.identity.session_id())
        .bind(assessment.stress_level)
        .bind(assessment.sleep_quality)
        .bind(assessment.social_connection)
        .bind(assessment.academic_pressure)
        .bind(assessment.total_score)
        .bind(&assessment.recommendations)
        .bind(assessment.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip_all)]
    async fn assessments_in(
        &self,
        identity: &Identity,
        window: &TimeWindow,
    ) -> Result<Vec<WellnessAssessment>, StoreError> {
        let rows = sqlx::query_as::<_, WellnessAssessment>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM wellness_assessments \
             WHERE (user_id = $1 OR session_id = $2) \
             AND created_at >= $3 AND created_at <= $4 \
             ORDER BY created_at ASC"
        ))
        .bind(identity.user_id())
        .bind(identity.session_id())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip_all)]
    async fn recent_assessments(
        &self,
        identity: &Identity,
        limit: i64,
    ) -> Result<Vec<WellnessAssessment>, StoreError> {
        let rows = sqlx::query_as::<_, WellnessAssessment>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM wellness_assessments \
             WHERE (user_id = $1 OR session_id = $2) \
             ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(identity.user_id())
        .bind(identity.session_id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip_all, fields(alert_level = alert.alert_level.as_str()))]
    async fn insert_alert(&self, alert: NewCrisisAlert) -> Result<CrisisAlert, StoreError> {
        let row = sqlx::query_as::<_, CrisisAlert>(&format!(
            "INSERT INTO crisis_alerts \
             (id, user_id, session_id, alert_level, trigger_data, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(alert.identity.user_id())
        .bind(alert.identity.session_id())
        .bind(alert.alert_level)
        .bind(&alert.trigger_data)
        .bind(alert.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip_all)]
    async fn unresolved_alerts_since(
        &self,
        identity: &Identity,
        since: DateTime<Utc>,
    ) -> Result<Vec<CrisisAlert>, StoreError> {
        let rows = sqlx::query_as::<_, CrisisAlert>(&format!(
            "SELECT {ALERT_COLUMNS} FROM crisis_alerts \
             WHERE (user_id = $1 OR session_id = $2) \
             AND created_at >= $3 AND is_resolved = FALSE"
        ))
        .bind(identity.user_id())
        .bind(identity.session_id())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip_all)]
    async fn update_user_streak(
        &self,
        identity: &Identity,
        today: NaiveDate,
    ) -> Result<i32, StoreError> {
        let streak: i32 = sqlx::query("SELECT update_user_streak($1, $2, $3) AS current_streak")
            .bind(identity.user_id())
            .bind(identity.session_id())
            .bind(today)
            .fetch_one(&self.pool)
            .await?
            .try_get("current_streak")?;
        Ok(streak)
    }

    #[instrument(skip_all)]
    async fn user_profile(&self, identity: &Identity) -> Result<Option<UserProfile>, StoreError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT id, user_id, session_id, current_streak, longest_streak, total_check_ins, \
             last_check_in, is_anonymous, created_at, updated_at \
             FROM user_profiles WHERE (user_id = $1 OR session_id = $2)",
        )
        .bind(identity.user_id())
        .bind(identity.session_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    #[instrument(skip_all)]
    async fn insert_resource_interaction(
        &self,
        interaction: NewResourceInteraction,
    ) -> Result<ResourceInteraction, StoreError> {
        let row = sqlx::query_as::<_, ResourceInteraction>(
            "INSERT INTO resource_interactions \
             (id, user_id, session_id, resource_type, resource_id, interaction_type, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, user_id, session_id, resource_type, resource_id, \
             interaction_type, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(interaction.identity.user_id())
        .bind(interaction.identity.session_id())
        .bind(&interaction.resource_type)
        .bind(&interaction.resource_id)
        .bind(&interaction.interaction_type)
        .bind(interaction.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

pub const SEED_SESSION: &str = "anon_seed_demo";
pub const SEED_USER: &str = "5a8a9287-7ca1-4103-8a23-9cc89f013073";

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let user_id = Uuid::parse_str(SEED_USER)?;

    let moods = vec![
        ("seed-mood-001", None, Some(SEED_SESSION), 4, "Happy", None, 6),
        ("seed-mood-002", None, Some(SEED_SESSION), 3, "Neutral", None, 4),
        (
            "seed-mood-003",
            None,
            Some(SEED_SESSION),
            2,
            "Sad",
            Some("Midterms are piling up"),
            2,
        ),
        ("seed-mood-004", None, Some(SEED_SESSION), 2, "Sad", None, 1),
        ("seed-mood-005", Some(user_id), None, 5, "Very Happy", Some("Great study group"), 3),
        ("seed-mood-006", Some(user_id), None, 4, "Happy", None, 2),
        ("seed-mood-007", Some(user_id), None, 4, "Happy", None, 0),
    ];

    for (source_key, user, session, value, label, notes, days_ago) in moods {
        sqlx::query(
            r#"
            INSERT INTO mood_entries
            (id, user_id, session_id, mood_value, mood_label, notes, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(session)
        .bind(value)
        .bind(label)
        .bind(notes)
        .bind(now - Duration::days(days_ago))
        .bind(source_key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to seed {source_key}"))?;
    }

    let assessments = vec![
        ("seed-assessment-001", None, Some(SEED_SESSION), (8, 2, 3, 9), 5),
        ("seed-assessment-002", Some(user_id), None, (4, 4, 4, 5), 1),
    ];

    for (source_key, user, session, (stress, sleep, social, academic), days_ago) in assessments {
        let scores = crate::assessment::AssessmentScores {
            stress_level: stress,
            sleep_quality: sleep,
            social_connection: social,
            academic_pressure: academic,
        };
        let total = scores.total_score();
        let recommendations = crate::assessment::recommendations(&scores, total);

        sqlx::query(
            r#"
            INSERT INTO wellness_assessments
            (id, user_id, session_id, stress_level, sleep_quality, social_connection,
             academic_pressure, total_score, recommendations, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(session)
        .bind(stress)
        .bind(sleep)
        .bind(social)
        .bind(academic)
        .bind(total)
        .bind(&recommendations)
        .bind(now - Duration::days(days_ago))
        .bind(source_key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to seed {source_key}"))?;
    }

    Ok(())
}

pub async fn import_mood_entries(
    pool: &PgPool,
    rows: Vec<ImportedMoodEntry>,
) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for row in rows {
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO mood_entries
            (id, user_id, session_id, mood_value, mood_label, notes, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.identity.user_id())
        .bind(row.identity.session_id())
        .bind(row.mood_value)
        .bind(&row.mood_label)
        .bind(row.notes.as_deref())
        .bind(row.created_at)
        .bind(&source_key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to import {source_key}"))?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
