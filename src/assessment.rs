use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::checkin::{require_identity, HistoryQuery};
use crate::crisis::{AssessmentSignals, CrisisRequest, CrisisResponse, CrisisRiskEvaluator};
use crate::error::ApiError;
use crate::models::{NewAssessment, WellnessAssessment};
use crate::store::RecordStore;

pub const SCORE_RANGE: std::ops::RangeInclusive<i32> = 1..=10;
pub const MAX_WELLNESS_SCORE: i32 = 40;
pub const COUNSELING_THRESHOLD: i32 = 25;
pub const DEFAULT_ASSESSMENT_HISTORY: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentScores {
    pub stress_level: i32,
    pub sleep_quality: i32,
    pub social_connection: i32,
    pub academic_pressure: i32,
}

impl AssessmentScores {
    pub fn validate(&self) -> Result<(), ApiError> {
        let fields = [
            ("stress_level", self.stress_level),
            ("sleep_quality", self.sleep_quality),
            ("social_connection", self.social_connection),
            ("academic_pressure", self.academic_pressure),
        ];
        for (name, value) in fields {
            if !SCORE_RANGE.contains(&value) {
                return Err(ApiError::BadRequest(format!(
                    "{name} must be between {} and {}",
                    SCORE_RANGE.start(),
                    SCORE_RANGE.end()
                )));
            }
        }
        Ok(())
    }

    /// Higher means more strain; sleep and social connection count inverted on a 1-5 scale.
    pub fn total_score(&self) -> i32 {
        self.stress_level
            + (6 - self.sleep_quality)
            + (6 - self.social_connection)
            + self.academic_pressure
    }
}

impl From<AssessmentScores> for AssessmentSignals {
    fn from(scores: AssessmentScores) -> Self {
        Self {
            stress_level: Some(scores.stress_level),
            sleep_quality: Some(scores.sleep_quality),
            social_connection: Some(scores.social_connection),
            academic_pressure: Some(scores.academic_pressure),
        }
    }
}

pub fn wellness_score(total_score: i32) -> i32 {
    (MAX_WELLNESS_SCORE - total_score).max(0)
}

pub fn recommendations(scores: &AssessmentScores, total_score: i32) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();

    if scores.stress_level >= 8 {
        out.push("Practice deep breathing exercises and meditation");
        out.push("Consider talking to a counselor about stress management");
    }
    if scores.sleep_quality <= 2 {
        out.push("Establish a regular bedtime routine");
        out.push("Limit screen time before bed");
        out.push("Create a comfortable sleep environment");
    }
    if scores.social_connection <= 2 {
        out.push("Reach out to friends or family members");
        out.push("Join a student club or group activity");
        out.push("Consider peer support groups");
    }
    if scores.academic_pressure >= 8 {
        out.push("Break large tasks into smaller, manageable steps");
        out.push("Use time management techniques like the Pomodoro method");
        out.push("Seek academic support resources on campus");
    }
    if total_score >= COUNSELING_THRESHOLD {
        out.insert(0, "Consider scheduling an appointment with campus counseling services");
    }
    if out.is_empty() {
        out.push("Keep up the great work with your wellness practices!");
        out.push("Continue maintaining healthy habits");
    }

    out.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<Uuid>,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub scores: AssessmentScores,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    pub assessment: WellnessAssessment,
    pub wellness_score: i32,
    pub recommendations: Vec<String>,
    pub crisis: CrisisResponse,
}

#[derive(Clone)]
pub struct AssessmentIntake {
    store: Arc<dyn RecordStore>,
    evaluator: CrisisRiskEvaluator,
}

impl AssessmentIntake {
    pub fn new(store: Arc<dyn RecordStore>, evaluator: CrisisRiskEvaluator) -> Self {
        Self { store, evaluator }
    }

    #[instrument(skip_all)]
    pub async fn submit(
        &self,
        request: AssessmentRequest,
    ) -> Result<AssessmentResponse, ApiError> {
        let identity = require_identity(request.user_id, request.session_id.as_deref())?;
        let scores = request.scores;
        scores.validate()?;

        let total_score = scores.total_score();
        let recommendations = recommendations(&scores, total_score);

        let assessment = self
            .store
            .insert_assessment(NewAssessment {
                identity: identity.clone(),
                stress_level: scores.stress_level,
                sleep_quality: scores.sleep_quality,
                social_connection: scores.social_connection,
                academic_pressure: scores.academic_pressure,
                total_score,
                recommendations: recommendations.clone(),
                created_at: Utc::now(),
            })
            .await?;

        info!(identity = %identity, total_score, "wellness assessment recorded");

        let crisis = self
            .evaluator
            .evaluate(CrisisRequest {
                user_id: identity.user_id(),
                session_id: identity.session_id().map(str::to_string),
                mood_value: None,
                assessment_data: Some(scores.into()),
                notes: None,
            })
            .await;

        Ok(AssessmentResponse {
            assessment,
            wellness_score: wellness_score(total_score),
            recommendations,
            crisis,
        })
    }

    pub async fn history(
        &self,
        query: HistoryQuery,
    ) -> Result<Vec<WellnessAssessment>, ApiError> {
        let identity = query.identity()?;
        let limit = query.limit.unwrap_or(DEFAULT_ASSESSMENT_HISTORY).max(1);
        Ok(self.store.recent_assessments(&identity, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::AlertLevel;

    fn scores(stress: i32, sleep: i32, social: i32, academic: i32) -> AssessmentScores {
        AssessmentScores {
            stress_level: stress,
            sleep_quality: sleep,
            social_connection: social,
            academic_pressure: academic,
        }
    }

    #[test]
    fn total_score_inverts_sleep_and_social() {
        assert_eq!(scores(5, 5, 5, 5).total_score(), 12);
        assert_eq!(scores(9, 1, 1, 9).total_score(), 28);
        assert_eq!(wellness_score(28), 12);
        assert_eq!(wellness_score(45), 0);
    }

    #[test]
    fn balanced_answers_get_encouragement() {
        let s = scores(4, 4, 4, 4);
        let recs = recommendations(&s, s.total_score());
        assert_eq!(
            recs,
            vec![
                "Keep up the great work with your wellness practices!",
                "Continue maintaining healthy habits"
            ]
        );
    }

    #[test]
    fn heavy_strain_prepends_counseling() {
        let s = scores(9, 1, 1, 9);
        let recs = recommendations(&s, s.total_score());
        assert_eq!(
            recs[0],
            "Consider scheduling an appointment with campus counseling services"
        );
        assert_eq!(recs.len(), 12);
    }

    #[test]
    fn scores_outside_range_are_rejected() {
        assert!(scores(11, 5, 5, 5).validate().is_err());
        assert!(scores(5, 0, 5, 5).validate().is_err());
        assert!(scores(10, 1, 1, 10).validate().is_ok());
    }

    #[tokio::test]
    async fn intake_stores_assessment_and_screens_it() {
        let store = Arc::new(MemoryStore::new());
        let intake = AssessmentIntake::new(store.clone(), CrisisRiskEvaluator::new(store.clone()));

        let response = intake
            .submit(AssessmentRequest {
                user_id: Some(Uuid::new_v4()),
                session_id: None,
                scores: scores(9, 1, 1, 6),
            })
            .await
            .unwrap();

        assert_eq!(response.assessment.total_score, 25);
        assert_eq!(response.wellness_score, 15);
        assert_eq!(response.crisis.alert_level, AlertLevel::Critical);
        assert!(response.crisis.requires_intervention);
        let alerts = store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].trigger_data.get("criticalCombination").is_some());
    }

    #[test]
    fn request_accepts_flat_scores() {
        let request: AssessmentRequest = serde_json::from_value(serde_json::json!({
            "sessionId": "anon_form",
            "stress_level": 6,
            "sleep_quality": 3,
            "social_connection": 4,
            "academic_pressure": 7
        }))
        .unwrap();
        assert_eq!(request.scores, scores(6, 3, 4, 7));
    }
}
