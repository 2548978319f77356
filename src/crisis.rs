//! Crisis-risk scoring for mood check-ins, assessments and free-text notes.
//!
//! Rules run in a fixed order and each matching rule overwrites the level set
//! by the ones before it. A later, milder rule can therefore lower an earlier
//! result; crisis language in the notes always ends at `critical`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{AlertLevel, Identity, NewCrisisAlert};
use crate::store::RecordStore;

pub const CRISIS_KEYWORDS: [&str; 9] = [
    "suicide",
    "kill myself",
    "end it all",
    "no point",
    "better off dead",
    "cant go on",
    "hopeless",
    "worthless",
    "nobody cares",
];

pub const REPEAT_WINDOW_DAYS: i64 = 7;
pub const REPEAT_ALERT_LIMIT: usize = 2;

pub const ESCALATION_ACTION: &str =
    "Immediate professional support recommended due to repeated alerts";

/// Assessment fields as the evaluator sees them; an absent field never matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentSignals {
    #[serde(default)]
    pub stress_level: Option<i32>,
    #[serde(default)]
    pub sleep_quality: Option<i32>,
    #[serde(default)]
    pub social_connection: Option<i32>,
    #[serde(default)]
    pub academic_pressure: Option<i32>,
}

fn at_least(value: Option<i32>, bound: i32) -> bool {
    value.is_some_and(|v| v >= bound)
}

fn at_most(value: Option<i32>, bound: i32) -> bool {
    value.is_some_and(|v| v <= bound)
}

/// Reads `user_id` without rejecting the request: anything that is not a
/// UUID string is logged and treated as absent so the rules still run.
fn lenient_user_id<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => match Uuid::parse_str(&text) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(error = %err, "ignoring user_id that is not a UUID");
                None
            }
        },
        Some(other) => {
            warn!(value = %other, "ignoring user_id that is not a string");
            None
        }
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrisisRequest {
    #[serde(default, alias = "userId", deserialize_with = "lenient_user_id")]
    pub user_id: Option<Uuid>,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, alias = "moodValue")]
    pub mood_value: Option<i32>,
    #[serde(default, alias = "assessmentData")]
    pub assessment_data: Option<AssessmentSignals>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CrisisRequest {
    pub fn identity(&self) -> Option<Identity> {
        Identity::resolve(self.user_id, self.session_id.as_deref())
    }
}

/// Result of the rule pass before any persistence happens.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub level: AlertLevel,
    pub triggers: Map<String, Value>,
}

impl RiskAssessment {
    pub fn should_alert(&self) -> bool {
        !self.triggers.is_empty()
    }
}

pub fn matched_keywords(notes: &str) -> Vec<&'static str> {
    let lowered = notes.to_lowercase();
    CRISIS_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| lowered.contains(keyword))
        .collect()
}

pub fn assess(request: &CrisisRequest, now: DateTime<Utc>) -> RiskAssessment {
    let mut level = AlertLevel::Low;
    let mut triggers = Map::new();

    if let Some(value) = request.mood_value.filter(|v| *v <= 1) {
        level = AlertLevel::High;
        triggers.insert(
            "lowMood".to_string(),
            json!({ "value": value, "timestamp": now }),
        );
    }

    if let Some(signals) = &request.assessment_data {
        let stress = signals.stress_level;
        let sleep = signals.sleep_quality;
        let social = signals.social_connection;
        let academic = signals.academic_pressure;

        if at_least(stress, 9) && at_most(sleep, 1) && at_most(social, 1) {
            level = AlertLevel::Critical;
            triggers.insert(
                "criticalCombination".to_string(),
                json!({
                    "stress_level": stress,
                    "sleep_quality": sleep,
                    "social_connection": social,
                }),
            );
        } else if at_least(academic, 9) && at_least(stress, 8) {
            level = AlertLevel::High;
            triggers.insert(
                "highStressAcademic".to_string(),
                json!({ "academic_pressure": academic, "stress_level": stress }),
            );
        } else if (at_least(stress, 7) && at_most(sleep, 2))
            || (at_least(stress, 8) && at_most(social, 2))
        {
            level = AlertLevel::Medium;
            triggers.insert(
                "moderateRisk".to_string(),
                json!({
                    "stress_level": stress,
                    "sleep_quality": sleep,
                    "social_connection": social,
                }),
            );
        }
    }

    if let Some(notes) = request.notes.as_deref() {
        let found = matched_keywords(notes);
        if !found.is_empty() {
            level = AlertLevel::Critical;
            triggers.insert(
                "crisisLanguage".to_string(),
                json!({ "keywords": found, "notes": notes }),
            );
        }
    }

    RiskAssessment { level, triggers }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrisisResource {
    pub name: &'static str,
    pub contact: &'static str,
    pub description: &'static str,
}

const EMERGENCY_SERVICES: CrisisResource = CrisisResource {
    name: "Emergency Services",
    contact: "Call 911",
    description: "For immediate life-threatening situations",
};

const STANDING_RESOURCES: [CrisisResource; 3] = [
    CrisisResource {
        name: "Crisis Text Line",
        contact: "Text HOME to 741741",
        description: "24/7 crisis support via text message",
    },
    CrisisResource {
        name: "Suicide & Crisis Lifeline",
        contact: "Call or text 988",
        description: "24/7 free and confidential support",
    },
    CrisisResource {
        name: "Campus Counseling Center",
        contact: "Contact your school's counseling services",
        description: "Professional support tailored for students",
    },
];

pub fn recommended_actions(level: AlertLevel) -> Vec<String> {
    let actions: &[&str] = match level {
        AlertLevel::Critical => &[
            "Contact crisis hotline immediately: 988 (Suicide & Crisis Lifeline)",
            "Reach out to a trusted friend, family member, or counselor",
            "Consider visiting your campus counseling center",
            "Remove access to means of self-harm",
            "Stay with someone you trust",
        ],
        AlertLevel::High => &[
            "Schedule appointment with campus counseling services",
            "Practice grounding techniques and deep breathing",
            "Reach out to support network",
            "Consider stress management resources",
            "Monitor mood closely over next few days",
        ],
        AlertLevel::Medium => &[
            "Try relaxation and mindfulness exercises",
            "Maintain regular sleep schedule",
            "Engage in physical activity",
            "Connect with friends or support groups",
            "Consider counseling if symptoms persist",
        ],
        AlertLevel::Low => &[
            "Continue healthy habits",
            "Practice self-care",
            "Stay connected with support network",
        ],
    };
    actions.iter().map(|a| a.to_string()).collect()
}

pub fn crisis_resources(level: AlertLevel) -> Vec<CrisisResource> {
    let mut resources = Vec::with_capacity(STANDING_RESOURCES.len() + 1);
    if level >= AlertLevel::High {
        resources.push(EMERGENCY_SERVICES);
    }
    resources.extend(STANDING_RESOURCES);
    resources
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisResponse {
    pub alert_level: AlertLevel,
    pub requires_intervention: bool,
    pub recommended_actions: Vec<String>,
    pub resources: Vec<CrisisResource>,
}

impl CrisisResponse {
    pub fn for_level(level: AlertLevel) -> Self {
        Self {
            alert_level: level,
            requires_intervention: level == AlertLevel::Critical,
            recommended_actions: recommended_actions(level),
            resources: crisis_resources(level),
        }
    }

    fn escalate(&mut self) {
        self.requires_intervention = true;
        self.recommended_actions.insert(0, ESCALATION_ACTION.to_string());
    }
}

/// Scores a request and records an alert when any rule fired.
///
/// Alert persistence is best effort: storage failures are logged and the
/// computed response is still returned.
#[derive(Clone)]
pub struct CrisisRiskEvaluator {
    store: Arc<dyn RecordStore>,
}

impl CrisisRiskEvaluator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(has_notes = request.notes.is_some()))]
    pub async fn evaluate(&self, request: CrisisRequest) -> CrisisResponse {
        let now = Utc::now();
        let assessment = assess(&request, now);
        let mut response = CrisisResponse::for_level(assessment.level);

        if !assessment.should_alert() {
            return response;
        }

        let Some(identity) = request.identity() else {
            warn!(
                alert_level = assessment.level.as_str(),
                "crisis rule fired without an identity; alert not recorded"
            );
            return response;
        };

        info!(
            alert_level = assessment.level.as_str(),
            identity = %identity,
            "crisis rule fired"
        );

        let alert = NewCrisisAlert {
            identity: identity.clone(),
            alert_level: assessment.level,
            trigger_data: Value::Object(assessment.triggers),
            created_at: now,
        };
        if let Err(err) = self.store.insert_alert(alert).await {
            error!(error = %err, identity = %identity, "failed to record crisis alert");
        }

        if assessment.level == AlertLevel::Critical {
            let since = now - Duration::days(REPEAT_WINDOW_DAYS);
            match self.store.unresolved_alerts_since(&identity, since).await {
                Ok(recent) if recent.len() > REPEAT_ALERT_LIMIT => {
                    warn!(
                        identity = %identity,
                        recent_alerts = recent.len(),
                        "repeated unresolved crisis alerts"
                    );
                    response.escalate();
                }
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, identity = %identity, "failed to look up recent alerts");
                }
            }
        }

        response
    }
}
