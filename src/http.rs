//! HTTP surface: the two wellness functions plus the check-in, assessment,
//! profile and resource endpoints used by the web client.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analytics::{AnalyticsRequest, WellnessAnalytics, WellnessAnalyticsAggregator};
use crate::assessment::{AssessmentIntake, AssessmentRequest, AssessmentResponse};
use crate::checkin::{
    HistoryQuery, MoodCheckIn, MoodCheckInRequest, MoodCheckInResponse, ProfileStats,
};
use crate::crisis::{CrisisRequest, CrisisResponse, CrisisRiskEvaluator};
use crate::error::ApiError;
use crate::models::{MoodEntry, ResourceInteraction, WellnessAssessment};
use crate::resources::{self, InteractionRequest, WellnessResource};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RecordStore>,
    evaluator: CrisisRiskEvaluator,
    aggregator: WellnessAnalyticsAggregator,
    checkins: MoodCheckIn,
    assessments: AssessmentIntake,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let evaluator = CrisisRiskEvaluator::new(store.clone());
        Self {
            aggregator: WellnessAnalyticsAggregator::new(store.clone()),
            checkins: MoodCheckIn::new(store.clone(), evaluator.clone()),
            assessments: AssessmentIntake::new(store.clone(), evaluator.clone()),
            evaluator,
            store,
        }
    }
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .max_age(Duration::from_secs(3600))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/functions/v1/crisis-detection", post(crisis_detection))
        .route("/functions/v1/wellness-analytics", post(wellness_analytics))
        .route("/mood-entries", post(submit_mood).get(mood_history))
        .route(
            "/wellness-assessments",
            post(submit_assessment).get(assessment_history),
        )
        .route("/profile", get(profile))
        .route("/resources", get(list_resources))
        .route("/resources/:id/interactions", post(record_interaction))
        .route("/health", get(health_check))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn crisis_detection(
    State(state): State<AppState>,
    payload: Result<Json<CrisisRequest>, JsonRejection>,
) -> Result<Json<CrisisResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::unreadable)?;
    Ok(Json(state.evaluator.evaluate(request).await))
}

async fn wellness_analytics(
    State(state): State<AppState>,
    payload: Result<Json<AnalyticsRequest>, JsonRejection>,
) -> Result<Json<WellnessAnalytics>, ApiError> {
    let Json(request) = payload.map_err(ApiError::unreadable)?;
    Ok(Json(state.aggregator.aggregate(request).await?))
}

async fn submit_mood(
    State(state): State<AppState>,
    payload: Result<Json<MoodCheckInRequest>, JsonRejection>,
) -> Result<Json<MoodCheckInResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.checkins.submit(request).await?))
}

async fn mood_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<MoodEntry>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.checkins.history(query).await?))
}

async fn submit_assessment(
    State(state): State<AppState>,
    payload: Result<Json<AssessmentRequest>, JsonRejection>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.assessments.submit(request).await?))
}

async fn assessment_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<WellnessAssessment>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.assessments.history(query).await?))
}

async fn profile(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<ProfileStats>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.checkins.profile(query).await?))
}

async fn list_resources() -> Json<&'static [WellnessResource]> {
    Json(&resources::DIRECTORY[..])
}

async fn record_interaction(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    payload: Result<Json<InteractionRequest>, JsonRejection>,
) -> Result<Json<ResourceInteraction>, ApiError> {
    let Json(request) = payload?;
    let saved = resources::record_interaction(&state.store, &resource_id, request).await?;
    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(store: Arc<MemoryStore>) -> Router {
        routes(AppState::new(store))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn crisis_detection_returns_risk_payload() {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(post_json(
                "/functions/v1/crisis-detection",
                json!({ "session_id": "anon_http", "notes": "I feel hopeless" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = read_json(response).await;
        assert_eq!(body["alertLevel"], "critical");
        assert_eq!(body["requiresIntervention"], true);
        assert_eq!(body["resources"][0]["name"], "Emergency Services");
    }

    #[tokio::test]
    async fn preflight_is_permissive() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/functions/v1/wellness-analytics")
            .header("origin", "https://campus.example")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type,apikey")
            .body(Body::empty())
            .unwrap();
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(request)
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn analytics_shape_matches_dashboard() {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(post_json(
                "/functions/v1/wellness-analytics",
                json!({ "timeframe": "30d", "sessionId": "anon_empty" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["mood"]["average"], 0.0);
        assert_eq!(body["mood"]["trend"], "stable");
        assert_eq!(body["mood"]["totalEntries"], 0);
        assert_eq!(body["wellness"]["averageStress"], 0.0);
        assert_eq!(body["insights"], json!([]));
        assert_eq!(body["checkInFrequency"], 0);
    }

    #[tokio::test]
    async fn analytics_store_failure_is_500_with_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads(true);
        let response = app(store)
            .oneshot(post_json(
                "/functions/v1/wellness-analytics",
                json!({ "sessionId": "anon_down" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("unavailable"));
    }

    fn raw_post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_function_body_is_500_with_error() {
        for uri in [
            "/functions/v1/crisis-detection",
            "/functions/v1/wellness-analytics",
        ] {
            let response = app(Arc::new(MemoryStore::new()))
                .oneshot(raw_post(uri, "{not json"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            let body = read_json(response).await;
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn malformed_check_in_body_is_400_with_error() {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(raw_post("/mood-entries", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn non_uuid_user_id_still_gets_crisis_response() {
        let store = Arc::new(MemoryStore::new());
        let response = app(store.clone())
            .oneshot(post_json(
                "/functions/v1/crisis-detection",
                json!({ "user_id": "abc", "notes": "I feel hopeless" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["alertLevel"], "critical");
        assert_eq!(body["requiresIntervention"], true);
        assert_eq!(body["resources"][0]["name"], "Emergency Services");
        assert!(store.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn mood_check_in_then_history_and_profile() {
        let store = Arc::new(MemoryStore::new());
        let router = app(store);

        let response = router
            .clone()
            .oneshot(post_json(
                "/mood-entries",
                json!({ "sessionId": "anon_flow", "moodValue": 3, "moodLabel": "Neutral" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["currentStreak"], 1);
        assert_eq!(body["crisis"]["alertLevel"], "low");

        let history = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/mood-entries?sessionId=anon_flow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = read_json(history).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["mood_value"], 3);

        let profile = router
            .oneshot(
                Request::builder()
                    .uri("/profile?sessionId=anon_flow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = read_json(profile).await;
        assert_eq!(body["totalCheckIns"], 1);
    }

    #[tokio::test]
    async fn assessment_submission_returns_score() {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(post_json(
                "/wellness-assessments",
                json!({
                    "session_id": "anon_quiz",
                    "stress_level": 5,
                    "sleep_quality": 4,
                    "social_connection": 4,
                    "academic_pressure": 5
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["wellnessScore"], 26);
        assert_eq!(body["assessment"]["total_score"], 14);
    }

    #[tokio::test]
    async fn resources_are_listed_and_interactions_recorded() {
        let store = Arc::new(MemoryStore::new());
        let router = app(store.clone());

        let list = router
            .clone()
            .oneshot(Request::builder().uri("/resources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(list).await;
        assert_eq!(body.as_array().unwrap().len(), 6);

        let response = router
            .oneshot(post_json(
                "/resources/breathing-exercise/interactions",
                json!({ "sessionId": "anon_res", "interactionType": "opened" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.interactions().await.len(), 1);
    }
}
