use crate::analytics::{AnalyticsAggregator, FALLBACK_INSIGHT_TITLE};
use crate::errors::AppError;
use crate::models::{
    AnalyzeRequest, AssignRequest, ListQuery, NewAlert, NewCounselorRequest, NewStory, NewSurvey,
    StatusQuery, StatusUpdateRequest,
};
use crate::state::AppState;
use crate::stats::build_survey_stats;
use crate::storage::{apply, DEFAULT_STORY_LIMIT, DEFAULT_SURVEY_LIMIT};
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const ANALYTICS_SURVEY_LIMIT: usize = 1000;
const DEFAULT_ANALYZE_DAYS: i64 = 7;
const MAX_ANALYZE_DAYS: i64 = 3650;

type ApiResult = Result<Json<Value>, AppError>;

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query.map(|Query(params)| params).map_err(|err| {
        warn!("rejected query string: {err}");
        AppError::bad_request("Invalid query parameters")
    })
}

/// An empty body yields the defaults; anything else must parse.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes, message: &str) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        warn!("rejected request body: {err}");
        AppError::bad_request(message)
    })
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Campus wellbeing API is running",
        "endpoints": [
            "GET /api/surveys - List surveys",
            "POST /api/surveys - Submit a survey",
            "GET /api/surveys/stats - Survey statistics",
            "POST /api/surveys/analyze - Analyze recent surveys and raise alerts",
            "GET /api/analytics - Analytics report",
            "GET /api/stories - Published stories",
            "POST /api/stories - Submit a story",
            "GET /api/alerts - Active alerts",
            "POST /api/counselor-requests - Request counselor support",
        ],
    }))
}

pub async fn create_survey(
    State(state): State<AppState>,
    payload: Result<Json<NewSurvey>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload.map_err(|err| {
        warn!("rejected survey payload: {err}");
        AppError::bad_request("Invalid survey data")
    })?;
    if let Err(reason) = input.validate() {
        warn!("rejected survey payload: {reason}");
        return Err(AppError::bad_request("Invalid survey data"));
    }

    let mut data = state.data.lock().await;
    let survey = apply(&state.data_path, &mut data, |data| Some(data.create_survey(input)))
        .await?;

    Ok(Json(json!({ "success": true, "survey": survey })))
}

pub async fn list_surveys(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult {
    let limit = query_params(query)?.limit.unwrap_or(DEFAULT_SURVEY_LIMIT);
    let data = state.data.lock().await;
    Ok(Json(json!({ "success": true, "surveys": data.list_surveys(limit) })))
}

pub async fn survey_stats(State(state): State<AppState>) -> ApiResult {
    let data = state.data.lock().await;
    Ok(Json(json!({ "success": true, "stats": build_survey_stats(&data.surveys) })))
}

/// Classifies recent surveys and raises one alert per reported trend.
pub async fn analyze_surveys(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let request: AnalyzeRequest = optional_body(&body, "Invalid analyze request")?;
    let days = request.days.unwrap_or(DEFAULT_ANALYZE_DAYS);
    if !(1..=MAX_ANALYZE_DAYS).contains(&days) {
        return Err(AppError::bad_request(format!(
            "days must be between 1 and {MAX_ANALYZE_DAYS}"
        )));
    }

    let end = Utc::now();
    let start = end - Duration::days(days);
    let surveys = state.data.lock().await.list_surveys_in_range(start, end);

    let trends = AnalyticsAggregator::new(state.ai.as_ref())
        .with_timeout(state.ai_timeout)
        .findings(&surveys)
        .await;

    let mut new_alerts = Vec::with_capacity(trends.len());
    for trend in &trends {
        let title = trend
            .patterns
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_INSIGHT_TITLE.to_string());
        let suggestion = state
            .ai
            .alert_suggestion(&title, trend.severity, trend.affected_count)
            .await;
        new_alerts.push(NewAlert {
            severity: trend.severity,
            title,
            description: format!(
                "Analysis of {} surveys from the past {days} days.",
                surveys.len()
            ),
            suggestion: Some(suggestion),
            affected_count: Some(trend.affected_count),
        });
    }

    let alerts = if new_alerts.is_empty() {
        Vec::new()
    } else {
        let mut data = state.data.lock().await;
        apply(&state.data_path, &mut data, |data| {
            let alerts: Vec<_> = new_alerts
                .into_iter()
                .map(|alert| data.create_alert(alert))
                .collect();
            Some(alerts)
        })
        .await?
        .unwrap_or_default()
    };
    info!(
        "analyzed {} surveys over {days} days, raised {} alerts",
        surveys.len(),
        alerts.len()
    );

    Ok(Json(json!({ "success": true, "trends": trends, "alerts": alerts })))
}

pub async fn create_story(
    State(state): State<AppState>,
    payload: Result<Json<NewStory>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(input) = payload.map_err(|_| AppError::bad_request("Invalid story data"))?;
    input
        .validate()
        .map_err(|_| AppError::bad_request("Invalid story data"))?;

    let moderation = state.ai.moderate_story(&input.title, &input.content).await;
    if !moderation.is_appropriate {
        info!("story held for review: {} concerns", moderation.concerns.len());
        let body = json!({
            "success": false,
            "message": "Content needs review",
            "concerns": moderation.concerns,
            "suggestions": moderation.suggestions,
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let mut data = state.data.lock().await;
    let story = apply(&state.data_path, &mut data, |data| Some(data.create_story(input)))
        .await?;

    Ok(Json(json!({ "success": true, "story": story })).into_response())
}

pub async fn list_stories(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult {
    let limit = query_params(query)?.limit.unwrap_or(DEFAULT_STORY_LIMIT);
    let data = state.data.lock().await;
    Ok(Json(json!({ "success": true, "stories": data.published_stories(limit) })))
}

pub async fn get_story(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let data = state.data.lock().await;
    let story = data
        .get_story(&id)
        .ok_or_else(|| AppError::not_found("Story not found"))?;
    Ok(Json(json!({ "success": true, "story": story })))
}

pub async fn student_stories(State(state): State<AppState>, Path(student_id): Path<String>) -> ApiResult {
    let data = state.data.lock().await;
    Ok(Json(json!({ "success": true, "stories": data.stories_by_student(&student_id) })))
}

pub async fn publish_story(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mut data = state.data.lock().await;
    let story = apply(&state.data_path, &mut data, |data| data.publish_story(&id))
        .await?
        .ok_or_else(|| AppError::not_found("Story not found"))?;
    Ok(Json(json!({ "success": true, "story": story })))
}

pub async fn like_story(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mut data = state.data.lock().await;
    let story = apply(&state.data_path, &mut data, |data| data.like_story(&id))
        .await?
        .ok_or_else(|| AppError::not_found("Story not found"))?;
    Ok(Json(json!({ "success": true, "story": story })))
}

pub async fn list_alerts(State(state): State<AppState>) -> ApiResult {
    let data = state.data.lock().await;
    Ok(Json(json!({ "success": true, "alerts": data.active_alerts() })))
}

pub async fn resolve_alert(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mut data = state.data.lock().await;
    let alert = apply(&state.data_path, &mut data, |data| data.resolve_alert(&id))
        .await?
        .ok_or_else(|| AppError::not_found("Alert not found"))?;
    Ok(Json(json!({ "success": true, "alert": alert })))
}

pub async fn create_counselor_request(
    State(state): State<AppState>,
    payload: Result<Json<NewCounselorRequest>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload.map_err(|_| AppError::bad_request("Invalid request data"))?;
    if input.reason.trim().is_empty() {
        return Err(AppError::bad_request("Invalid request data"));
    }

    let mut data = state.data.lock().await;
    let request = apply(&state.data_path, &mut data, |data| {
        Some(data.create_counselor_request(input))
    })
    .await?;

    Ok(Json(json!({ "success": true, "request": request })))
}

pub async fn list_counselor_requests(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult {
    let status = query_params(query)?.status;
    let data = state.data.lock().await;
    Ok(Json(json!({ "success": true, "requests": data.counselor_requests(status) })))
}

pub async fn assign_counselor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let payload: AssignRequest = optional_body(&body, "Invalid request data")?;
    let counselor_id = payload
        .counselor_id
        .filter(|counselor_id| !counselor_id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Counselor ID required"))?;

    let mut data = state.data.lock().await;
    let request = apply(&state.data_path, &mut data, |data| {
        data.assign_counselor(&id, &counselor_id)
    })
    .await?
    .ok_or_else(|| AppError::not_found("Request not found"))?;

    Ok(Json(json!({ "success": true, "request": request })))
}

pub async fn update_request_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let payload: StatusUpdateRequest = optional_body(&body, "Invalid request data")?;
    let status = payload
        .status
        .ok_or_else(|| AppError::bad_request("Status required"))?;

    let mut data = state.data.lock().await;
    let request = apply(&state.data_path, &mut data, |data| {
        data.update_request_status(&id, status)
    })
    .await?
    .ok_or_else(|| AppError::not_found("Request not found"))?;

    Ok(Json(json!({ "success": true, "request": request })))
}

pub async fn analytics(State(state): State<AppState>) -> ApiResult {
    let surveys = state.data.lock().await.list_surveys(ANALYTICS_SURVEY_LIMIT);

    let report = AnalyticsAggregator::new(state.ai.as_ref())
        .with_timeout(state.ai_timeout)
        .generate_report(&surveys)
        .await;

    Ok(Json(json!({ "success": true, "analytics": report })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock_model;
    use crate::models::AppData;
    use std::path::PathBuf;

    fn temp_data_path() -> PathBuf {
        std::env::temp_dir().join(format!("campus_wellbeing_handlers_{}.json", uuid::Uuid::new_v4()))
    }

    fn story() -> NewStory {
        NewStory {
            student_id: Some("student-9".to_string()),
            title: "Lunch".to_string(),
            content: "Sam from 7B was mean to me.".to_string(),
            category: "friendship".to_string(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rejected_story_is_held_for_review() {
        let verdict = r#"{"isAppropriate": false, "concerns": ["names a classmate"], "suggestions": ["remove the name"]}"#;
        let url = mock_model::serve(StatusCode::OK, mock_model::reply(verdict)).await;
        let path = temp_data_path();
        let state = AppState::new(
            path.clone(),
            AppData::default(),
            mock_model::live_service(url),
            std::time::Duration::from_secs(5),
        );

        let response = create_story(State(state.clone()), Ok(Json(story()))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Content needs review");
        assert_eq!(body["concerns"], json!(["names a classmate"]));
        assert_eq!(body["suggestions"], json!(["remove the name"]));

        assert!(state.data.lock().await.stories.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn story_is_saved_when_moderation_is_unavailable() {
        let url = mock_model::serve(StatusCode::SERVICE_UNAVAILABLE, json!({})).await;
        let path = temp_data_path();
        let state = AppState::new(
            path.clone(),
            AppData::default(),
            mock_model::live_service(url),
            std::time::Duration::from_secs(5),
        );

        let response = create_story(State(state.clone()), Ok(Json(story()))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["story"]["isPublished"], false);
        assert_eq!(state.data.lock().await.stories.len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let path = std::env::temp_dir()
            .join(format!("campus_wellbeing_missing_dir_{}", uuid::Uuid::new_v4()))
            .join("campus.json");
        let state = AppState::new(
            path,
            AppData::default(),
            crate::ai::AiService::Stub,
            std::time::Duration::from_secs(5),
        );

        let err = create_story(State(state.clone()), Ok(Json(story()))).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.data.lock().await.stories.is_empty());

        let payload = serde_json::from_value(json!({
            "urgency": "soon",
            "reason": "Need to talk",
        }))
        .unwrap();
        let err = create_counselor_request(State(state.clone()), Ok(Json(payload))).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.data.lock().await.counselor_requests.is_empty());
    }

    #[test]
    fn empty_body_yields_defaults() {
        let request: AnalyzeRequest = optional_body(&Bytes::from_static(b" \n"), "bad").unwrap();
        assert!(request.days.is_none());

        let request: AnalyzeRequest = optional_body(&Bytes::from_static(br#"{"days": 30}"#), "bad").unwrap();
        assert_eq!(request.days, Some(30));

        let err = optional_body::<AnalyzeRequest>(&Bytes::from_static(br#"{"days": "thirty"}"#), "bad")
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "bad");
    }
}
