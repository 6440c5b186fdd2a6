use crate::errors::AppError;
use crate::models::{
    Alert, AppData, CounselorRequest, NewAlert, NewCounselorRequest, NewStory, NewSurvey,
    RequestStatus, Story, Survey,
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, warn};
use uuid::Uuid;

pub const DEFAULT_SURVEY_LIMIT: usize = 100;
pub const DEFAULT_STORY_LIMIT: usize = 50;

/// Loads the document, starting empty when the file is missing.
///
/// An unparseable file is renamed aside before the empty document is
/// returned, so the next persist cannot overwrite the only copy.
pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file {}: {err}", path.display());
                quarantine(path).await;
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

async fn quarantine(path: &Path) {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
    let target = PathBuf::from(name);
    match fs::rename(path, &target).await {
        Ok(()) => warn!("moved unreadable data file to {}", target.display()),
        Err(err) => error!("failed to move unreadable data file aside: {err}"),
    }
}

pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}

/// Runs `change` against the document and persists the result.
///
/// `None` from `change` means nothing matched; the document is left alone
/// and nothing is written. A failed write restores the previous document.
pub async fn apply<T>(
    path: &Path,
    data: &mut AppData,
    change: impl FnOnce(&mut AppData) -> Option<T>,
) -> Result<Option<T>, AppError> {
    let snapshot = data.clone();
    let Some(outcome) = change(data) else {
        return Ok(None);
    };
    if let Err(err) = persist_data(path, data).await {
        *data = snapshot;
        return Err(err);
    }
    Ok(Some(outcome))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn verification_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase()
}

fn newest_first<T>(items: &mut [&T], key: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl AppData {
    pub fn create_survey(&mut self, input: NewSurvey) -> Survey {
        let survey = Survey {
            id: new_id(),
            staff_id: input.staff_id,
            student_grade: input.student_grade,
            is_anonymous: input.is_anonymous.unwrap_or(true),
            mood: Some(input.mood),
            stress_level: input.stress_level,
            sleep_quality: input.sleep_quality,
            social_interaction: input.social_interaction,
            academic_pressure: input.academic_pressure,
            concerns: input.concerns,
            additional_notes: input.additional_notes,
            created_at: Utc::now(),
        };
        self.surveys.push(survey.clone());
        survey
    }

    pub fn list_surveys(&self, limit: usize) -> Vec<Survey> {
        let mut surveys: Vec<&Survey> = self.surveys.iter().collect();
        newest_first(&mut surveys, |survey| survey.created_at);
        surveys.into_iter().take(limit).cloned().collect()
    }

    /// Both ends inclusive.
    pub fn list_surveys_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Survey> {
        let mut surveys: Vec<&Survey> = self
            .surveys
            .iter()
            .filter(|survey| survey.created_at >= start && survey.created_at <= end)
            .collect();
        newest_first(&mut surveys, |survey| survey.created_at);
        surveys.into_iter().cloned().collect()
    }

    pub fn create_story(&mut self, input: NewStory) -> Story {
        let story = Story {
            id: new_id(),
            student_id: input.student_id,
            title: input.title.trim().to_string(),
            content: input.content,
            category: input.category.trim().to_string(),
            is_published: false,
            likes: 0,
            created_at: Utc::now(),
            published_at: None,
        };
        self.stories.push(story.clone());
        story
    }

    pub fn get_story(&self, id: &str) -> Option<Story> {
        self.stories.iter().find(|story| story.id == id).cloned()
    }

    pub fn published_stories(&self, limit: usize) -> Vec<Story> {
        let mut stories: Vec<&Story> = self.stories.iter().filter(|story| story.is_published).collect();
        newest_first(&mut stories, |story| story.published_at.unwrap_or(story.created_at));
        stories.into_iter().take(limit).cloned().collect()
    }

    pub fn stories_by_student(&self, student_id: &str) -> Vec<Story> {
        let mut stories: Vec<&Story> = self
            .stories
            .iter()
            .filter(|story| story.student_id.as_deref() == Some(student_id))
            .collect();
        newest_first(&mut stories, |story| story.created_at);
        stories.into_iter().cloned().collect()
    }

    pub fn publish_story(&mut self, id: &str) -> Option<Story> {
        let story = self.stories.iter_mut().find(|story| story.id == id)?;
        story.is_published = true;
        story.published_at = Some(Utc::now());
        Some(story.clone())
    }

    pub fn like_story(&mut self, id: &str) -> Option<Story> {
        let story = self.stories.iter_mut().find(|story| story.id == id)?;
        story.likes = story.likes.saturating_add(1);
        Some(story.clone())
    }

    pub fn create_alert(&mut self, input: NewAlert) -> Alert {
        let alert = Alert {
            id: new_id(),
            severity: input.severity,
            title: input.title,
            description: input.description,
            suggestion: input.suggestion,
            affected_count: input.affected_count,
            is_resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.alerts.push(alert.clone());
        alert
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<&Alert> = self.alerts.iter().filter(|alert| !alert.is_resolved).collect();
        newest_first(&mut alerts, |alert| alert.created_at);
        alerts.into_iter().cloned().collect()
    }

    pub fn resolve_alert(&mut self, id: &str) -> Option<Alert> {
        let alert = self.alerts.iter_mut().find(|alert| alert.id == id)?;
        alert.is_resolved = true;
        alert.resolved_at = Some(Utc::now());
        Some(alert.clone())
    }

    pub fn create_counselor_request(&mut self, input: NewCounselorRequest) -> CounselorRequest {
        let request = CounselorRequest {
            id: new_id(),
            student_id: input.student_id,
            urgency: input.urgency,
            reason: input.reason,
            status: input.status.unwrap_or_default(),
            verification_code: verification_code(),
            assigned_counselor_id: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.counselor_requests.push(request.clone());
        request
    }

    pub fn counselor_requests(&self, status: Option<RequestStatus>) -> Vec<CounselorRequest> {
        let mut requests: Vec<&CounselorRequest> = self
            .counselor_requests
            .iter()
            .filter(|request| status.is_none_or(|status| request.status == status))
            .collect();
        newest_first(&mut requests, |request| request.created_at);
        requests.into_iter().cloned().collect()
    }

    pub fn assign_counselor(&mut self, request_id: &str, counselor_id: &str) -> Option<CounselorRequest> {
        let request = self
            .counselor_requests
            .iter_mut()
            .find(|request| request.id == request_id)?;
        request.assigned_counselor_id = Some(counselor_id.to_string());
        request.status = RequestStatus::Assigned;
        Some(request.clone())
    }

    pub fn update_request_status(&mut self, request_id: &str, status: RequestStatus) -> Option<CounselorRequest> {
        let request = self
            .counselor_requests
            .iter_mut()
            .find(|request| request.id == request_id)?;
        request.status = status;
        if status == RequestStatus::Resolved {
            request.resolved_at = Some(Utc::now());
        }
        Some(request.clone())
    }
}
