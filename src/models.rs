use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Calm,
    Neutral,
    Stressed,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocialInteraction {
    VeryActive,
    Active,
    Moderate,
    Isolated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Urgent,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Urgent => "urgent",
        }
    }
}

/// A stored survey submission. `mood` is optional here even though new
/// submissions must carry one, so older or imported records still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: String,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub student_grade: Option<String>,
    #[serde(default = "default_true")]
    pub is_anonymous: bool,
    #[serde(default)]
    pub mood: Option<Mood>,
    pub stress_level: u8,
    #[serde(default)]
    pub sleep_quality: Option<SleepQuality>,
    #[serde(default)]
    pub social_interaction: Option<SocialInteraction>,
    #[serde(default)]
    pub academic_pressure: Option<u8>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSurvey {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub student_grade: Option<String>,
    #[serde(default)]
    pub is_anonymous: Option<bool>,
    pub mood: Mood,
    pub stress_level: u8,
    #[serde(default)]
    pub sleep_quality: Option<SleepQuality>,
    #[serde(default)]
    pub social_interaction: Option<SocialInteraction>,
    #[serde(default)]
    pub academic_pressure: Option<u8>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl NewSurvey {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=10).contains(&self.stress_level) {
            return Err("stressLevel must be between 1 and 10".to_string());
        }
        if let Some(pressure) = self.academic_pressure {
            if !(1..=10).contains(&pressure) {
                return Err("academicPressure must be between 1 and 10".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub likes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    #[serde(default)]
    pub student_id: Option<String>,
    pub title: String,
    pub content: String,
    pub category: String,
}

impl NewStory {
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("title", &self.title),
            ("content", &self.content),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} must not be empty"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub affected_count: Option<u32>,
    #[serde(default)]
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub suggestion: Option<String>,
    pub affected_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Routine,
    Soon,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Assigned,
    InProgress,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselorRequest {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub urgency: Urgency,
    pub reason: String,
    #[serde(default)]
    pub status: RequestStatus,
    pub verification_code: String,
    #[serde(default)]
    pub assigned_counselor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCounselorRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    pub urgency: Urgency,
    pub reason: String,
    #[serde(default)]
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub surveys: Vec<Survey>,
    #[serde(default)]
    pub stories: Vec<Story>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub counselor_requests: Vec<CounselorRequest>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatusQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AnalyzeRequest {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub counselor_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatusUpdateRequest {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveyStats {
    pub total: usize,
    pub avg_stress_level: f64,
    pub avg_academic_pressure: f64,
    pub mood_distribution: BTreeMap<Mood, usize>,
    pub concern_distribution: BTreeMap<String, usize>,
}

fn default_true() -> bool {
    true
}
