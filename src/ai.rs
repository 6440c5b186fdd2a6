//! Hosted-model integration.
//!
//! [`AiService`] is chosen once at startup from [`AiConfig`]: either a live
//! client for an OpenAI-compatible chat-completions endpoint, or a stub that
//! returns fixed, clearly labelled mock output. Business logic only sees the
//! enum and the [`TrendClassifier`] trait.

use crate::config::{AiConfig, AiMode};
use crate::errors::AiError;
use crate::models::{Mood, Severity, SleepQuality, SocialInteraction, Survey};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const FALLBACK_SUGGESTION: &str =
    "Consider scheduling a meeting with the wellness team to discuss this trend.";

const TREND_SYSTEM_PROMPT: &str = "You are an expert in analyzing student mental health data to identify trends and provide actionable recommendations for school administrators.";
const SUGGESTION_SYSTEM_PROMPT: &str =
    "You are a school wellness coordinator providing practical intervention suggestions.";
const MODERATION_SYSTEM_PROMPT: &str = "You are a content moderator for a school mental health platform, ensuring student stories are safe and supportive.";

/// One pattern reported by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendFinding {
    pub patterns: Vec<String>,
    pub severity: Severity,
    pub affected_count: u32,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Moderation {
    pub is_appropriate: bool,
    pub concerns: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Moderation {
    pub fn allow() -> Self {
        Self {
            is_appropriate: true,
            concerns: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Classifies a batch of surveys into trend findings. Output order is
/// meaningful and may legitimately be empty.
pub trait TrendClassifier: Sync {
    fn classify(
        &self,
        surveys: &[Survey],
    ) -> impl Future<Output = Result<Vec<TrendFinding>, AiError>> + Send;
}

pub enum AiService {
    Live(OpenAiClient),
    Stub,
}

impl AiService {
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        match config.mode {
            AiMode::Live => Ok(AiService::Live(OpenAiClient::new(config)?)),
            AiMode::Stub => Ok(AiService::Stub),
        }
    }

    pub fn mode(&self) -> AiMode {
        match self {
            AiService::Live(_) => AiMode::Live,
            AiService::Stub => AiMode::Stub,
        }
    }

    pub async fn alert_suggestion(&self, pattern: &str, severity: Severity, affected: u32) -> String {
        match self {
            AiService::Live(client) => match client.alert_suggestion(pattern, severity, affected).await {
                Ok(text) => text,
                Err(err) => {
                    error!("failed to generate alert suggestion: {err}");
                    FALLBACK_SUGGESTION.to_string()
                }
            },
            AiService::Stub => stub_suggestion(pattern, affected),
        }
    }

    /// Moderation fails open: any model failure lets the story through.
    pub async fn moderate_story(&self, title: &str, content: &str) -> Moderation {
        match self {
            AiService::Live(client) => match client.moderate_story(title, content).await {
                Ok(moderation) => moderation,
                Err(err) => {
                    error!("failed to moderate story: {err}");
                    Moderation::allow()
                }
            },
            AiService::Stub => {
                debug!("stub moderation allows all content");
                Moderation::allow()
            }
        }
    }
}

impl TrendClassifier for AiService {
    async fn classify(&self, surveys: &[Survey]) -> Result<Vec<TrendFinding>, AiError> {
        if surveys.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            AiService::Live(client) => client.classify(surveys).await,
            AiService::Stub => {
                warn!("no model configured, using mock trend analysis");
                Ok(stub_findings(surveys.len()))
            }
        }
    }
}

pub fn stub_findings(survey_count: usize) -> Vec<TrendFinding> {
    vec![TrendFinding {
        patterns: vec!["High stress levels detected".to_string()],
        severity: Severity::Warning,
        affected_count: (survey_count * 3 / 10) as u32,
        recommendations: vec![
            "Consider organizing stress management workshops".to_string(),
            "Provide additional mental health resources".to_string(),
        ],
    }]
}

fn stub_suggestion(pattern: &str, affected: u32) -> String {
    format!(
        "Consider addressing the {} affecting {affected} students through targeted interventions and support programs.",
        pattern.to_lowercase()
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendEnvelope {
    #[serde(default)]
    trends: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrend {
    #[serde(default)]
    pattern: Option<String>,
    severity: Severity,
    #[serde(default)]
    affected_count: u32,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModeration {
    #[serde(default)]
    is_appropriate: Option<bool>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SurveyDigest<'a> {
    mood: Option<Mood>,
    stress_level: u8,
    sleep_quality: Option<SleepQuality>,
    social_interaction: Option<SocialInteraction>,
    academic_pressure: Option<u8>,
    concerns: &'a [String],
    notes: Option<&'a str>,
}

impl<'a> From<&'a Survey> for SurveyDigest<'a> {
    fn from(survey: &'a Survey) -> Self {
        Self {
            mood: survey.mood,
            stress_level: survey.stress_level,
            sleep_quality: survey.sleep_quality,
            social_interaction: survey.social_interaction,
            academic_pressure: survey.academic_pressure,
            concerns: &survey.concerns,
            notes: survey.additional_notes.as_deref(),
        }
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config.api_key.clone().ok_or(AiError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        info!("using model {} at {}", config.model, config.base_url);

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }

    pub async fn classify(&self, surveys: &[Survey]) -> Result<Vec<TrendFinding>, AiError> {
        let prompt = trend_prompt(surveys)?;
        let content = self.complete(TREND_SYSTEM_PROMPT, &prompt, true).await?;
        let findings = parse_trends(&content)?;
        info!("model reported {} trends for {} surveys", findings.len(), surveys.len());
        Ok(findings)
    }

    pub async fn alert_suggestion(
        &self,
        pattern: &str,
        severity: Severity,
        affected: u32,
    ) -> Result<String, AiError> {
        let prompt = format!(
            "Given this mental health trend in a school:\n\
             - Pattern: {pattern}\n\
             - Severity: {}\n\
             - Affected Students: {affected}\n\n\
             Generate a specific, actionable suggestion for what the school should do (1-2 sentences). \
             Focus on concrete interventions like workshops, resources, or policy adjustments.",
            severity.as_str()
        );
        let content = self.complete(SUGGESTION_SYSTEM_PROMPT, &prompt, false).await?;
        Ok(content.trim().to_string())
    }

    pub async fn moderate_story(&self, title: &str, content: &str) -> Result<Moderation, AiError> {
        let prompt = format!(
            "Review this student story for a school mental health platform:\n\n\
             Title: {title}\n\
             Content: {content}\n\n\
             Check if it:\n\
             1. Contains appropriate content (no graphic violence, self-harm details, or harmful advice)\n\
             2. Respects privacy (no identifying information about others)\n\
             3. Promotes positive messages\n\n\
             Respond in JSON:\n\
             {{\n  \"isAppropriate\": true/false,\n  \"concerns\": [\"list any issues\"],\n  \"suggestions\": [\"how to improve if needed\"]\n}}"
        );
        let reply = self.complete(MODERATION_SYSTEM_PROMPT, &prompt, true).await?;
        parse_moderation(&reply)
    }

    async fn complete(&self, system: &str, user: &str, json_output: bool) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: json_output.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AiError::Timeout(self.timeout_secs)
                } else {
                    AiError::Http(err)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

fn trend_prompt(surveys: &[Survey]) -> Result<String, AiError> {
    let digest: Vec<SurveyDigest<'_>> = surveys.iter().map(SurveyDigest::from).collect();
    let data = serde_json::to_string_pretty(&digest)?;

    Ok(format!(
        "You are a mental health data analyst for a school. Analyze the following anonymous student wellbeing surveys and identify important trends or patterns that require attention.\n\n\
         Survey Data ({} responses):\n{data}\n\n\
         Identify:\n\
         1. Significant patterns or trends (e.g., high stress levels, sleep issues, social isolation)\n\
         2. Severity level for each pattern (info, warning, or urgent)\n\
         3. Estimated number of students affected\n\
         4. Specific recommendations for interventions (workshops, resources, policy changes)\n\n\
         Respond in JSON format with an array of trend objects:\n\
         {{\n  \"trends\": [\n    {{\n      \"pattern\": \"Brief description of the pattern\",\n      \"severity\": \"info|warning|urgent\",\n      \"affectedCount\": number,\n      \"recommendations\": [\"specific action 1\", \"specific action 2\"]\n    }}\n  ]\n}}\n\n\
         Focus on actionable insights that school staff can use to support student wellbeing.",
        surveys.len()
    ))
}

/// A reply that is not a trend envelope is an error. Inside the envelope,
/// entries that do not fit the schema are logged and dropped on their own.
pub(crate) fn parse_trends(content: &str) -> Result<Vec<TrendFinding>, AiError> {
    let envelope: TrendEnvelope = serde_json::from_str(content)?;
    Ok(envelope
        .trends
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<RawTrend>(value) {
            Ok(raw) => Some(raw),
            Err(err) => {
                warn!("dropping trend {index} from model reply: {err}");
                None
            }
        })
        .map(|raw| TrendFinding {
            patterns: raw
                .pattern
                .into_iter()
                .filter(|pattern| !pattern.trim().is_empty())
                .collect(),
            severity: raw.severity,
            affected_count: raw.affected_count,
            recommendations: raw.recommendations,
        })
        .collect())
}

pub(crate) fn parse_moderation(content: &str) -> Result<Moderation, AiError> {
    let raw: RawModeration = serde_json::from_str(content)?;
    Ok(Moderation {
        is_appropriate: raw.is_appropriate.unwrap_or(true),
        concerns: raw.concerns,
        suggestions: raw.suggestions,
    })
}
