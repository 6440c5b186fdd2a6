//! Survey analytics report: summary statistics, classifier insights, a
//! synthetic four-week trend series and rule-based recommendations.
//!
//! Everything except the insights is computed locally and deterministically.
//! The classifier is the only awaited call and any failure there degrades to
//! an empty insight list.

use crate::ai::{TrendClassifier, TrendFinding};
use crate::models::{Mood, Severity, Survey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

pub const FALLBACK_INSIGHT_TITLE: &str = "Wellness Pattern Detected";
const FALLBACK_INSIGHT_RECOMMENDATION: &str = "Continue monitoring this trend.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_surveys: usize,
    pub avg_stress_level: f64,
    pub avg_academic_pressure: f64,
    pub mood_distribution: BTreeMap<Mood, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub affected_count: u32,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: String,
    pub stress_level: f64,
    pub academic_pressure: f64,
    pub wellness_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub category: String,
    pub actions: Vec<String>,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub summary: AnalyticsSummary,
    pub insights: Vec<Insight>,
    pub trends: Vec<TrendPoint>,
    pub recommendations: Vec<Recommendation>,
}

impl AnalyticsReport {
    pub fn empty() -> Self {
        Self {
            summary: AnalyticsSummary {
                total_surveys: 0,
                avg_stress_level: 0.0,
                avg_academic_pressure: 0.0,
                mood_distribution: BTreeMap::new(),
            },
            insights: Vec::new(),
            trends: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Unrounded means plus mood counts. Rules and trends work on these; only
/// the returned summary is rounded.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyAverages {
    pub total: usize,
    pub stress: f64,
    pub academic_pressure: f64,
    pub moods: BTreeMap<Mood, usize>,
}

impl SurveyAverages {
    /// Missing academic pressure counts as zero and stays in the
    /// denominator.
    pub fn from_surveys(surveys: &[Survey]) -> Self {
        let total = surveys.len();
        let mut moods = BTreeMap::new();
        let mut stress_sum = 0u64;
        let mut pressure_sum = 0u64;

        for survey in surveys {
            stress_sum += u64::from(survey.stress_level);
            pressure_sum += u64::from(survey.academic_pressure.unwrap_or(0));
            if let Some(mood) = survey.mood {
                *moods.entry(mood).or_insert(0) += 1;
            }
        }

        let denom = if total == 0 { 1.0 } else { total as f64 };
        Self {
            total,
            stress: stress_sum as f64 / denom,
            academic_pressure: pressure_sum as f64 / denom,
            moods,
        }
    }

    fn mood_count(&self, mood: Mood) -> usize {
        self.moods.get(&mood).copied().unwrap_or(0)
    }
}

pub struct AnalyticsAggregator<'a, C> {
    classifier: &'a C,
    classifier_timeout: Duration,
}

impl<'a, C: TrendClassifier> AnalyticsAggregator<'a, C> {
    pub fn new(classifier: &'a C) -> Self {
        Self {
            classifier,
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, classifier_timeout: Duration) -> Self {
        self.classifier_timeout = classifier_timeout;
        self
    }

    pub async fn generate_report(&self, surveys: &[Survey]) -> AnalyticsReport {
        if surveys.is_empty() {
            return AnalyticsReport::empty();
        }

        let averages = SurveyAverages::from_surveys(surveys);
        let findings = self.findings(surveys).await;
        let insights = findings.into_iter().map(Insight::from).collect();

        AnalyticsReport {
            summary: AnalyticsSummary {
                total_surveys: averages.total,
                avg_stress_level: round_one_decimal(averages.stress),
                avg_academic_pressure: round_one_decimal(averages.academic_pressure),
                mood_distribution: averages.moods.clone(),
            },
            insights,
            trends: synthetic_trend(averages.stress, averages.academic_pressure),
            recommendations: derive_recommendations(&averages),
        }
    }

    /// Classifier output, or an empty list if the call fails or runs past
    /// the timeout.
    pub async fn findings(&self, surveys: &[Survey]) -> Vec<TrendFinding> {
        match timeout(self.classifier_timeout, self.classifier.classify(surveys)).await {
            Ok(Ok(findings)) => {
                debug!("classifier returned {} findings", findings.len());
                findings
            }
            Ok(Err(err)) => {
                warn!("trend classifier failed, continuing without insights: {err}");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "trend classifier timed out after {}s, continuing without insights",
                    self.classifier_timeout.as_secs()
                );
                Vec::new()
            }
        }
    }
}

impl From<TrendFinding> for Insight {
    fn from(finding: TrendFinding) -> Self {
        Self {
            title: finding
                .patterns
                .into_iter()
                .next()
                .unwrap_or_else(|| FALLBACK_INSIGHT_TITLE.to_string()),
            description: format!(
                "Pattern identified in student survey data affecting approximately {} students.",
                finding.affected_count
            ),
            severity: finding.severity,
            affected_count: finding.affected_count,
            recommendation: finding
                .recommendations
                .into_iter()
                .next()
                .unwrap_or_else(|| FALLBACK_INSIGHT_RECOMMENDATION.to_string()),
        }
    }
}

/// Placeholder four-week chart series built from the current averages.
/// There is no weekly bucketing of real data behind it.
pub fn synthetic_trend(stress: f64, pressure: f64) -> Vec<TrendPoint> {
    let wellness = 10.0 - (stress + pressure) / 2.0;

    vec![
        TrendPoint {
            period: "Week 1".to_string(),
            stress_level: (stress - 2.0).max(1.0),
            academic_pressure: (pressure - 1.0).max(1.0),
            wellness_score: wellness.min(10.0),
        },
        TrendPoint {
            period: "Week 2".to_string(),
            stress_level: (stress - 1.0).max(1.0),
            academic_pressure: pressure,
            wellness_score: (wellness - 0.5).min(10.0),
        },
        TrendPoint {
            period: "Week 3".to_string(),
            stress_level: stress + 0.5,
            academic_pressure: pressure + 0.5,
            wellness_score: (wellness - 1.0).max(1.0),
        },
        TrendPoint {
            period: "Week 4".to_string(),
            stress_level: stress,
            academic_pressure: pressure,
            wellness_score: wellness.min(10.0),
        },
    ]
}

/// Threshold rules, evaluated in a fixed order. Falls back to a single
/// low-priority block when nothing fires.
pub fn derive_recommendations(averages: &SurveyAverages) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if averages.stress > 6.0 {
        recommendations.push(recommendation(
            "Stress Management",
            if averages.stress > 8.0 { Priority::High } else { Priority::Medium },
            &[
                "Implement mindfulness and meditation sessions",
                "Establish peer support groups and buddy systems",
                "Provide access to stress management workshops",
                "Create quiet spaces for students to decompress during breaks",
            ],
        ));
    }

    if averages.academic_pressure > 6.0 {
        recommendations.push(recommendation(
            "Academic Support",
            if averages.academic_pressure > 8.0 { Priority::High } else { Priority::Medium },
            &[
                "Review academic workload and assessment schedules",
                "Provide tutoring and study skills support",
                "Organize study groups and collaborative learning sessions",
                "Communicate with teachers about student workload concerns",
            ],
        ));
    }

    let distressed = averages.mood_count(Mood::Stressed) + averages.mood_count(Mood::Withdrawn);
    if distressed as f64 > averages.total as f64 * 0.2 {
        recommendations.push(recommendation(
            "Mental Health Support",
            Priority::High,
            &[
                "Increase counselor availability and visibility",
                "Train staff to recognize signs of distress",
                "Implement early intervention programs",
                "Create wellness champions network among peers",
            ],
        ));
    }

    if recommendations.is_empty() {
        recommendations.push(recommendation(
            "Maintain Wellness",
            Priority::Low,
            &[
                "Continue regular check-ins with students",
                "Maintain current support programs",
                "Monitor for changes in student wellbeing",
                "Celebrate positive mental health initiatives",
            ],
        ));
    }

    recommendations
}

fn recommendation(category: &str, priority: Priority, actions: &[&str]) -> Recommendation {
    Recommendation {
        category: category.to_string(),
        actions: actions.iter().map(|action| action.to_string()).collect(),
        priority,
    }
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AiError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SpyClassifier {
        calls: AtomicUsize,
        findings: Vec<TrendFinding>,
    }

    impl SpyClassifier {
        fn returning(findings: Vec<TrendFinding>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                findings,
            }
        }
    }

    impl TrendClassifier for SpyClassifier {
        async fn classify(&self, _surveys: &[Survey]) -> Result<Vec<TrendFinding>, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.findings.clone())
        }
    }

    struct FailingClassifier;

    impl TrendClassifier for FailingClassifier {
        async fn classify(&self, _surveys: &[Survey]) -> Result<Vec<TrendFinding>, AiError> {
            Err(AiError::EmptyResponse)
        }
    }

    struct SlowClassifier;

    impl TrendClassifier for SlowClassifier {
        async fn classify(&self, _surveys: &[Survey]) -> Result<Vec<TrendFinding>, AiError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![finding("never", Severity::Info, 1, &[])])
        }
    }

    fn survey(stress: u8, pressure: Option<u8>, mood: Option<Mood>) -> Survey {
        Survey {
            id: uuid::Uuid::new_v4().to_string(),
            staff_id: None,
            student_grade: None,
            is_anonymous: true,
            mood,
            stress_level: stress,
            sleep_quality: None,
            social_interaction: None,
            academic_pressure: pressure,
            concerns: Vec::new(),
            additional_notes: None,
            created_at: Utc::now(),
        }
    }

    fn stress_only(levels: &[u8]) -> Vec<Survey> {
        levels.iter().map(|&level| survey(level, None, None)).collect()
    }

    fn finding(pattern: &str, severity: Severity, affected: u32, recs: &[&str]) -> TrendFinding {
        TrendFinding {
            patterns: if pattern.is_empty() { Vec::new() } else { vec![pattern.to_string()] },
            severity,
            affected_count: affected,
            recommendations: recs.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn categories(report: &AnalyticsReport) -> Vec<&str> {
        report
            .recommendations
            .iter()
            .map(|rec| rec.category.as_str())
            .collect()
    }

    #[tokio::test]
    async fn empty_input_skips_classifier() {
        let spy = SpyClassifier::returning(vec![finding("x", Severity::Info, 1, &[])]);
        let report = AnalyticsAggregator::new(&spy).generate_report(&[]).await;

        assert_eq!(report, AnalyticsReport::empty());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_empty_input_calls_classifier_once() {
        let spy = SpyClassifier::returning(Vec::new());
        AnalyticsAggregator::new(&spy)
            .generate_report(&stress_only(&[5, 6]))
            .await;
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trends_always_have_four_weeks_in_order() {
        let spy = SpyClassifier::returning(Vec::new());
        let report = AnalyticsAggregator::new(&spy)
            .generate_report(&stress_only(&[3]))
            .await;
        let periods: Vec<&str> = report.trends.iter().map(|t| t.period.as_str()).collect();
        assert_eq!(periods, vec!["Week 1", "Week 2", "Week 3", "Week 4"]);
    }

    #[tokio::test]
    async fn exactly_eight_is_medium_not_high() {
        let spy = SpyClassifier::returning(Vec::new());
        let report = AnalyticsAggregator::new(&spy)
            .generate_report(&stress_only(&[8, 8, 8, 8]))
            .await;

        assert_eq!(report.summary.avg_stress_level, 8.0);
        assert_eq!(report.summary.avg_academic_pressure, 0.0);
        assert_eq!(report.recommendations[0].category, "Stress Management");
        assert_eq!(report.recommendations[0].priority, Priority::Medium);
    }

    #[tokio::test]
    async fn stress_priority_thresholds() {
        let spy = SpyClassifier::returning(Vec::new());
        let aggregator = AnalyticsAggregator::new(&spy);

        let high = aggregator.generate_report(&stress_only(&[9, 9, 9, 9])).await;
        assert_eq!(categories(&high), vec!["Stress Management"]);
        assert_eq!(high.recommendations[0].priority, Priority::High);

        let medium = aggregator.generate_report(&stress_only(&[7, 7, 7, 7])).await;
        assert_eq!(categories(&medium), vec!["Stress Management"]);
        assert_eq!(medium.recommendations[0].priority, Priority::Medium);

        let calm = aggregator.generate_report(&stress_only(&[5, 5, 5, 5])).await;
        assert_eq!(categories(&calm), vec!["Maintain Wellness"]);
        assert_eq!(calm.recommendations[0].priority, Priority::Low);
        assert_eq!(calm.recommendations[0].actions.len(), 4);
    }

    #[tokio::test]
    async fn academic_support_fires_on_pressure() {
        let spy = SpyClassifier::returning(Vec::new());
        let surveys: Vec<Survey> = (0..4).map(|_| survey(3, Some(9), None)).collect();
        let report = AnalyticsAggregator::new(&spy).generate_report(&surveys).await;

        assert_eq!(categories(&report), vec!["Academic Support"]);
        assert_eq!(report.recommendations[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn stressed_moods_above_twenty_percent_trigger_support() {
        let spy = SpyClassifier::returning(Vec::new());
        let mut surveys: Vec<Survey> = (0..3).map(|_| survey(4, None, Some(Mood::Stressed))).collect();
        surveys.extend((0..7).map(|_| survey(4, None, Some(Mood::Happy))));

        let report = AnalyticsAggregator::new(&spy).generate_report(&surveys).await;

        assert_eq!(categories(&report), vec!["Mental Health Support"]);
        assert_eq!(report.recommendations[0].priority, Priority::High);
        assert_eq!(report.summary.mood_distribution.get(&Mood::Stressed), Some(&3));
        assert_eq!(report.summary.mood_distribution.get(&Mood::Happy), Some(&7));
    }

    #[tokio::test]
    async fn exactly_twenty_percent_does_not_trigger_support() {
        let spy = SpyClassifier::returning(Vec::new());
        let mut surveys = vec![
            survey(4, None, Some(Mood::Stressed)),
            survey(4, None, Some(Mood::Withdrawn)),
        ];
        surveys.extend((0..8).map(|_| survey(4, None, Some(Mood::Calm))));

        let report = AnalyticsAggregator::new(&spy).generate_report(&surveys).await;
        assert_eq!(categories(&report), vec!["Maintain Wellness"]);
    }

    #[tokio::test]
    async fn rules_fire_in_fixed_order() {
        let spy = SpyClassifier::returning(Vec::new());
        let surveys: Vec<Survey> = (0..4)
            .map(|_| survey(9, Some(7), Some(Mood::Withdrawn)))
            .collect();
        let report = AnalyticsAggregator::new(&spy).generate_report(&surveys).await;

        assert_eq!(
            categories(&report),
            vec!["Stress Management", "Academic Support", "Mental Health Support"]
        );
        assert_eq!(report.recommendations[1].priority, Priority::Medium);
    }

    #[tokio::test]
    async fn averages_round_to_one_decimal() {
        let spy = SpyClassifier::returning(Vec::new());
        let report = AnalyticsAggregator::new(&spy)
            .generate_report(&stress_only(&[7, 8]))
            .await;
        assert_eq!(report.summary.avg_stress_level, 7.5);

        let thirds = AnalyticsAggregator::new(&spy)
            .generate_report(&stress_only(&[1, 1, 2]))
            .await;
        assert_eq!(thirds.summary.avg_stress_level, 1.3);
    }

    #[tokio::test]
    async fn missing_pressure_drags_average_down() {
        let spy = SpyClassifier::returning(Vec::new());
        let surveys = vec![survey(5, Some(8), None), survey(5, None, None)];
        let report = AnalyticsAggregator::new(&spy).generate_report(&surveys).await;
        assert_eq!(report.summary.avg_academic_pressure, 4.0);
        assert!(report.summary.mood_distribution.is_empty());
    }

    #[tokio::test]
    async fn classifier_failure_matches_empty_findings() {
        let surveys = stress_only(&[7, 9, 4]);

        let failed = AnalyticsAggregator::new(&FailingClassifier)
            .generate_report(&surveys)
            .await;
        let spy = SpyClassifier::returning(Vec::new());
        let empty = AnalyticsAggregator::new(&spy).generate_report(&surveys).await;

        assert!(failed.insights.is_empty());
        assert_eq!(failed, empty);
    }

    #[tokio::test(start_paused = true)]
    async fn classifier_timeout_degrades_to_no_insights() {
        let report = AnalyticsAggregator::new(&SlowClassifier)
            .with_timeout(Duration::from_millis(50))
            .generate_report(&stress_only(&[5]))
            .await;

        assert!(report.insights.is_empty());
        assert_eq!(report.trends.len(), 4);
        assert_eq!(categories(&report), vec!["Maintain Wellness"]);
    }

    #[tokio::test]
    async fn findings_map_to_insights_in_order() {
        let spy = SpyClassifier::returning(vec![
            finding("X", Severity::Urgent, 5, &["Y", "Z"]),
            finding("", Severity::Info, 2, &[]),
        ]);
        let report = AnalyticsAggregator::new(&spy)
            .generate_report(&stress_only(&[5]))
            .await;

        assert_eq!(
            report.insights,
            vec![
                Insight {
                    title: "X".to_string(),
                    description: "Pattern identified in student survey data affecting approximately 5 students."
                        .to_string(),
                    severity: Severity::Urgent,
                    affected_count: 5,
                    recommendation: "Y".to_string(),
                },
                Insight {
                    title: "Wellness Pattern Detected".to_string(),
                    description: "Pattern identified in student survey data affecting approximately 2 students."
                        .to_string(),
                    severity: Severity::Info,
                    affected_count: 2,
                    recommendation: "Continue monitoring this trend.".to_string(),
                },
            ]
        );
    }

    #[test]
    fn synthetic_trend_offsets() {
        let trend = synthetic_trend(6.0, 4.0);

        assert_eq!(trend[0].stress_level, 4.0);
        assert_eq!(trend[0].academic_pressure, 3.0);
        assert_eq!(trend[0].wellness_score, 5.0);
        assert_eq!(trend[1].stress_level, 5.0);
        assert_eq!(trend[1].academic_pressure, 4.0);
        assert_eq!(trend[1].wellness_score, 4.5);
        assert_eq!(trend[2].stress_level, 6.5);
        assert_eq!(trend[2].academic_pressure, 4.5);
        assert_eq!(trend[2].wellness_score, 4.0);
        assert_eq!(trend[3].stress_level, 6.0);
        assert_eq!(trend[3].wellness_score, 5.0);
    }

    #[test]
    fn synthetic_trend_clamps_low_values() {
        let trend = synthetic_trend(1.0, 0.0);
        assert_eq!(trend[0].stress_level, 1.0);
        assert_eq!(trend[0].academic_pressure, 1.0);
        assert_eq!(trend[1].stress_level, 1.0);

        let worst = synthetic_trend(10.0, 10.0);
        assert_eq!(worst[2].wellness_score, 1.0);
    }

    #[test]
    fn report_serializes_with_camel_case_fields() {
        let averages = SurveyAverages::from_surveys(&[survey(9, None, Some(Mood::Stressed))]);
        let report = AnalyticsReport {
            summary: AnalyticsSummary {
                total_surveys: averages.total,
                avg_stress_level: averages.stress,
                avg_academic_pressure: averages.academic_pressure,
                mood_distribution: averages.moods.clone(),
            },
            insights: Vec::new(),
            trends: synthetic_trend(averages.stress, averages.academic_pressure),
            recommendations: derive_recommendations(&averages),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["totalSurveys"], 1);
        assert_eq!(value["summary"]["moodDistribution"]["stressed"], 1);
        assert_eq!(value["trends"][0]["period"], "Week 1");
        assert!(value["trends"][0].get("wellnessScore").is_some());
        assert_eq!(value["recommendations"][0]["priority"], "high");
    }
}
