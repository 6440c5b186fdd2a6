use crate::analytics::{round_one_decimal, SurveyAverages};
use crate::models::{Survey, SurveyStats};
use std::collections::BTreeMap;

pub fn build_survey_stats(surveys: &[Survey]) -> SurveyStats {
    let averages = SurveyAverages::from_surveys(surveys);

    let mut concern_distribution = BTreeMap::new();
    for concern in surveys.iter().flat_map(|survey| survey.concerns.iter()) {
        let concern = concern.trim();
        if concern.is_empty() {
            continue;
        }
        *concern_distribution.entry(concern.to_string()).or_insert(0) += 1;
    }

    SurveyStats {
        total: averages.total,
        avg_stress_level: round_one_decimal(averages.stress),
        avg_academic_pressure: round_one_decimal(averages.academic_pressure),
        mood_distribution: averages.moods,
        concern_distribution,
    }
}
