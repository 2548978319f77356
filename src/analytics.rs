use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Identity, MoodEntry, TimeWindow, WellnessAssessment};
use crate::store::RecordStore;

pub const TREND_THRESHOLD: f64 = 0.3;
pub const RECENT_ENTRY_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timeframe {
    #[default]
    SevenDays,
    ThirtyDays,
    ThreeMonths,
}

impl Timeframe {
    /// Unrecognized labels fall back to seven days.
    pub fn parse(label: &str) -> Self {
        match label {
            "30d" => Self::ThirtyDays,
            "3m" => Self::ThreeMonths,
            _ => Self::SevenDays,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::ThreeMonths => "3m",
        }
    }

    pub fn window_ending(&self, end: DateTime<Utc>) -> TimeWindow {
        let start = match self {
            Self::SevenDays => end - Duration::days(7),
            Self::ThirtyDays => end - Duration::days(30),
            Self::ThreeMonths => end
                .checked_sub_months(Months::new(3))
                .unwrap_or_else(|| end - Duration::days(90)),
        };
        TimeWindow { start, end }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRequest {
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<Uuid>,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub average: f64,
    pub trend: Trend,
    pub distribution: BTreeMap<i32, usize>,
    pub total_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessSummary {
    pub average_stress: f64,
    pub average_sleep: f64,
    pub average_social: f64,
    pub total_assessments: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessAnalytics {
    pub mood: MoodSummary,
    pub wellness: WellnessSummary,
    pub insights: Vec<String>,
    pub check_in_frequency: u32,
}

fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = i32>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0i64, 0usize), |(sum, count), v| (sum + v as i64, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compares the last three values against everything before them.
pub fn mood_trend(values: &[i32]) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }

    let split = values.len().saturating_sub(RECENT_ENTRY_COUNT);
    let (earlier, recent) = values.split_at(split);
    let (Some(earlier_avg), Some(recent_avg)) =
        (mean(earlier.iter().copied()), mean(recent.iter().copied()))
    else {
        return Trend::Stable;
    };

    let difference = recent_avg - earlier_avg;
    if difference > TREND_THRESHOLD {
        Trend::Improving
    } else if difference < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn mood_distribution(entries: &[MoodEntry]) -> BTreeMap<i32, usize> {
    let mut distribution = BTreeMap::new();
    for entry in entries {
        *distribution.entry(entry.mood_value).or_insert(0) += 1;
    }
    distribution
}

pub fn generate_insights(
    entries: &[MoodEntry],
    assessments: &[WellnessAssessment],
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(avg_mood) = mean(entries.iter().map(|e| e.mood_value)) {
        if avg_mood >= 4.0 {
            insights.push("Great job maintaining positive mood levels!".to_string());
        } else if avg_mood <= 2.0 {
            insights.push(
                "Consider reaching out to support resources during challenging times.".to_string(),
            );
        }
    }

    let avg_stress = mean(assessments.iter().map(|a| a.stress_level));
    let avg_sleep = mean(assessments.iter().map(|a| a.sleep_quality));

    if avg_stress.is_some_and(|v| v > 7.0) {
        insights.push(
            "High stress levels detected. Try incorporating relaxation techniques.".to_string(),
        );
    }
    if avg_sleep.is_some_and(|v| v < 2.0) {
        insights.push(
            "Poor sleep quality may be affecting your wellness. Consider sleep hygiene practices."
                .to_string(),
        );
    }

    insights
}

/// Percentage of days in the window with at least one entry, by calendar date in `tz`.
pub fn check_in_frequency<Tz: TimeZone>(
    entries: &[MoodEntry],
    window: &TimeWindow,
    tz: &Tz,
) -> u32 {
    let days: HashSet<_> = entries
        .iter()
        .map(|e| e.created_at.with_timezone(tz).date_naive())
        .collect();
    let total = window.total_days() as f64;
    (100.0 * days.len() as f64 / total).round() as u32
}

/// Builds the dashboard payload from already-fetched records.
pub fn summarize<Tz: TimeZone>(
    entries: &[MoodEntry],
    assessments: &[WellnessAssessment],
    window: &TimeWindow,
    tz: &Tz,
) -> WellnessAnalytics {
    let mut ordered = entries.to_vec();
    ordered.sort_by_key(|e| e.created_at);
    let values: Vec<i32> = ordered.iter().map(|e| e.mood_value).collect();

    let averaged = |pick: fn(&WellnessAssessment) -> i32| {
        mean(assessments.iter().map(pick)).map(round_tenths).unwrap_or(0.0)
    };

    WellnessAnalytics {
        mood: MoodSummary {
            average: mean(values.iter().copied()).map(round_tenths).unwrap_or(0.0),
            trend: mood_trend(&values),
            distribution: mood_distribution(&ordered),
            total_entries: ordered.len(),
        },
        wellness: WellnessSummary {
            average_stress: averaged(|a| a.stress_level),
            average_sleep: averaged(|a| a.sleep_quality),
            average_social: averaged(|a| a.social_connection),
            total_assessments: assessments.len(),
        },
        insights: generate_insights(&ordered, assessments),
        check_in_frequency: check_in_frequency(&ordered, window, tz),
    }
}

#[derive(Clone)]
pub struct WellnessAnalyticsAggregator {
    store: Arc<dyn RecordStore>,
}

impl WellnessAnalyticsAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(timeframe = tracing::field::Empty))]
    pub async fn aggregate(&self, request: AnalyticsRequest) -> Result<WellnessAnalytics, ApiError> {
        let timeframe = Timeframe::parse(request.timeframe.as_deref().unwrap_or("7d"));
        tracing::Span::current().record("timeframe", timeframe.as_str());

        let identity = Identity::resolve(request.user_id, request.session_id.as_deref())
            .ok_or_else(|| ApiError::BadRequest("userId or sessionId is required".to_string()))?;

        self.aggregate_for(&identity, timeframe, Utc::now()).await
    }

    pub async fn aggregate_for(
        &self,
        identity: &Identity,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<WellnessAnalytics, ApiError> {
        let window = timeframe.window_ending(now);

        let (entries, assessments) = tokio::try_join!(
            self.store.mood_entries_in(identity, &window),
            self.store.assessments_in(identity, &window),
        )?;

        info!(
            identity = %identity,
            entries = entries.len(),
            assessments = assessments.len(),
            "aggregating wellness analytics"
        );

        Ok(summarize(&entries, &assessments, &window, &Local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{NewAssessment, NewMoodEntry};

    fn mood(value: i32, at: DateTime<Utc>) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: None,
            session_id: Some("anon_test".to_string()),
            mood_value: value,
            mood_label: "label".to_string(),
            notes: None,
            created_at: at,
        }
    }

    fn assessment(stress: i32, sleep: i32, social: i32) -> WellnessAssessment {
        WellnessAssessment {
            id: Uuid::new_v4(),
            user_id: None,
            session_id: Some("anon_test".to_string()),
            stress_level: stress,
            sleep_quality: sleep,
            social_connection: social,
            academic_pressure: 5,
            total_score: 0,
            recommendations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn week() -> TimeWindow {
        Timeframe::SevenDays.window_ending(Utc::now())
    }

    #[test]
    fn timeframe_labels_and_fallback() {
        assert_eq!(Timeframe::parse("7d"), Timeframe::SevenDays);
        assert_eq!(Timeframe::parse("30d"), Timeframe::ThirtyDays);
        assert_eq!(Timeframe::parse("3m"), Timeframe::ThreeMonths);
        assert_eq!(Timeframe::parse("1y"), Timeframe::SevenDays);
    }

    #[test]
    fn windows_end_now() {
        let now = Utc::now();
        assert_eq!(Timeframe::SevenDays.window_ending(now).total_days(), 7);
        assert_eq!(Timeframe::ThirtyDays.window_ending(now).total_days(), 30);

        let quarter = Timeframe::ThreeMonths.window_ending(now);
        assert_eq!(quarter.end, now);
        assert!((89..=92).contains(&quarter.total_days()));
    }

    #[test]
    fn empty_records_summarize_to_zeroes() {
        let analytics = summarize(&[], &[], &week(), &Utc);
        assert_eq!(analytics.mood.average, 0.0);
        assert_eq!(analytics.mood.trend, Trend::Stable);
        assert!(analytics.mood.distribution.is_empty());
        assert_eq!(analytics.wellness.average_stress, 0.0);
        assert_eq!(analytics.wellness.average_sleep, 0.0);
        assert_eq!(analytics.wellness.average_social, 0.0);
        assert!(analytics.insights.is_empty());
        assert_eq!(analytics.check_in_frequency, 0);
    }

    #[test]
    fn trend_compares_last_three_with_the_rest() {
        assert_eq!(mood_trend(&[5, 5, 5, 1, 1, 1]), Trend::Declining);
        assert_eq!(mood_trend(&[1, 1, 5, 5, 5]), Trend::Improving);
        assert_eq!(mood_trend(&[3, 3, 3, 3]), Trend::Stable);
        assert_eq!(mood_trend(&[3, 4, 3, 4, 3, 3]), Trend::Stable);
    }

    #[test]
    fn short_series_are_stable() {
        assert_eq!(mood_trend(&[]), Trend::Stable);
        assert_eq!(mood_trend(&[1]), Trend::Stable);
        assert_eq!(mood_trend(&[1, 5]), Trend::Stable);
        assert_eq!(mood_trend(&[5, 1, 1]), Trend::Stable);
    }

    #[test]
    fn trend_follows_chronological_order() {
        let now = Utc::now();
        let entries: Vec<MoodEntry> = [1, 1, 1, 5, 5, 5]
            .iter()
            .enumerate()
            .map(|(i, v)| mood(*v, now - Duration::hours(i as i64)))
            .collect();
        let analytics = summarize(&entries, &[], &week(), &Utc);
        assert_eq!(analytics.mood.trend, Trend::Declining);
    }

    #[test]
    fn averages_round_to_one_decimal() {
        let now = Utc::now();
        let entries = vec![mood(4, now), mood(4, now), mood(5, now)];
        let assessments = vec![assessment(7, 2, 3), assessment(8, 3, 3), assessment(8, 3, 4)];
        let analytics = summarize(&entries, &assessments, &week(), &Utc);

        assert_eq!(analytics.mood.average, 4.3);
        assert_eq!(analytics.wellness.average_stress, 7.7);
        assert_eq!(analytics.wellness.average_sleep, 2.7);
        assert_eq!(analytics.wellness.average_social, 3.3);
        assert_eq!(analytics.wellness.total_assessments, 3);
    }

    #[test]
    fn distribution_counts_sum_to_total() {
        let now = Utc::now();
        let entries: Vec<MoodEntry> = [3, 4, 3, 1, 5, 3].iter().map(|v| mood(*v, now)).collect();
        let analytics = summarize(&entries, &[], &week(), &Utc);

        assert_eq!(analytics.mood.distribution.get(&3), Some(&3));
        assert_eq!(analytics.mood.distribution.get(&2), None);
        let total: usize = analytics.mood.distribution.values().sum();
        assert_eq!(total, analytics.mood.total_entries);
    }

    #[test]
    fn insights_follow_thresholds_in_order() {
        let now = Utc::now();
        let low = vec![mood(2, now), mood(1, now)];
        let stressed = vec![assessment(8, 1, 3), assessment(9, 2, 3)];
        let insights = generate_insights(&low, &stressed);
        assert_eq!(insights.len(), 3);
        assert!(insights[0].starts_with("Consider reaching out"));
        assert!(insights[1].starts_with("High stress levels"));
        assert!(insights[2].starts_with("Poor sleep quality"));

        let happy = vec![mood(4, now), mood(5, now)];
        let insights = generate_insights(&happy, &[]);
        assert_eq!(insights, vec!["Great job maintaining positive mood levels!"]);

        let neutral = vec![mood(3, now)];
        assert!(generate_insights(&neutral, &[assessment(7, 2, 3)]).is_empty());
    }

    #[test]
    fn check_in_frequency_counts_distinct_days() {
        let window = week();
        let end = window.end;
        let entries = vec![
            mood(3, end),
            mood(4, end),
            mood(2, end - Duration::days(1)),
            mood(5, end - Duration::days(2)),
        ];
        assert_eq!(check_in_frequency(&entries, &window, &Utc), 43);
    }

    #[tokio::test]
    async fn aggregate_reads_only_the_window() {
        let store = Arc::new(MemoryStore::new());
        let me = Identity::Session("anon_dash".to_string());
        let now = Utc::now();

        for (value, days_ago) in [(5, 20), (2, 3), (2, 2), (1, 1)] {
            store
                .insert_mood_entry(NewMoodEntry {
                    identity: me.clone(),
                    mood_value: value,
                    mood_label: "label".to_string(),
                    notes: None,
                    created_at: now - Duration::days(days_ago),
                })
                .await
                .unwrap();
        }
        store
            .insert_assessment(NewAssessment {
                identity: me.clone(),
                stress_level: 8,
                sleep_quality: 3,
                social_connection: 2,
                academic_pressure: 6,
                total_score: 18,
                recommendations: Vec::new(),
                created_at: now - Duration::days(1),
            })
            .await
            .unwrap();

        let aggregator = WellnessAnalyticsAggregator::new(store.clone());
        let week = aggregator
            .aggregate_for(&me, Timeframe::SevenDays, now)
            .await
            .unwrap();
        assert_eq!(week.mood.total_entries, 3);
        assert_eq!(week.mood.average, 1.7);
        assert_eq!(week.mood.trend, Trend::Stable);
        assert_eq!(week.wellness.average_stress, 8.0);

        let month = aggregator
            .aggregate_for(&me, Timeframe::ThirtyDays, now)
            .await
            .unwrap();
        assert_eq!(month.mood.total_entries, 4);
        assert_eq!(month.mood.trend, Trend::Declining);
    }

    #[tokio::test]
    async fn read_failure_aborts_aggregation() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads(true);
        let aggregator = WellnessAnalyticsAggregator::new(store);

        let request = AnalyticsRequest {
            session_id: Some("anon_down".to_string()),
            ..Default::default()
        };
        let err = aggregator.aggregate(request).await.unwrap_err();
        assert!(matches!(err, ApiError::Store(_)));
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let aggregator = WellnessAnalyticsAggregator::new(Arc::new(MemoryStore::new()));
        let err = aggregator
            .aggregate(AnalyticsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
