//! Timeline analysis over a series of snapshot listings
//!
//! The analyzer is a pure transformation of [`SnapshotInfo`] records into:
//! - events: notable count changes between consecutive snapshots of a provider
//! - trends: per-provider linear trend with short-horizon predictions
//! - correlations: Pearson correlation of provider counts at shared timestamps
//!
//! Input is stably sorted by `(timestamp, id)` and providers are visited in
//! sorted order, so the analysis does not depend on input order.

mod stats;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{
    CORRELATION_THRESHOLD, CORRELATION_WINDOW_SECS, MAX_CORRELATION_EXAMPLES, PREDICTION_STEPS,
};
use crate::models::{timestamp, SnapshotInfo};

const MIN_TREND_POINTS: usize = 3;
const STABLE_SLOPE: f64 = 0.1;
const VOLATILITY_RATIO: f64 = 0.25;
const LARGE_CHANGE_RATIO: f64 = 0.20;
const LARGE_ADDITION: i64 = 10;
const LARGE_REMOVAL: i64 = -5;
const PREDICTION_DECAY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ResourceAddition,
    ResourceRemoval,
    Deployment,
    InfrastructureChange,
    SustainedGrowth,
    SustainedDecline,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ResourceAddition => "resource_addition",
            EventType::ResourceRemoval => "resource_removal",
            EventType::Deployment => "deployment",
            EventType::InfrastructureChange => "infrastructure_change",
            EventType::SustainedGrowth => "sustained_growth",
            EventType::SustainedDecline => "sustained_decline",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventSeverity::Info => "info",
            EventSeverity::Warning => "warning",
            EventSeverity::Critical => "critical",
        })
    }
}

/// A notable change between consecutive snapshots of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub severity: EventSeverity,
    pub provider: String,
    pub snapshot_id: String,
    pub resource_delta: i64,
    pub description: String,
    pub context: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendType {
    Stable,
    Increasing,
    Decreasing,
    Volatile,
}

impl fmt::Display for TrendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendType::Stable => "stable",
            TrendType::Increasing => "increasing",
            TrendType::Decreasing => "decreasing",
            TrendType::Volatile => "volatile",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDataPoint {
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub snapshot_id: String,
    pub value: f64,
    pub change: f64,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPrediction {
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub predicted_value: f64,
    pub confidence: f64,
    pub reasoning: String,
}

/// Resource-count trend of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineTrend {
    pub provider: String,
    pub trend_type: TrendType,
    pub slope: f64,
    pub variance: f64,
    pub confidence: f64,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub end_time: DateTime<Utc>,
    pub data_points: Vec<TrendDataPoint>,
    pub predictions: Vec<TrendPrediction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Positive,
    Negative,
    None,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relationship::Positive => "positive",
            Relationship::Negative => "negative",
            Relationship::None => "none",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationExample {
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub event_a: String,
    pub event_b: String,
    /// Seconds from the first provider's event to the second's; negative when earlier
    pub time_difference_secs: i64,
    pub description: String,
}

/// Correlation between the resource counts of two providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub provider_a: String,
    pub provider_b: String,
    pub correlation: f64,
    pub confidence: f64,
    pub relationship: Relationship,
    pub sample_size: usize,
    pub examples: Vec<CorrelationExample>,
}

/// Results of analysing one snapshot series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineAnalyzer {
    events: Vec<TimelineEvent>,
    trends: Vec<TimelineTrend>,
    correlations: Vec<CorrelationAnalysis>,
}

impl TimelineAnalyzer {
    /// Analyse a series of snapshot listings in any order
    pub fn analyze(series: &[SnapshotInfo]) -> Self {
        let mut ordered: Vec<&SnapshotInfo> = series.iter().collect();
        ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let mut by_provider: BTreeMap<&str, Vec<&SnapshotInfo>> = BTreeMap::new();
        for info in ordered {
            by_provider.entry(info.provider.as_str()).or_default().push(info);
        }

        let mut events: Vec<TimelineEvent> = by_provider
            .values()
            .flat_map(|points| detect_events(points))
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let trends = by_provider
            .iter()
            .filter(|(_, points)| points.len() >= MIN_TREND_POINTS)
            .map(|(provider, points)| analyze_trend(provider, points))
            .collect();

        let correlations = find_correlations(&by_provider, &events);

        Self {
            events,
            trends,
            correlations,
        }
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn trends(&self) -> &[TimelineTrend] {
        &self.trends
    }

    pub fn correlations(&self) -> &[CorrelationAnalysis] {
        &self.correlations
    }
}

// ==================== Events ====================

fn detect_events(points: &[&SnapshotInfo]) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    for i in 1..points.len() {
        let prev = points[i - 1];
        let cur = points[i];
        let delta = cur.resource_count as i64 - prev.resource_count as i64;
        let elapsed = (cur.timestamp - prev.timestamp).num_seconds();
        let context: BTreeMap<String, Value> = [
            ("previous_count".to_string(), json!(prev.resource_count)),
            ("current_count".to_string(), json!(cur.resource_count)),
            ("time_diff_secs".to_string(), json!(elapsed)),
        ]
        .into_iter()
        .collect();
        let emit = |event_type, severity, description: String| TimelineEvent {
            timestamp: cur.timestamp,
            event_type,
            severity,
            provider: cur.provider.clone(),
            snapshot_id: cur.id.clone(),
            resource_delta: delta,
            description,
            context: context.clone(),
        };

        if delta > 0 {
            let (severity, description) = if delta > LARGE_ADDITION {
                (
                    EventSeverity::Warning,
                    format!("Large-scale resource deployment: {} new {} resources added", delta, cur.provider),
                )
            } else {
                (
                    EventSeverity::Info,
                    format!("Resource growth: {} new {} resources added", delta, cur.provider),
                )
            };
            events.push(emit(EventType::ResourceAddition, severity, description));
        } else if delta < 0 {
            let (severity, description) = if delta < LARGE_REMOVAL {
                (
                    EventSeverity::Critical,
                    format!("Significant resource cleanup: {} {} resources removed", -delta, cur.provider),
                )
            } else {
                (
                    EventSeverity::Warning,
                    format!("Resource cleanup: {} {} resources removed", -delta, cur.provider),
                )
            };
            events.push(emit(EventType::ResourceRemoval, severity, description));
        }

        if elapsed < CORRELATION_WINDOW_SECS && delta > 0 {
            events.push(emit(
                EventType::Deployment,
                EventSeverity::Info,
                "Rapid resource deployment detected".to_string(),
            ));
        }

        // A change from zero has no meaningful percentage
        if prev.resource_count > 0 {
            let ratio = delta as f64 / prev.resource_count as f64;
            if ratio.abs() > LARGE_CHANGE_RATIO {
                events.push(emit(
                    EventType::InfrastructureChange,
                    EventSeverity::Critical,
                    format!(
                        "Large-scale infrastructure change: {:+} resources ({:.1}% change)",
                        delta,
                        ratio * 100.0
                    ),
                ));
            }
        }

        if i >= 2 {
            let earlier = prev.resource_count as i64 - points[i - 2].resource_count as i64;
            if delta > 0 && earlier > 0 {
                events.push(emit(
                    EventType::SustainedGrowth,
                    EventSeverity::Info,
                    "Sustained infrastructure growth detected over multiple scans".to_string(),
                ));
            } else if delta < 0 && earlier < 0 {
                events.push(emit(
                    EventType::SustainedDecline,
                    EventSeverity::Warning,
                    "Sustained infrastructure decline detected over multiple scans".to_string(),
                ));
            }
        }
    }
    events
}

// ==================== Trends ====================

fn analyze_trend(provider: &str, points: &[&SnapshotInfo]) -> TimelineTrend {
    let values: Vec<f64> = points.iter().map(|p| p.resource_count as f64).collect();
    let data_points: Vec<TrendDataPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let change = if i == 0 { 0.0 } else { values[i] - values[i - 1] };
            let context = if i == 0 {
                "Initial measurement"
            } else if change > 0.0 {
                "Resource growth"
            } else if change < 0.0 {
                "Resource reduction"
            } else {
                "No change"
            };
            TrendDataPoint {
                timestamp: p.timestamp,
                snapshot_id: p.id.clone(),
                value: values[i],
                change,
                context: context.to_string(),
            }
        })
        .collect();

    let slope = stats::regression_slope(&values);
    let variance = stats::variance(&values);
    let mean = stats::mean(&values);
    let (trend_type, confidence) = classify_trend(slope, variance, mean);

    let first = points[0].timestamp;
    let last = points[points.len() - 1].timestamp;
    let predictions = predict(&values, last, last - first, points.len(), slope, trend_type, confidence);

    TimelineTrend {
        provider: provider.to_string(),
        trend_type,
        slope,
        variance,
        confidence,
        start_time: first,
        end_time: last,
        data_points,
        predictions,
    }
}

/// Trend type and confidence from regression slope and variance.
/// Volatility takes precedence over direction.
fn classify_trend(slope: f64, variance: f64, mean: f64) -> (TrendType, f64) {
    let mean_sq = mean * mean;
    if mean_sq > 0.0 && variance > mean_sq * VOLATILITY_RATIO {
        return (TrendType::Volatile, (variance / mean_sq).clamp(0.0, 1.0));
    }
    if slope.abs() < STABLE_SLOPE {
        let confidence = if mean_sq > 0.0 { 1.0 - variance / mean_sq } else { 1.0 };
        return (TrendType::Stable, confidence.clamp(0.0, 1.0));
    }
    let confidence = if mean > 0.0 { (slope.abs() / mean).clamp(0.0, 1.0) } else { 0.0 };
    if slope > 0.0 {
        (TrendType::Increasing, confidence)
    } else {
        (TrendType::Decreasing, confidence)
    }
}

fn predict(
    values: &[f64],
    last: DateTime<Utc>,
    span: Duration,
    count: usize,
    slope: f64,
    trend_type: TrendType,
    confidence: f64,
) -> Vec<TrendPrediction> {
    let last_value = values.last().copied().unwrap_or(0.0);
    let intervals = count.saturating_sub(1).max(1) as i32;
    let interval = span / intervals;

    (1..=PREDICTION_STEPS)
        .map(|step| {
            let k = step as f64;
            let horizon = match step {
                1 => "short-term prediction",
                2 => "medium-term prediction",
                _ => "long-term prediction with lower confidence",
            };
            TrendPrediction {
                timestamp: last + interval * step as i32,
                predicted_value: (last_value + slope * k).max(0.0),
                confidence: (confidence * (1.0 - PREDICTION_DECAY * k)).clamp(0.0, 1.0),
                reasoning: format!("Based on {} trend ({})", trend_type, horizon),
            }
        })
        .collect()
}

// ==================== Correlations ====================

fn find_correlations(
    by_provider: &BTreeMap<&str, Vec<&SnapshotInfo>>,
    events: &[TimelineEvent],
) -> Vec<CorrelationAnalysis> {
    let series: BTreeMap<&str, BTreeMap<DateTime<Utc>, f64>> = by_provider
        .iter()
        .map(|(provider, points)| {
            let counts = points
                .iter()
                .map(|p| (p.timestamp, p.resource_count as f64))
                .collect();
            (*provider, counts)
        })
        .collect();
    let providers: Vec<&str> = series.keys().copied().collect();

    let mut correlations = Vec::new();
    for (i, a) in providers.iter().enumerate() {
        for b in &providers[i + 1..] {
            let (xs, ys): (Vec<f64>, Vec<f64>) = series[a]
                .iter()
                .filter_map(|(ts, x)| series[b].get(ts).map(|y| (*x, *y)))
                .unzip();
            if xs.len() < 2 {
                continue;
            }
            let r = stats::pearson(&xs, &ys);
            if r.abs() <= CORRELATION_THRESHOLD {
                continue;
            }
            correlations.push(CorrelationAnalysis {
                provider_a: a.to_string(),
                provider_b: b.to_string(),
                correlation: r,
                confidence: (xs.len() as f64 / 10.0).min(1.0),
                relationship: relationship(r),
                sample_size: xs.len(),
                examples: correlation_examples(a, b, events),
            });
        }
    }
    correlations
}

fn relationship(r: f64) -> Relationship {
    if r > CORRELATION_THRESHOLD {
        Relationship::Positive
    } else if r < -CORRELATION_THRESHOLD {
        Relationship::Negative
    } else {
        Relationship::None
    }
}

fn correlation_examples(a: &str, b: &str, events: &[TimelineEvent]) -> Vec<CorrelationExample> {
    let mut examples = Vec::new();
    for ea in events.iter().filter(|e| e.provider == a) {
        for eb in events.iter().filter(|e| e.provider == b) {
            let diff = (eb.timestamp - ea.timestamp).num_seconds();
            if diff.abs() > CORRELATION_WINDOW_SECS {
                continue;
            }
            examples.push(CorrelationExample {
                timestamp: ea.timestamp,
                event_a: format!("{}: {}", ea.provider, ea.description),
                event_b: format!("{}: {}", eb.provider, eb.description),
                time_difference_secs: diff,
                description: describe_offset(a, b, diff),
            });
            if examples.len() >= MAX_CORRELATION_EXAMPLES {
                return examples;
            }
        }
    }
    examples
}

/// `<b> change occurred <n> <unit> after|before <a> change`
pub fn describe_offset(a: &str, b: &str, diff_secs: i64) -> String {
    let direction = if diff_secs < 0 { "before" } else { "after" };
    let secs = diff_secs.abs();
    let (amount, unit) = if secs < 60 {
        (secs, "seconds")
    } else if secs < 3600 {
        (secs / 60, "minutes")
    } else {
        (secs / 3600, "hours")
    };
    format!("{} change occurred {} {} {} {} change", b, amount, unit, direction, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn info(id: &str, provider: &str, hour: i64, count: usize) -> SnapshotInfo {
        SnapshotInfo {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            provider: provider.to_string(),
            resource_count: count,
            file_path: PathBuf::from(format!("{}-scan.json", id)),
            file_size: 0,
            tags: BTreeMap::new(),
        }
    }

    fn series(provider: &str, counts: &[usize]) -> Vec<SnapshotInfo> {
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| info(&format!("{}-{}", provider, i), provider, i as i64, *c))
            .collect()
    }

    // ==================== Event tests ====================

    #[test]
    fn test_addition_and_removal_events() {
        let analyzer = TimelineAnalyzer::analyze(&series("aws", &[10, 12, 30, 20, 18]));
        let kinds: Vec<(EventType, EventSeverity)> = analyzer
            .events()
            .iter()
            .filter(|e| matches!(e.event_type, EventType::ResourceAddition | EventType::ResourceRemoval))
            .map(|e| (e.event_type, e.severity))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventType::ResourceAddition, EventSeverity::Info),
                (EventType::ResourceAddition, EventSeverity::Warning),
                (EventType::ResourceRemoval, EventSeverity::Critical),
                (EventType::ResourceRemoval, EventSeverity::Warning),
            ]
        );
        let growth = &analyzer.events()[0];
        assert_eq!(growth.description, "Resource growth: 2 new aws resources added");
        assert_eq!(growth.context["previous_count"], json!(10));
        assert_eq!(growth.context["time_diff_secs"], json!(3600));
    }

    #[test]
    fn test_large_change_and_sustained_patterns() {
        let analyzer = TimelineAnalyzer::analyze(&series("gcp", &[10, 15, 20]));
        let large: Vec<_> = analyzer
            .events()
            .iter()
            .filter(|e| e.event_type == EventType::InfrastructureChange)
            .collect();
        assert_eq!(large.len(), 2);
        assert_eq!(
            large[0].description,
            "Large-scale infrastructure change: +5 resources (50.0% change)"
        );
        assert!(analyzer
            .events()
            .iter()
            .any(|e| e.event_type == EventType::SustainedGrowth && e.snapshot_id == "gcp-2"));
    }

    #[test]
    fn test_rapid_deployment_within_an_hour() {
        let mut points = series("aws", &[5]);
        let mut quick = info("aws-quick", "aws", 0, 6);
        quick.timestamp = quick.timestamp + Duration::minutes(10);
        points.push(quick);
        let analyzer = TimelineAnalyzer::analyze(&points);
        assert!(analyzer
            .events()
            .iter()
            .any(|e| e.event_type == EventType::Deployment));
    }

    #[test]
    fn test_providers_are_not_compared_with_each_other() {
        let mut points = series("aws", &[10]);
        points.push(info("k8s-0", "kubernetes", 1, 100));
        assert!(TimelineAnalyzer::analyze(&points).events().is_empty());
    }

    // ==================== Trend tests ====================

    #[test]
    fn test_increasing_trend_with_predictions() {
        let analyzer = TimelineAnalyzer::analyze(&series("aws", &[10, 12, 14, 16, 18]));
        let trend = &analyzer.trends()[0];
        assert_eq!(trend.trend_type, TrendType::Increasing);
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!(trend.confidence > 0.0);
        assert_eq!(trend.data_points[0].context, "Initial measurement");
        assert_eq!(trend.data_points[1].context, "Resource growth");

        let predicted: Vec<f64> = trend.predictions.iter().map(|p| p.predicted_value).collect();
        assert_eq!(predicted, vec![20.0, 22.0, 24.0]);
        assert_eq!(trend.predictions[0].timestamp, trend.end_time + Duration::hours(1));
        assert_eq!(trend.predictions[2].timestamp, trend.end_time + Duration::hours(3));
        assert!(trend.predictions[0].confidence > trend.predictions[2].confidence);
        assert_eq!(
            trend.predictions[0].reasoning,
            "Based on increasing trend (short-term prediction)"
        );
    }

    #[test]
    fn test_trend_classification() {
        let stable = TimelineAnalyzer::analyze(&series("a", &[10, 10, 10]));
        assert_eq!(stable.trends()[0].trend_type, TrendType::Stable);
        assert_eq!(stable.trends()[0].confidence, 1.0);

        let zeros = TimelineAnalyzer::analyze(&series("a", &[0, 0, 0]));
        assert_eq!(zeros.trends()[0].trend_type, TrendType::Stable);
        assert_eq!(zeros.trends()[0].confidence, 1.0);

        let volatile = TimelineAnalyzer::analyze(&series("a", &[1, 40, 2, 50]));
        assert_eq!(volatile.trends()[0].trend_type, TrendType::Volatile);

        let falling = TimelineAnalyzer::analyze(&series("a", &[30, 28, 26, 24]));
        assert_eq!(falling.trends()[0].trend_type, TrendType::Decreasing);
        assert!(falling.trends()[0].predictions.iter().all(|p| p.predicted_value >= 0.0));
    }

    #[test]
    fn test_two_points_yield_no_trend() {
        assert!(TimelineAnalyzer::analyze(&series("a", &[1, 2])).trends().is_empty());
    }

    // ==================== Correlation tests ====================

    #[test]
    fn test_positive_correlation_with_examples() {
        let mut points = series("aws", &[10, 12, 14, 16]);
        points.extend(series("gcp", &[5, 6, 7, 8]));
        let analyzer = TimelineAnalyzer::analyze(&points);
        let corr = &analyzer.correlations()[0];
        assert_eq!(corr.provider_a, "aws");
        assert_eq!(corr.provider_b, "gcp");
        assert_eq!(corr.relationship, Relationship::Positive);
        assert!((corr.correlation - 1.0).abs() < 1e-9);
        assert!((corr.confidence - 0.4).abs() < 1e-9);
        assert!(!corr.examples.is_empty() && corr.examples.len() <= MAX_CORRELATION_EXAMPLES);
    }

    #[test]
    fn test_unaligned_providers_have_no_correlation() {
        let mut points = series("aws", &[10, 12, 14]);
        points.push(info("gcp-x", "gcp", 100, 3));
        assert!(TimelineAnalyzer::analyze(&points).correlations().is_empty());
    }

    #[test]
    fn test_describe_offset() {
        assert_eq!(describe_offset("aws", "gcp", 30), "gcp change occurred 30 seconds after aws change");
        assert_eq!(describe_offset("aws", "gcp", -600), "gcp change occurred 10 minutes before aws change");
        assert_eq!(describe_offset("aws", "gcp", 7200), "gcp change occurred 2 hours after aws change");
    }

    #[test]
    fn test_analysis_ignores_input_order() {
        let mut points = series("aws", &[10, 12, 9, 15]);
        points.extend(series("gcp", &[3, 4, 5, 6]));
        let forward = TimelineAnalyzer::analyze(&points);
        points.reverse();
        assert_eq!(TimelineAnalyzer::analyze(&points), forward);
    }
}
