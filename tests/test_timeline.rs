//! Integration tests for timeline analysis over stored snapshots

mod helpers;

use helpers::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

use vaino::models::SnapshotInfo;
use vaino::timeline::{EventType, Relationship, TimelineAnalyzer, TrendType};

fn info(id: &str, provider: &str, hour: i64, count: usize) -> SnapshotInfo {
    SnapshotInfo {
        id: id.to_string(),
        timestamp: at_hour(hour),
        provider: provider.to_string(),
        resource_count: count,
        file_path: PathBuf::from(format!("/tmp/{}.json", id)),
        file_size: 0,
        tags: BTreeMap::new(),
    }
}

#[test]
fn test_linear_growth_trend_and_predictions() {
    let series: Vec<SnapshotInfo> = [10, 12, 14, 16, 18]
        .iter()
        .enumerate()
        .map(|(i, count)| info(&format!("snap-{}", i), "aws", i as i64, *count))
        .collect();

    let analysis = TimelineAnalyzer::analyze(&series);

    assert_eq!(analysis.trends().len(), 1);
    let trend = &analysis.trends()[0];
    assert_eq!(trend.trend_type, TrendType::Increasing);
    assert!((trend.slope - 2.0).abs() < 1e-9);
    assert!(trend.confidence > 0.0);

    assert_eq!(trend.predictions.len(), 3);
    for (step, (prediction, expected)) in trend.predictions.iter().zip([20.0, 22.0, 24.0]).enumerate() {
        assert!((prediction.predicted_value - expected).abs() < 1e-6);
        assert_eq!(prediction.timestamp, at_hour(4 + step as i64 + 1));
    }
    assert!(trend.predictions[0].confidence > trend.predictions[2].confidence);
}

#[test]
fn test_analysis_ignores_input_order() {
    let mut series = vec![
        info("snap-a", "aws", 0, 10),
        info("snap-b", "aws", 1, 30),
        info("snap-c", "aws", 2, 20),
    ];
    let forward = TimelineAnalyzer::analyze(&series);
    series.reverse();
    let backward = TimelineAnalyzer::analyze(&series);
    assert_eq!(forward, backward);

    let kinds: Vec<EventType> = forward.events().iter().map(|e| e.event_type).collect();
    assert!(kinds.contains(&EventType::ResourceAddition));
    assert!(kinds.contains(&EventType::ResourceRemoval));
    assert!(kinds.contains(&EventType::InfrastructureChange));
}

#[test]
fn test_correlated_providers() {
    let series = vec![
        info("aws-0", "aws", 0, 10),
        info("gcp-0", "gcp", 0, 5),
        info("aws-1", "aws", 1, 20),
        info("gcp-1", "gcp", 1, 9),
        info("aws-2", "aws", 2, 30),
        info("gcp-2", "gcp", 2, 16),
    ];

    let analysis = TimelineAnalyzer::analyze(&series);

    assert_eq!(analysis.correlations().len(), 1);
    let correlation = &analysis.correlations()[0];
    assert_eq!(correlation.provider_a, "aws");
    assert_eq!(correlation.provider_b, "gcp");
    assert_eq!(correlation.relationship, Relationship::Positive);
    assert_eq!(correlation.sample_size, 3);
    assert!(!correlation.examples.is_empty());
}

#[test]
fn test_timeline_from_store_listing() {
    let env = TestStore::new().unwrap();
    for (hour, count) in [(0, 4), (1, 6), (2, 8)] {
        env.store
            .save_snapshot(&numbered_snapshot(&format!("snap-{}", hour), "aws", hour, count))
            .unwrap();
    }

    let listing = env.store.list_snapshots().unwrap();
    assert_eq!(listing.len(), 3);
    let analysis = TimelineAnalyzer::analyze(&listing);

    assert_eq!(analysis.trends()[0].trend_type, TrendType::Increasing);
    assert_eq!(analysis.trends()[0].data_points.len(), 3);
    assert_eq!(analysis.trends()[0].data_points[0].snapshot_id, "snap-0");
}

#[test]
fn test_short_series_has_no_trend() {
    let analysis = TimelineAnalyzer::analyze(&[info("snap-a", "aws", 0, 3), info("snap-b", "aws", 1, 3)]);
    assert!(analysis.trends().is_empty());
    assert!(analysis.events().is_empty());
    assert!(analysis.correlations().is_empty());
}
