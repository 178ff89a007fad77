mod common;

use std::sync::Arc;

use gateway::config::QueryConfig;
use gateway::models::telemetry::ChartColumn;
use gateway::repository::TelemetryRepository;
use gateway::services::query::WindowedQueryEngine;
use gateway::services::recommend::RecommendationService;
use gateway::services::telemetry::TelemetryService;

const DAY: i64 = 24 * 3600;
// 2024-06-01T12:00:00Z
const NOON: i64 = 1_717_243_200;

fn recommender(repo: TelemetryRepository) -> RecommendationService {
    let query = Arc::new(WindowedQueryEngine::new(
        repo.clone(),
        &QueryConfig {
            min_gap_secs: 300,
            batch_size: 60,
        },
    ));
    RecommendationService::new(repo, query)
}

#[tokio::test]
async fn chart_data_stops_at_the_day_boundary() {
    let pool = common::memory_pool().await;
    let repo = TelemetryRepository::new(pool);
    // yesterday evening, then a fresh session today
    for (i, &timestamp) in [NOON - DAY, NOON - 3600, NOON - 1800, NOON]
        .iter()
        .enumerate()
    {
        let mut row = common::sample_row(timestamp);
        row.pack_voltage = 3.5 + i as f64 * 0.1;
        repo.append("bms_001", &row).await.unwrap();
    }

    let service = TelemetryService::new(repo);
    let points = service
        .chart("bms_001", ChartColumn::PackVoltage)
        .await
        .unwrap();

    assert_eq!(points.len(), 3);
    // chronological, today only
    assert_eq!(points[0].timestamp, NOON - 3600);
    assert_eq!(points[2].timestamp, NOON);
    assert!((points[2].value - 3.8).abs() < 1e-9);
}

#[tokio::test]
async fn chart_data_for_an_unknown_device_is_empty() {
    let pool = common::memory_pool().await;
    let service = TelemetryService::new(TelemetryRepository::new(pool));
    let points = service.chart("bms_404", ChartColumn::Soc).await.unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn sustained_overheating_caps_the_discharge_current() {
    let pool = common::memory_pool().await;
    let repo = TelemetryRepository::new(pool);
    for i in 0..20 {
        let mut row = common::sample_row(NOON + i * 60);
        row.cell_temp = 45.0;
        repo.append("bms_001", &row).await.unwrap();
    }

    let recommendations = recommender(repo)
        .recommendations_from("bms_001", NOON + 20 * 60)
        .await
        .unwrap();

    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].kind, "current-dischg-limit");
    assert_eq!(recommendations[0].max, Some(2.0));
}

#[tokio::test]
async fn light_loads_narrow_the_charge_window() {
    let pool = common::memory_pool().await;
    let repo = TelemetryRepository::new(pool);
    for i in 0..20 {
        let mut row = common::sample_row(NOON + i * 60);
        row.pack_current = -0.1; // 0.4 W at 4 V
        repo.append("bms_001", &row).await.unwrap();
    }

    let recommendations = recommender(repo)
        .recommendations_from("bms_001", NOON + 20 * 60)
        .await
        .unwrap();

    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].kind, "soc-window");
    assert_eq!(recommendations[0].min, Some(40.0));
    assert_eq!(recommendations[0].max, Some(60.0));
}

#[tokio::test]
async fn repeated_shallow_cycles_cap_the_operating_voltage() {
    let pool = common::memory_pool().await;
    let repo = TelemetryRepository::new(pool);
    // seven 4-row cycles a minute apart: a charge row, then a shallow
    // discharge never dropping more than 0.2 V
    let voltages = [4.2, 4.0, 3.9, 3.8];
    let currents = [2.0, -1.0, -1.0, -1.0];
    for i in 0..28 {
        let mut row = common::sample_row(NOON + i * 60);
        row.pack_voltage = voltages[(i % 4) as usize];
        row.pack_current = currents[(i % 4) as usize];
        repo.append("bms_001", &row).await.unwrap();
    }

    let recommendations = recommender(repo)
        .recommendations_from("bms_001", NOON + 28 * 60)
        .await
        .unwrap();

    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].kind, "operating-voltage");
    assert_eq!(recommendations[0].max, Some(3.7));
}

#[tokio::test]
async fn healthy_usage_yields_no_recommendations() {
    let pool = common::memory_pool().await;
    let repo = TelemetryRepository::new(pool);
    for i in 0..20 {
        repo.append("bms_001", &common::sample_row(NOON + i * 60))
            .await
            .unwrap();
    }

    let recommendations = recommender(repo)
        .recommendations_from("bms_001", NOON + 20 * 60)
        .await
        .unwrap();
    assert!(recommendations.is_empty());
}
