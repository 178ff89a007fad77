mod common;

use serde_json::json;
use std::sync::Arc;

use gateway::models::telemetry::DeviceReading;
use gateway::repository::{DeviceRepository, FeatureRepository, TelemetryRepository};
use gateway::services::features::FeatureService;
use gateway::services::ingest::IngestService;

struct Fixture {
    ingest: IngestService,
    telemetry: TelemetryRepository,
    devices: DeviceRepository,
}

async fn fixture() -> Fixture {
    let pool = common::memory_pool().await;
    let telemetry = TelemetryRepository::new(pool.clone());
    let devices = DeviceRepository::new(pool.clone());
    let features = Arc::new(FeatureService::new(
        telemetry.clone(),
        FeatureRepository::new(pool),
    ));
    Fixture {
        ingest: IngestService::new(telemetry.clone(), devices.clone(), features),
        telemetry,
        devices,
    }
}

fn reading(id: &str, current: f64, timestamp: &str) -> serde_json::Value {
    json!({
        "id": id,
        "content": {
            "Q": 88, "H": 95, "C": 1.8, "V": 41.0,
            "V1": 385.0, "V2": 386.0, "V3": 384.0, "V4": 385.0,
            "I": current, "I1": -30.0, "I2": -30.0, "I3": -30.0, "I4": -30.0,
            "aT": 268.0, "cT": 295.0,
            "T1": 2500.0, "T2": 2500.0, "T3": 2500.0, "T4": 2500.0,
            "OTC": 3, "CC": 42, "wifi": true,
            "lat": 51.5, "lon": -0.1,
            "timestamp": timestamp
        }
    })
}

fn batch(values: Vec<serde_json::Value>) -> Vec<DeviceReading> {
    serde_json::from_value(json!(values)).expect("well-formed batch")
}

#[tokio::test]
async fn idle_readings_are_dropped() {
    let fx = fixture().await;
    let batch = batch(vec![
        reading("bms_001", -12.0, "2024-06-01T12:30:00"),
        reading("bms_002", 0.0, "2024-06-01T12:30:00"),
    ]);

    let accepted = fx.ingest.process_batch(&batch).await;
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].0, "bms_001");

    assert!(fx.telemetry.latest("bms_001").await.unwrap().is_some());
    assert!(fx.telemetry.latest("bms_002").await.unwrap().is_none());
    // an idle device leaves no directory trace either
    assert!(fx.devices.get("bms_002").await.unwrap().is_none());
}

#[tokio::test]
async fn batch_elements_are_recorded_under_their_root() {
    let fx = fixture().await;
    let batch = batch(vec![
        reading("bms_001", -12.0, "2024-06-01T12:30:00"),
        reading("bms_002", -8.0, "2024-06-01T12:30:00"),
        reading("bms_003", -5.0, "2024-06-01T12:30:00"),
    ]);

    let accepted = fx.ingest.process_batch(&batch).await;
    assert_eq!(accepted.len(), 3);

    let root = fx.devices.get("bms_001").await.unwrap().unwrap();
    assert_eq!(root.root_id, None);
    assert!(root.live);

    let node = fx.devices.get("bms_003").await.unwrap().unwrap();
    assert_eq!(node.root_id.as_deref(), Some("bms_001"));
    assert!(node.live);
}

#[tokio::test]
async fn replayed_timestamps_do_not_duplicate_rows() {
    let fx = fixture().await;
    let frames = vec![reading("bms_001", -12.0, "2024-06-01T12:30:00")];

    let first = fx.ingest.process_batch(&batch(frames.clone())).await;
    assert_eq!(first.len(), 1);
    // firmware retransmits the same readings after a flaky ack
    let second = fx.ingest.process_batch(&batch(frames)).await;
    assert!(second.is_empty());

    let rows = fx.telemetry.recent("bms_001", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn startup_reconciliation_clears_stale_live_flags() {
    let fx = fixture().await;
    let batch = batch(vec![
        reading("bms_001", -12.0, "2024-06-01T12:30:00"),
        reading("bms_002", -8.0, "2024-06-01T12:30:00"),
    ]);
    fx.ingest.process_batch(&batch).await;
    assert!(fx.devices.get("bms_001").await.unwrap().unwrap().live);

    // a crashed gateway never ran its disconnect cleanup
    let cleared = fx.devices.reset_all_live().await.unwrap();
    assert_eq!(cleared, 2);
    assert!(!fx.devices.get("bms_001").await.unwrap().unwrap().live);
    assert!(!fx.devices.get("bms_002").await.unwrap().unwrap().live);
}

#[tokio::test]
async fn stored_rows_are_in_si_units() {
    let fx = fixture().await;
    let batch = batch(vec![reading("bms_001", -12.0, "2024-06-01T12:30:00")]);
    fx.ingest.process_batch(&batch).await;

    let row = fx.telemetry.latest("bms_001").await.unwrap().unwrap();
    assert!((row.pack_voltage - 4.1).abs() < 1e-9);
    assert!((row.pack_current - -1.2).abs() < 1e-9);
    assert!((row.v2 - 3.86).abs() < 1e-9);
    assert!((row.ambient_temp - 26.8).abs() < 1e-9);
    assert!((row.t4 - 25.0).abs() < 1e-9);
    // derived charges landed too
    assert!(row.q1 > 0.0 && row.q1 < 100.0);
}
