use std::sync::Arc;
use std::time::Duration;

use cansat_gcs::{
    decode_frame, GcsConfig, LogEventSink, SourceMode, TelemetryService,
};

fn fast_config() -> GcsConfig {
    GcsConfig {
        fallback_retries: 3,
        fallback_interval_ms: 10,
        dummy_interval_ms: 10,
        ..GcsConfig::default()
    }
}

fn csv_frame(altitude: f64, seq: u32) -> String {
    format!(
        "7.4,13.0,80.2,{altitude},24.5,1002.1,12.0,0.35,0.1,-0.2,0.05,98.5,10:00:{seq:02}"
    )
}

#[tokio::test]
async fn test_station_runs_simulated_without_hardware() {
    let mut service = TelemetryService::new(fast_config(), Arc::new(LogEventSink));
    service.start(None).await;
    assert_eq!(service.mode(), SourceMode::Simulated);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let record = service.get_data().expect("simulator should be producing");
    assert!(record.altitude > 0.0);
    assert!(record.voltage.is_none());
    service.stop();
}

#[tokio::test]
async fn test_decoded_frames_flow_through_to_live_mode() {
    let mut service = TelemetryService::new(fast_config(), Arc::new(LogEventSink));
    service.start(None).await;

    // Wire-format frames land on the live queue exactly as a serial
    // reader would deliver them.
    let producer = service.live_queue_handle();
    for seq in 0..5u32 {
        let record = decode_frame(&csv_frame(900.0 - seq as f64, seq)).unwrap();
        producer.push(record);
    }

    let first = service.get_data().expect("first live record");
    assert_eq!(service.mode(), SourceMode::Live);
    assert_eq!(first.altitude, 900.0);
    assert_eq!(first.time, "10:00:00");

    for seq in 1..5u32 {
        let record = service.get_data().expect("remaining live records in order");
        assert_eq!(record.altitude, 900.0 - seq as f64);
    }
    assert!(service.get_data().is_none());
    assert_eq!(service.mode(), SourceMode::Live);
    service.stop();
}

#[tokio::test]
async fn test_bounded_queue_drops_oldest_under_backpressure() {
    let config = GcsConfig {
        queue_capacity: 8,
        // Slow simulator so only the live queue can overflow here.
        dummy_interval_ms: 60_000,
        ..fast_config()
    };
    let mut service = TelemetryService::new(config, Arc::new(LogEventSink));
    service.start(None).await;

    let producer = service.live_queue_handle();
    for seq in 0..20u32 {
        producer.push(decode_frame(&csv_frame(1000.0, seq)).unwrap());
    }

    // Only the newest eight survive; the rest are counted as dropped.
    let first = service.get_data().expect("newest records retained");
    assert_eq!(first.time, "10:00:12");
    assert_eq!(service.dropped_records(), 12);
    service.stop();
}

#[tokio::test]
async fn test_stop_is_idempotent_and_halts_production() {
    let mut service = TelemetryService::new(fast_config(), Arc::new(LogEventSink));
    service.start(None).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    service.stop();
    service.stop();

    while service.get_data().is_some() {}
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(service.get_data().is_none());
}
