//! End-to-end scrape tests.
//!
//! Assembles the exporter over simulated devices, runs collection passes,
//! and scrapes the router the daemon serves.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gpumon_core::MetricSchema;
use gpumon_device::{Capability, SimulatedDevice, SimulatedProvider};
use gpumond::{Exporter, load_schemas};

fn bundled_config() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/metrics.toml")
}

fn exporter(provider: SimulatedProvider, schemas: &[MetricSchema]) -> Exporter {
    Exporter::new(schemas, Arc::new(provider), Duration::from_secs(5), None).unwrap()
}

async fn get(exporter: &Exporter, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = exporter.router().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[test]
fn bundled_config_declares_the_catalogue() {
    let schemas = load_schemas(&bundled_config()).unwrap();
    assert_eq!(schemas.len(), 16);

    for schema in &schemas {
        assert!(
            gpumon_device::GpuMetric::from_name(&schema.name).is_some(),
            "{} has no device source",
            schema.name
        );
        assert!(schema.labels.contains("gpu_id"));
    }
}

#[test]
fn missing_config_is_an_error() {
    let err = load_schemas(Path::new("/nonexistent/metrics.toml")).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/metrics.toml"));
}

#[test]
fn conflicting_declarations_fail_startup() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"metrics": [
            {{"name": "gpu_temperature", "help": "t", "type": "gauge", "labels": ["gpu_id"]}},
            {{"name": "gpu_temperature", "help": "t", "type": "gauge", "labels": ["gpu_uuid"]}}
        ]}}"#
    )
    .unwrap();

    let schemas = load_schemas(file.path()).unwrap();
    let result = Exporter::new(
        &schemas,
        Arc::new(SimulatedProvider::uniform(1, "Tesla-T4")),
        Duration::from_secs(5),
        None,
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn scrape_after_pass_exposes_samples() {
    let schemas = load_schemas(&bundled_config()).unwrap();
    let exporter = exporter(SimulatedProvider::uniform(2, "Tesla-T4"), &schemas);

    let summary = exporter.collector.collect_once().unwrap();
    assert_eq!(summary.devices, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.written, 32);

    let (status, body) = get(&exporter, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("# TYPE gpu_temperature gauge"));
    assert!(body.contains(
        "gpu_temperature{gpu_id=\"0\",gpu_name=\"Tesla-T4\",gpu_temperature_threshold=\"92\"} 65"
    ));
    assert!(body.contains("gpu_power_usage{gpu_id=\"1\",gpu_name=\"Tesla-T4\"} 70"));
    assert!(body.contains("gpu_memory_total{gpu_id=\"0\",gpu_name=\"Tesla-T4\"} 16384"));
    assert!(body.contains("gpu_metrics_processed_ops_total 1"));
}

#[tokio::test]
async fn failing_device_metric_is_absent_from_scrape() {
    let provider = SimulatedProvider::new(vec![
        SimulatedDevice::new(0, "Tesla-T4"),
        SimulatedDevice::new(1, "Tesla-T4").failing(Capability::PowerUsage),
    ]);
    let schemas = vec![
        MetricSchema::gauge("gpu_power_usage", "Power usage of the GPU in watts.", ["gpu_id"]),
        MetricSchema::gauge("gpu_temperature", "Temperature of the GPU.", ["gpu_id"]),
    ];
    let exporter = exporter(provider, &schemas);

    exporter.collector.collect_once().unwrap();

    let (_, body) = get(&exporter, "/metrics").await;
    assert!(body.contains("gpu_power_usage{gpu_id=\"0\"} 70"));
    assert!(!body.contains("gpu_power_usage{gpu_id=\"1\"}"));
    assert!(body.contains("gpu_temperature{gpu_id=\"1\"} 65"));
}

#[tokio::test]
async fn unsupported_label_scrapes_as_empty() {
    let provider = SimulatedProvider::new(vec![
        SimulatedDevice::new(0, "Tesla-T4").unsupported(Capability::Uuid),
    ]);
    let schemas = vec![MetricSchema::gauge(
        "gpu_temperature",
        "Temperature of the GPU.",
        ["gpu_id", "gpu_uuid"],
    )];
    let exporter = exporter(provider, &schemas);

    exporter.collector.collect_once().unwrap();

    let (_, body) = get(&exporter, "/metrics").await;
    assert!(body.contains("gpu_temperature{gpu_id=\"0\",gpu_uuid=\"\"} 65"));
}

#[tokio::test]
async fn schema_listing_returns_declarations() {
    let schemas = vec![
        MetricSchema::gauge("gpu_temperature", "Temperature of the GPU.", ["gpu_name", "gpu_id"]),
        MetricSchema::gauge("gpu_p_state", "Performance state.", ["gpu_id"]),
    ];
    let exporter = exporter(SimulatedProvider::uniform(1, "Tesla-T4"), &schemas);

    let (status, body) = get(&exporter, "/api/v1/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["name"], "gpu_p_state");
    assert_eq!(data[1]["type"], "gauge");
    assert_eq!(data[1]["labels"], serde_json::json!(["gpu_id", "gpu_name"]));
}

#[tokio::test]
async fn healthz_is_ok() {
    let exporter = exporter(
        SimulatedProvider::uniform(0, "Tesla-T4"),
        &[MetricSchema::gauge("gpu_temperature", "t", ["gpu_id"])],
    );
    let (status, body) = get(&exporter, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn collector_loop_feeds_scrapes_until_shutdown() {
    let exporter = Exporter::new(
        &[MetricSchema::gauge("gpu_temperature", "t", ["gpu_id"])],
        Arc::new(SimulatedProvider::uniform(1, "Tesla-T4")),
        Duration::from_millis(10),
        None,
    )
    .unwrap();

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = exporter.spawn_collector(rx);

    tokio::time::timeout(Duration::from_secs(5), async {
        while exporter.collector.processed_ops() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let (_, body) = get(&exporter, "/metrics").await;
    assert!(body.contains("gpu_temperature{gpu_id=\"0\"} 65"));

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
