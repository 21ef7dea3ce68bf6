mod common;

use std::sync::OnceLock;

use axum::http::StatusCode;
use cookiepress::{config::ResponseTransport, infra::telemetry};
use httpmock::prelude::*;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use serial_test::serial;

use common::{Harness, sample_template};

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        telemetry::describe_metrics();
        snapshotter
    })
}

fn counter_value(name: &str, outcome: &str) -> Option<u64> {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| {
            let key = key.key();
            let matches = key.name() == name
                && key
                    .labels()
                    .any(|label| label.key() == "outcome" && label.value() == outcome);
            match (matches, value) {
                (true, DebugValue::Counter(count)) => Some(count),
                _ => None,
            }
        })
}

fn metric_names() -> Vec<String> {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect()
}

#[tokio::test]
#[serial]
async fn successful_generation_records_latency_and_size() {
    snapshotter();
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path("/org/cookiecutter-demo/archive/refs/heads/main.zip");
            then.status(200).body(sample_template());
        })
        .await;

    let before = counter_value(telemetry::GENERATE_TOTAL, "ok").unwrap_or(0);
    let harness = Harness::new(ResponseTransport::Binary);
    let response = harness
        .post_generate(json!({ "template_url": upstream.url("/org/cookiecutter-demo") }).to_string())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        counter_value(telemetry::GENERATE_TOTAL, "ok"),
        Some(before + 1)
    );
    let names = metric_names();
    assert!(names.iter().any(|name| name == telemetry::GENERATE_MS));
    assert!(names.iter().any(|name| name == telemetry::ARCHIVE_BYTES));
}

#[tokio::test]
#[serial]
async fn failed_generation_is_labelled_by_stage() {
    snapshotter();
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path("/org/missing/archive/refs/heads/main.zip");
            then.status(404);
        })
        .await;

    let before = counter_value(telemetry::GENERATE_TOTAL, "fetch").unwrap_or(0);
    let harness = Harness::new(ResponseTransport::Binary);
    let response = harness
        .post_generate(json!({ "template_url": upstream.url("/org/missing") }).to_string())
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(
        counter_value(telemetry::GENERATE_TOTAL, "fetch"),
        Some(before + 1)
    );
}
