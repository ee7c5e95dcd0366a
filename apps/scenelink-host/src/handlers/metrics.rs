//! 绑定计数器快照
//!
//! - GET /api/metrics

use api_contract::MetricsSnapshotDto;
use axum::response::Response;
use scenelink_telemetry::metrics;

use crate::utils::response::ok;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsSnapshotDto {
        values_received: snapshot.values_received,
        values_applied: snapshot.values_applied,
        conversion_failures: snapshot.conversion_failures,
        store_failures: snapshot.store_failures,
        subscriber_failures: snapshot.subscriber_failures,
        reads_failed: snapshot.reads_failed,
        connects_succeeded: snapshot.connects_succeeded,
        connects_failed: snapshot.connects_failed,
        writes_succeeded: snapshot.writes_succeeded,
        writes_failed: snapshot.writes_failed,
        streams_started: snapshot.streams_started,
        streams_stopped: snapshot.streams_stopped,
    })
}
