use std::collections::BTreeMap;
use std::sync::Arc;

use api_types::HealthResponse;
use api_types::InstanceMetricRecord;
use api_types::MetricsEnvelope;
use poem::handler;
use poem::http::header;
use poem::web::Data;
use poem::web::Json;
use poem::web::Path;
use poem::web::Query;
use poem::Response;
use serde::Deserialize;
use tracing::debug;

use super::csv::export_filename;
use super::csv::render_csv;
use super::interval::parse_time_interval;
use super::ApiError;
use crate::domain::metrics::ConnectionRegistry;
use crate::domain::metrics::MetricsQuery;
use crate::domain::metrics::TimeSource;

/// Query parameters of the per-instance endpoint
#[derive(Debug, Default, Deserialize)]
pub struct InstanceMetricsParams {
    #[serde(rename = "timeInterval")]
    pub time_interval: Option<String>,
}

/// Query parameters of the CSV export
#[derive(Debug, Default, Deserialize)]
pub struct CsvExportParams {
    pub instance_id: Option<String>,
}

/// Latest record of every instance
#[handler]
pub async fn get_all_metrics(
    query: Data<&MetricsQuery>,
    clock: Data<&Arc<dyn TimeSource>>,
) -> Json<MetricsEnvelope<BTreeMap<String, InstanceMetricRecord>>> {
    Json(MetricsEnvelope {
        latest: true,
        timestamp: clock.now(),
        metrics: query.latest_all(),
    })
}

/// Latest record of one instance, or its history over `timeInterval`
#[handler]
pub async fn get_instance_metrics(
    Path(instance_id): Path<String>,
    Query(params): Query<InstanceMetricsParams>,
    query: Data<&MetricsQuery>,
    clock: Data<&Arc<dyn TimeSource>>,
) -> poem::Result<Json<MetricsEnvelope<Vec<InstanceMetricRecord>>>> {
    let now = clock.now();

    // An empty interval reads as no interval
    if let Some(interval) = params.time_interval.filter(|value| !value.is_empty()) {
        let lookback = parse_time_interval(&interval)?;
        let metrics = query.range(&instance_id, now - lookback, now);
        debug!(
            instance_id = %instance_id,
            interval = %interval,
            records = metrics.len(),
            "Serving instance history"
        );
        return Ok(Json(MetricsEnvelope {
            latest: false,
            timestamp: now,
            metrics,
        }));
    }

    let record = query
        .latest_one(&instance_id)
        .ok_or(ApiError::InstanceNotFound { instance_id })?;
    Ok(Json(MetricsEnvelope {
        latest: true,
        timestamp: now,
        metrics: vec![record],
    }))
}

/// Latest record of one instance as a downloadable CSV file
#[handler]
pub async fn export_csv(
    Query(params): Query<CsvExportParams>,
    query: Data<&MetricsQuery>,
) -> poem::Result<Response> {
    let instance_id = params
        .instance_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::MissingParameter {
            name: "instance_id".to_string(),
        })?;
    let record = query
        .latest_one(&instance_id)
        .ok_or_else(|| ApiError::InstanceNotFound {
            instance_id: instance_id.clone(),
        })?;

    Ok(Response::builder()
        .content_type("text/csv")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", export_filename(&instance_id)),
        )
        .body(render_csv(&record)))
}

#[handler]
pub async fn health(registry: Data<&Arc<ConnectionRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: registry.open_count(),
    })
}
