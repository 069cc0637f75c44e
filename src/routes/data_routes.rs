use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::state::app_state::AppState;
use crate::state::disk::valid_device_name;
use decay_core::core::constants::{TIME_DIFFERENCES_FILE_NAME, TIME_DIFFERENCES_INV_FILE_NAME};
use decay_core::core::export::{alignment_to_csv, features_to_csv};
use decay_core::{
    align, annotate, derive, Annotation, DecayError, FeatureSeries, MarkerSet, Metric, SeriesStore,
};

#[derive(Serialize)]
pub struct DeviceList {
    pub devices: Vec<String>,
}

/// Marker arrays per metric for POST /devices/{device}/events
#[derive(Deserialize, Debug)]
pub struct EventsRequest {
    pub markers: HashMap<Metric, MarkerSet>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub features: FeatureSeries,
    pub annotations: HashMap<Metric, Annotation>,
}

#[derive(Deserialize, Debug)]
pub struct AlignRequest {
    pub baseline: String,
    pub observed: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}


/// =======================
/// ROUTER
/// =======================

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/{device}/upload", post(upload))
        .route("/devices/{device}/features", get(features))
        .route("/devices/{device}/features.csv", get(features_csv))
        .route("/devices/{device}/events", post(events))
        .route("/align", post(align_devices))
        .with_state(state)
}

fn error_response(e: DecayError) -> Response {
    let status = if e.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error!("Request failed ({}): {}", status, e);
    (status, Json(ErrorBody { error: e.to_string() })).into_response()
}

fn bad_device(device: &str) -> Response {
    error!("Invalid device name: {:?}", device);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: format!("invalid device name {device:?}"),
        }),
    )
        .into_response()
}

fn unknown_device(device: &str) -> Response {
    error!("Device not found: {}", device);
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("device not found: {device}"),
        }),
    )
        .into_response()
}

/// Load a stored series, mapping an empty one to 404.
fn load_series(state: &AppState, device: &str) -> Result<decay_core::CanonicalSeries, Response> {
    if !valid_device_name(device) {
        return Err(bad_device(device));
    }
    match state.store.load(device) {
        Ok(series) if series.is_empty() => Err(unknown_device(device)),
        Ok(series) => Ok(series),
        Err(e) => Err(error_response(e)),
    }
}


/// =======================
/// HANDLERS
/// =======================

async fn list_devices(State(state): State<AppState>) -> Response {
    match state.store.devices() {
        Ok(devices) => Json(DeviceList { devices }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn upload(
    State(state): State<AppState>,
    Path(device): Path<String>,
    body: Bytes,
) -> Response {
    if !valid_device_name(&device) {
        return bad_device(&device);
    }
    debug!("Upload for {}: {} bytes", device, body.len());

    let ingestor = state.ingestor.clone();
    let target = device.clone();
    match tokio::task::spawn_blocking(move || ingestor.ingest(&target, &body)).await {
        Ok(Ok(receipt)) => Json(receipt).into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => {
            error!("Ingest task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn features(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> Response {
    match load_series(&state, &device) {
        Ok(series) => Json(derive(&series)).into_response(),
        Err(response) => response,
    }
}

async fn features_csv(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> Response {
    let series = match load_series(&state, &device) {
        Ok(series) => series,
        Err(response) => return response,
    };
    match features_to_csv(&derive(&series)) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "text/csv")], bytes).into_response(),
        Err(e) => error_response(e),
    }
}

async fn events(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Json(request): Json<EventsRequest>,
) -> Response {
    let series = match load_series(&state, &device) {
        Ok(series) => series,
        Err(response) => return response,
    };

    let features = derive(&series);
    let annotations = request
        .markers
        .iter()
        .map(|(metric, markers)| (*metric, annotate(&features, markers)))
        .collect();

    Json(EventsResponse {
        features,
        annotations,
    })
    .into_response()
}

async fn align_devices(
    State(state): State<AppState>,
    Json(request): Json<AlignRequest>,
) -> Response {
    let baseline = match load_series(&state, &request.baseline) {
        Ok(series) => series,
        Err(response) => return response,
    };
    let observed = match load_series(&state, &request.observed) {
        Ok(series) => series,
        Err(response) => return response,
    };

    let result = match align(&baseline, &observed) {
        Ok(result) => result,
        Err(e) => return error_response(e),
    };

    let (direct, inverse) = match alignment_to_csv(&result) {
        Ok(tables) => tables,
        Err(e) => return error_response(e),
    };
    let dir = match state.store.device_dir(&request.observed) {
        Ok(dir) => dir,
        Err(e) => return error_response(e),
    };
    let written = async {
        tokio::fs::write(dir.join(TIME_DIFFERENCES_FILE_NAME), direct).await?;
        tokio::fs::write(dir.join(TIME_DIFFERENCES_INV_FILE_NAME), inverse).await
    }
    .await;
    if let Err(e) = written {
        return error_response(DecayError::Io(e));
    }

    info!("Aligned {} against baseline {}", request.observed, request.baseline);
    Json(result).into_response()
}
