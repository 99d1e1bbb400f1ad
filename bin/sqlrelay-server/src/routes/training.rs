//! Training-data retrieval (`GET /get-training-data`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use sqlrelay_core::training::{format_date, parse_date, today};
use sqlrelay_core::TrainingRecord;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::models::training::{TrainingDataQuery, TrainingDataResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_training_data),
    components(schemas(TrainingDataResponse, TrainingRecord))
)]
pub struct TrainingApi;

/// Register training-data routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/get-training-data", get(get_training_data))
}

/// Records logged on one UTC day.
#[utoipa::path(
    get,
    path = "/get-training-data",
    tag = "training",
    params(TrainingDataQuery),
    responses(
        (status = 200, description = "Records for the day", body = TrainingDataResponse),
        (status = 400, description = "Date is not YYYYMMDD"),
        (status = 404, description = "No data for the date"),
    )
)]
pub async fn get_training_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrainingDataQuery>,
) -> Result<Json<TrainingDataResponse>, ServerError> {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };

    let data = state.training().read(date).await?;
    Ok(Json(TrainingDataResponse {
        count: data.len(),
        date: format_date(date),
        data,
    }))
}
