use serde::{Deserialize, Serialize};
use sqlrelay_core::TrainingRecord;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrainingDataQuery {
    /// Day to read, `YYYYMMDD` (UTC). Defaults to today.
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingDataResponse {
    pub count: usize,
    pub date: String,
    pub data: Vec<TrainingRecord>,
}
