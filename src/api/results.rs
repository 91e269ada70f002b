use axum::{
    extract::{Path, State},
    Json,
};

use super::error::ApiError;
use crate::repo::StoredRecord;
use crate::state::AppState;

/// GET /api/v1/results/*grid_id - latest verdict for a grid model
pub async fn get_result(
    State(st): State<AppState>,
    Path(grid_id): Path<String>,
) -> Result<Json<StoredRecord>, ApiError> {
    st.pipeline
        .store()
        .get(&grid_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(grid_id))
}
