//! Object-created notification webhook

use axum::{body::Bytes, extract::State, Json};
use tracing::info;

use super::error::ApiError;
use crate::domain::IngestEvent;
use crate::pipeline::InvocationResponse;
use crate::state::AppState;

/// POST /events
///
/// Runs one compliance check for the first record of the notification. A non-2xx reply tells
/// the delivering platform the invocation failed.
pub async fn handle_event(
    State(st): State<AppState>,
    body: Bytes,
) -> Result<Json<InvocationResponse>, ApiError> {
    let event = IngestEvent::from_json(&body)?;
    info!(bucket = %event.source_bucket, key = %event.object_key, "Processing File");

    let result = st.pipeline.run(event).await?;
    let response = result
        .into_response()
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(response))
}
