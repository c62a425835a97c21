use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tap_core::{ActionError, ActionRecord, ActionRequest, ActionService, Caller};

use crate::error::AppError;
use crate::identity::AuthenticatedCaller;
use crate::state::AppState;

/// Run a synchronous engine call off the async runtime.
async fn blocking<F>(app: &AppState, f: F) -> Result<ActionRecord, AppError>
where
    F: FnOnce(&ActionService) -> tap_core::Result<ActionRecord> + Send + 'static,
{
    let service = app.service.clone();
    let record = tokio::task::spawn_blocking(move || f(service.as_ref()))
        .await
        .map_err(AppError::join)??;
    Ok(record)
}

/// POST /run: start an action, or return the one already started for this
/// request id.
pub async fn run_action(
    State(app): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActionRecord>), AppError> {
    let Json(request) = payload.map_err(|e| ActionError::InvalidRequest(e.body_text()))?;
    let record = blocking(&app, move |svc| svc.run(&request, &caller)).await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// GET /:action_id/status
pub async fn action_status(
    State(app): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(action_id): Path<String>,
) -> Result<Json<ActionRecord>, AppError> {
    with_action(app, caller, action_id, ActionService::status).await
}

/// POST /:action_id/cancel
pub async fn cancel_action(
    State(app): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(action_id): Path<String>,
) -> Result<Json<ActionRecord>, AppError> {
    with_action(app, caller, action_id, ActionService::cancel).await
}

/// POST /:action_id/release
pub async fn release_action(
    State(app): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(action_id): Path<String>,
) -> Result<Json<ActionRecord>, AppError> {
    with_action(app, caller, action_id, ActionService::release).await
}

type ActionOp = fn(&ActionService, &str, &Caller) -> tap_core::Result<ActionRecord>;

async fn with_action(
    app: AppState,
    caller: Caller,
    action_id: String,
    op: ActionOp,
) -> Result<Json<ActionRecord>, AppError> {
    let record = blocking(&app, move |svc| op(svc, &action_id, &caller)).await?;
    Ok(Json(record))
}
