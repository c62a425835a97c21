use axum::extract::State;
use axum::Json;
use tap_core::config::ProviderDescription;

use crate::state::AppState;

/// GET /: provider self-description. Public; no caller identity required.
pub async fn describe(State(app): State<AppState>) -> Json<ProviderDescription> {
    Json(app.provider.as_ref().clone())
}
