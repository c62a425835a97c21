pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with the provider routes mounted under `url_prefix`.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState, url_prefix: &str) -> Router {
    let api = Router::new()
        .route("/", get(routes::provider::describe))
        .route("/run", post(routes::actions::run_action))
        .route("/{action_id}/status", get(routes::actions::action_status))
        .route("/{action_id}/cancel", post(routes::actions::cancel_action))
        .route("/{action_id}/release", post(routes::actions::release_action))
        .with_state(app_state);

    let prefix = url_prefix.trim_end_matches('/');
    let router = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(prefix, api)
    };
    router.layer(TraceLayer::new_for_http())
}

/// Start the provider on `0.0.0.0:port`.
pub async fn serve(app_state: AppState, url_prefix: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, url_prefix, listener).await
}

/// Start the provider on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    url_prefix: &str,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state, url_prefix);

    tracing::info!("action provider listening on http://localhost:{actual_port}{url_prefix}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
