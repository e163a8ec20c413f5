//! Axum router assembly.

use axum::Router;
use axum::middleware;
use axum::routing::any;
use tower_http::trace::TraceLayer;

use fog_app::ports::RecordRepository;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Every path below the base path goes through the auth middleware and
/// then the API dispatcher. Includes a [`TraceLayer`] that logs each HTTP
/// request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build<R>(state: AppState<R>) -> Router
where
    R: RecordRepository + Send + Sync + 'static,
{
    let api = Router::new()
        .route("/", any(crate::api::dispatch::<R>))
        .route("/{*path}", any(crate::api::dispatch::<R>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth::<R>,
        ));

    let router = if state.base_path.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&state.base_path, api)
    };
    router.layer(TraceLayer::new_for_http()).with_state(state)
}
