//! Handlers for tasking, active task listing and cancellation.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use fog_app::ports::RecordRepository;
use fog_app::services::auth_service::Principal;
use fog_domain::catalog::ClassSpec;
use fog_domain::id::RecordId;
use fog_domain::record::Fields;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /{class}/{id}/task`
pub async fn task<R>(
    state: &AppState<R>,
    spec: &ClassSpec,
    id: RecordId,
    body: &Fields,
    principal: &Principal,
) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.tasking.task(spec, id, body, &principal.user).await?;
    Ok(Json(data).into_response())
}

/// `GET /{class}/active`, `/{class}/current`
pub async fn active<R>(state: &AppState<R>, spec: &ClassSpec, body: &Fields) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.tasking.active(spec, body).await?;
    Ok(Json(data).into_response())
}

/// `DELETE /{class}/cancel`, `/{class}/{id}/cancel`
pub async fn cancel<R>(
    state: &AppState<R>,
    spec: &ClassSpec,
    id: Option<RecordId>,
    body: &Fields,
) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    state.tasking.cancel(spec, id, body).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
