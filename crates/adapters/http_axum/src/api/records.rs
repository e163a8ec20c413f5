//! Handlers for the generic record operations.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use fog_app::ports::RecordRepository;
use fog_domain::catalog::ClassSpec;
use fog_domain::id::RecordId;
use fog_domain::record::Fields;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /{class}`, `/{class}/list`, `/{class}/all`
pub async fn list<R>(state: &AppState<R>, spec: &ClassSpec, body: &Fields) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.records.list(spec, body).await?;
    Ok(Json(data).into_response())
}

/// `GET /{class}/search/{item}`
pub async fn search<R>(state: &AppState<R>, spec: &ClassSpec, item: &str) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.records.search(spec, item).await?;
    Ok(Json(data).into_response())
}

/// `GET /{class}/{id}`
pub async fn get<R>(state: &AppState<R>, spec: &ClassSpec, id: RecordId) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.records.get(spec, id).await?;
    Ok(Json(data).into_response())
}

/// `POST /{class}`, `/{class}/create`, `/{class}/new`
pub async fn create<R>(state: &AppState<R>, spec: &ClassSpec, body: &Fields) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.records.create(spec, body).await?;
    Ok(Json(data).into_response())
}

/// `PUT /{class}/{id}`, `/{class}/{id}/update`, `/{class}/{id}/edit`
pub async fn edit<R>(
    state: &AppState<R>,
    spec: &ClassSpec,
    id: RecordId,
    body: &Fields,
) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let data = state.records.edit(spec, id, body).await?;
    Ok(Json(data).into_response())
}

/// `DELETE /{class}/{id}`, `/{class}/{id}/delete`, `/{class}/{id}/remove`
pub async fn delete<R>(state: &AppState<R>, spec: &ClassSpec, id: RecordId) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    state.records.delete(spec, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
