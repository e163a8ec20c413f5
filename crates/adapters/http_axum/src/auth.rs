//! Authentication middleware.
//!
//! Every API request must carry the base64 encoded system token in the
//! `fog-api-token` header, plus either HTTP Basic credentials or a base64
//! encoded personal token in `fog-user-token`. While the API is disabled
//! callers are redirected to the management UI instead.

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use fog_app::ports::RecordRepository;
use fog_app::services::auth_service::Credentials;

use crate::error::ApiError;
use crate::state::AppState;

pub const API_TOKEN_HEADER: &str = "fog-api-token";
pub const USER_TOKEN_HEADER: &str = "fog-user-token";

/// Reject unauthenticated requests; on success the
/// [`Principal`](fog_app::services::auth_service::Principal) is added to
/// the request extensions.
pub async fn require_auth<R>(
    State(state): State<AppState<R>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    if !state.auth.api_enabled().await? {
        let location = format!("{}/management/index.php", state.base_path);
        tracing::debug!(%location, "api disabled, redirecting");
        return Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response());
    }

    let credentials = credentials(request.headers());
    let principal = state.auth.authenticate(&credentials).await.inspect_err(|err| {
        tracing::debug!(error = %err, path = %request.uri().path(), "authentication failed");
    })?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Decode whatever credentials the request carries.
#[must_use]
pub fn credentials(headers: &HeaderMap) -> Credentials {
    Credentials {
        api_token: decoded_header(headers, API_TOKEN_HEADER),
        basic: basic_credentials(headers),
        user_token: decoded_header(headers, USER_TOKEN_HEADER),
    }
}

fn decode(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

fn decoded_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().and_then(decode)
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = decode(encoded)?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
