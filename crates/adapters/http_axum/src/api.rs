//! JSON API handlers.
//!
//! A single handler receives every request below the base path, resolves
//! the [`Endpoint`] and the class scope, then hands off to the handler
//! modules.

#[allow(clippy::missing_errors_doc)]
pub mod records;
#[allow(clippy::missing_errors_doc)]
pub mod system;
#[allow(clippy::missing_errors_doc)]
pub mod tasks;

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::Response;
use serde_json::Value;

use fog_app::ports::RecordRepository;
use fog_app::services::auth_service::Principal;
use fog_domain::catalog::{ClassSpec, Scope};
use fog_domain::error::ValidationError;
use fog_domain::record::Fields;

use crate::error::ApiError;
use crate::route::{self, Endpoint};
use crate::state::AppState;

/// Entry point for every authenticated API request.
pub async fn dispatch<R>(
    State(state): State<AppState<R>>,
    Extension(principal): Extension<Principal>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError>
where
    R: RecordRepository + Send + Sync + 'static,
{
    let Some(endpoint) = route::resolve(&method, uri.path()) else {
        tracing::debug!(%method, path = uri.path(), "no route");
        return Err(ApiError::Unimplemented);
    };
    if endpoint == Endpoint::Status {
        return Ok(system::status());
    }

    let body = parse_body(&body)?;
    let catalog = state.records.catalog().await;
    let class = |scope: Scope, token: &str| -> Result<&'static ClassSpec, ApiError> {
        catalog.resolve(scope, token).ok_or_else(|| {
            ApiError::Domain(ValidationError::UnknownClass(token.to_string()).into())
        })
    };

    match endpoint {
        Endpoint::Status => Ok(system::status()),
        Endpoint::Active { class: token } => {
            tasks::active(&state, class(Scope::Active, token)?, &body).await
        }
        Endpoint::Search { class: token, item } => {
            records::search(&state, class(Scope::Valid, token)?, &item).await
        }
        Endpoint::List { class: token } => {
            records::list(&state, class(Scope::Valid, token)?, &body).await
        }
        Endpoint::Get { class: token, id } => {
            records::get(&state, class(Scope::Valid, token)?, id).await
        }
        Endpoint::Update { class: token, id } => {
            records::edit(&state, class(Scope::Valid, token)?, id, &body).await
        }
        Endpoint::Task { class: token, id } => {
            tasks::task(&state, class(Scope::Tasking, token)?, id, &body, &principal).await
        }
        Endpoint::Create { class: token } => {
            records::create(&state, class(Scope::Valid, token)?, &body).await
        }
        Endpoint::Cancel { class: token, id } => {
            tasks::cancel(&state, class(Scope::Tasking, token)?, id, &body).await
        }
        Endpoint::Delete { class: token, id } => {
            records::delete(&state, class(Scope::Valid, token)?, id).await
        }
    }
}

/// Decode the request body; an empty body is an empty object.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedBody`] when the body is not a JSON object.
pub fn parse_body(raw: &[u8]) -> Result<Fields, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Fields::new());
    }
    let malformed = |reason: String| ApiError::Domain(ValidationError::MalformedBody(reason).into());
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(malformed("expected a JSON object".to_string())),
        Err(err) => Err(malformed(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fog_domain::error::FogError;

    #[test]
    fn should_treat_blank_body_as_empty_object() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b" \n").unwrap().is_empty());
    }

    #[test]
    fn should_parse_object_body() {
        let body = parse_body(br#"{"name": "pc", "imageID": 2}"#).unwrap();
        assert_eq!(body.get("name"), Some(&Value::from("pc")));
    }

    #[test]
    fn should_reject_non_object_body() {
        for raw in [&b"[1, 2]"[..], &b"{not json"[..]] {
            let err = parse_body(raw).unwrap_err();
            assert!(matches!(
                err,
                ApiError::Domain(FogError::Validation(ValidationError::MalformedBody(_)))
            ));
        }
    }
}
