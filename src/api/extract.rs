//! Request helpers shared by the endpoint handlers.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::error::ApiError;

/// JSON body whose rejections use the API error shape instead of axum's
/// plain-text responses.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("invalid JSON body: {}", rejection.body_text()))
}

/// Parse an id from a path or query value; malformed ids are a 400.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("invalid {what} id")))
}

/// Value of a required text field, trimmed; missing or blank is a 400.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

/// Run blocking work (LLM calls, mail, password hashing) off the async runtime.
pub async fn run_blocking<F, T>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "course").unwrap(), id);
        assert!(matches!(parse_id("nope", "course"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some(" x ".into()), "name").unwrap(), "x");
        assert!(required(Some("  ".into()), "name").is_err());
        assert!(required(None, "name").is_err());
    }

    #[tokio::test]
    async fn run_blocking_returns_value() {
        assert_eq!(run_blocking(|| 2 + 2).await.unwrap(), 4);
    }
}
