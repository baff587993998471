//! Extractors whose rejections are reported through [`AppError`], so malformed
//! bodies and path segments produce the same error envelope as handler
//! failures.

use axum::extract::{FromRequest, FromRequestParts};
use serde::de::DeserializeOwned;

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct ApiForm<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Parses a JSON body that clients may omit entirely.
pub fn optional_json<T>(body: &[u8]) -> AppResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::UnprocessableEntity(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Body {
        name: Option<String>,
    }

    #[test]
    fn test_empty_body_yields_default() {
        let parsed: Body = optional_json(b"").unwrap();
        assert_eq!(parsed, Body::default());
        let parsed: Body = optional_json(b"  \n").unwrap();
        assert_eq!(parsed, Body::default());
    }

    #[test]
    fn test_malformed_body_is_unprocessable() {
        let result: AppResult<Body> = optional_json(b"{not json");
        assert!(matches!(result, Err(AppError::UnprocessableEntity(_))));
    }

    #[test]
    fn test_body_is_parsed() {
        let parsed: Body = optional_json(br#"{"name":"Lin"}"#).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Lin"));
    }
}
