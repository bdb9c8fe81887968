//! Caller identity extraction.
//!
//! Authentication itself lives in the fronting layer; by the time a request
//! reaches this service the verified user ID arrives as the `X-User-Id`
//! header. Handlers that mutate anything take a [`CallerId`] argument;
//! public serving paths do not.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Header set by the fronting auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller's user ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub i64);

/// Rejection for requests without a usable caller identity.
#[derive(Debug)]
pub struct MissingCallerId;

impl IntoResponse for MissingCallerId {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "UNAUTHORIZED",
                "message": "Missing or invalid caller identity",
            })),
        )
            .into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = MissingCallerId;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(MissingCallerId)?;

        if user_id <= 0 {
            return Err(MissingCallerId);
        }

        Ok(CallerId(user_id))
    }
}
