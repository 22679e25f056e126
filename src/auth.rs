use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the learner id resolved by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated learner making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Learner(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Learner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
        raw.to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Learner)
            .ok_or_else(|| AppError::Unauthorized("Invalid user id".into()))
    }
}
