// ============================================================================
// Axum Extractors
// ============================================================================
//
// - TrustedUser: caller identity from the `x-user-id` header set by the
//   upstream identity provider. The header is trusted as-is.
//
// ============================================================================

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the caller's user id
///
/// Usage:
/// ```rust,ignore
/// async fn handler(user: TrustedUser, ...) -> Result<...> {
///     let user_id = user.0;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TrustedUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for TrustedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER))
                    .into_response()
            })?;

        Ok(TrustedUser(user_id.to_string()))
    }
}
