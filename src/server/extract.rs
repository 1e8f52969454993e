//! Request extractors that reject with [`AppError`] JSON bodies.

use crate::db::User;
use crate::error::AppError;
use crate::server::AppState;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

/// Value of the `Authorization` header with an optional `Bearer ` prefix removed.
pub fn authorization_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    (!token.is_empty()).then(|| token.to_string())
}

/// The signed-in user behind the request's session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Session owner.
    pub user: User,
    /// Session token the request carried.
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = match authorization_token(&parts.headers) {
            None => Err(AppError::KeyError),
            Some(token) => match state.auth.validate_token(&token) {
                Ok(Some(user)) => Ok(AuthUser { user, token }),
                Ok(None) => Err(AppError::InvalidAccessToken),
                Err(e) => Err(e),
            },
        };

        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_authorization_token_forms() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorization_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(authorization_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(authorization_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(authorization_token(&headers), None);
    }
}
