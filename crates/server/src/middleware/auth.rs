use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request, State},
    http::{request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::{
    error::AppError,
    routes::auth::{Claims, SESSION_COOKIE},
    AppState,
};

/// Authenticated identity for the current request.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

// Bearer header first, then the session cookie, then `?token=` for sockets
fn find_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

pub fn decode_session(token: &str, secret: &str) -> Option<Session> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(Session {
        user_id: token_data.claims.sub.parse().ok()?,
        username: token_data.claims.username,
        is_admin: token_data.claims.is_admin,
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = find_token(request.headers(), request.uri()).ok_or(AppError::Unauthorized)?;
    let session =
        decode_session(&token, &state.config.jwt_secret).ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Layered inside `auth_middleware` on the admin router.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<Session>()
        .ok_or(AppError::Unauthorized)?;

    if !session.is_admin {
        tracing::warn!(username = %session.username, path = %request.uri().path(), "Admin access denied");
        return Err(AppError::Forbidden("Access denied.".to_string()));
    }

    Ok(next.run(request).await)
}

// Extractor for getting the session from request extensions
#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::create_token;
    use axum::http::header;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trips_into_session() {
        let token = create_token(7, "alice", true, SECRET, 1).unwrap();
        let session = decode_session(&token, SECRET).unwrap();
        assert_eq!(
            session,
            Session {
                user_id: 7,
                username: "alice".to_string(),
                is_admin: true,
            }
        );
        assert!(decode_session(&token, "other-secret").is_none());
    }

    #[test]
    fn token_is_found_in_header_cookie_or_query() {
        let uri: Uri = "/ws?token=from-query".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(find_token(&headers, &uri).as_deref(), Some("from-header"));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("{SESSION_COOKIE}=from-cookie").parse().unwrap(),
        );
        assert_eq!(find_token(&headers, &uri).as_deref(), Some("from-cookie"));

        assert_eq!(
            find_token(&HeaderMap::new(), &uri).as_deref(),
            Some("from-query")
        );
        assert_eq!(find_token(&HeaderMap::new(), &"/ws".parse().unwrap()), None);
    }
}
