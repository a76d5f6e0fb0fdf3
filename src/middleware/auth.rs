use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{config::AdminConfig, error::AppError, services::auth_service, state::AppState};

/// Cookie carrying the admin session token for browser use.
pub const SESSION_COOKIE: &str = "admin_session";

/// An authenticated operator. Any failure to authenticate rejects as 404 so
/// the admin surface is indistinguishable from a missing page.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

impl AdminSession {
    pub fn from_headers(headers: &HeaderMap, admin: &AdminConfig) -> Option<Self> {
        if !host_allowed(headers, admin) {
            return None;
        }
        let token = bearer_token(headers)
            .map(str::to_string)
            .or_else(|| cookie_token(headers))?;
        let claims = auth_service::verify_token(admin, &token)?;
        Some(AdminSession {
            username: claims.sub,
        })
    }
}

/// True when no admin host is pinned or the request's Host matches it, port ignored.
pub fn host_allowed(headers: &HeaderMap, admin: &AdminConfig) -> bool {
    let Some(expected) = &admin.host else {
        return true;
    };
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|host| host.split(':').next())
        .is_some_and(|host| host.eq_ignore_ascii_case(expected))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        AdminSession::from_headers(&parts.headers, &state.config.admin).ok_or_else(|| {
            tracing::debug!(uri = %parts.uri, "admin request rejected");
            AppError::NotFound
        })
    }
}
