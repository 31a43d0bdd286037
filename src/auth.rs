// auth.rs
//! Identity is established upstream; these extractors only read what the
//! authentication layer put on the request.
use axum::{
    extract::FromRequestParts,
    response::{IntoResponse, Response},
};
use http::{header::AUTHORIZATION, request::Parts};
use tracing::warn;

use crate::error::AppError;
use crate::handlers::found;
use crate::models::UserId;
use crate::state::AppState;

/// The authenticated user. Anonymous requests are redirected to the login
/// page with the original path in `next`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(&state.config.user_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user {
            Some(id) => Ok(CurrentUser(UserId::new(id))),
            None => {
                let next = urlencoding::encode(parts.uri.path());
                let location = format!("{}?next={}", state.config.login_url, next);
                Err(found(&location).into_response())
            }
        }
    }
}

/// Bearer-token guard for the admin API.
#[derive(Debug)]
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err(AppError::NotFound);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if presented.is_some_and(|token| timing_safe_eq(token, expected)) {
            Ok(AdminAuth)
        } else {
            warn!(path = %parts.uri.path(), "rejected admin request");
            Err(AppError::Unauthorized)
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut out = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        out |= x ^ y;
    }
    out == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_safe_eq_matches_only_identical_tokens() {
        assert!(timing_safe_eq("let-me-in", "let-me-in"));
        assert!(!timing_safe_eq("let-me-in", "let-me-im"));
        assert!(!timing_safe_eq("let-me-in", "let-me"));
        assert!(!timing_safe_eq("", "x"));
    }
}
