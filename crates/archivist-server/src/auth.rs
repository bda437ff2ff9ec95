//! Access control for `/api/*`.
//!
//! A request is let through when it carries a configured API token, or when
//! the session front end vouches for a user who is an admin or an allowed
//! user. Everything else is a 403.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::visibility::VisibilityStore;

/// Identity header set by the trusted session front end.
pub const USER_HEADER: &str = "x-archivist-user";

/// Who passed the access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Token,
    User(String),
}

pub async fn require_access(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = authorize(req.headers(), &state.config, &state.visibility)?;
    match &caller {
        Caller::Token => debug!(path = %req.uri().path(), "api access by token"),
        Caller::User(id) => debug!(user = %id, path = %req.uri().path(), "api access by user"),
    }
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

pub fn authorize(
    headers: &HeaderMap,
    config: &ServerConfig,
    visibility: &VisibilityStore,
) -> Result<Caller, ApiError> {
    if let Some(token) = bearer_token(headers) {
        return if token_matches(token, &config.api_tokens) {
            Ok(Caller::Token)
        } else {
            Err(ApiError::Forbidden)
        };
    }

    let user = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match user {
        Some(id) if config.admins.contains(id) || visibility.is_allowed_user(id) => {
            Ok(Caller::User(id.to_string()))
        }
        Some(_) => Err(ApiError::Forbidden),
        None => Err(ApiError::Unauthenticated),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Compares against every configured token so timing does not reveal which
/// one matched.
fn token_matches(token: &str, expected: &[String]) -> bool {
    let token = token.as_bytes();
    expected
        .iter()
        .fold(0u8, |hit, candidate| {
            hit | token.ct_eq(candidate.as_bytes()).unwrap_u8()
        })
        == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::test_support::store_in;
    use crate::visibility::ForbiddenList;
    use axum::http::HeaderValue;

    fn config() -> ServerConfig {
        ServerConfig {
            admins: ["1".to_string()].into_iter().collect(),
            api_tokens: vec!["alpha".into(), "beta".into()],
            ..ServerConfig::default()
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn token_comparison() {
        let tokens = vec!["alpha".to_string(), "beta".to_string()];
        assert!(token_matches("beta", &tokens));
        assert!(!token_matches("bet", &tokens));
        assert!(!token_matches("alpha2", &tokens));
        assert!(!token_matches("alpha", &[]));
    }

    #[tokio::test]
    async fn decision_order() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = store_in(dir.path(), ForbiddenList::default());
        visibility.allow_users(&["2".to_string()]);
        let config = config();

        let check = |pairs: &[(&'static str, &'static str)]| {
            authorize(&headers(pairs), &config, &visibility)
        };

        assert_eq!(
            check(&[("authorization", "Bearer beta")]).unwrap(),
            Caller::Token
        );
        assert_eq!(
            check(&[(USER_HEADER, "1")]).unwrap(),
            Caller::User("1".into())
        );
        assert_eq!(
            check(&[(USER_HEADER, "2")]).unwrap(),
            Caller::User("2".into())
        );
        assert!(matches!(
            check(&[(USER_HEADER, "3")]),
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            check(&[("authorization", "Bearer nope"), (USER_HEADER, "1")]),
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(check(&[]), Err(ApiError::Unauthenticated)));
    }
}
