//! Caller identity from a signed session token.
//!
//! The token is an HS256 JWT carrying `userId`, read from the session cookie
//! or an `Authorization: Bearer` header. A valid signature is not enough: the
//! user must still exist.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::AppState;
use crate::types::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub exp: usize,
}

/// Authenticated, existing caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Sign a session token for `user_id`, valid for `ttl_secs`.
pub fn issue_token(user_id: Uuid, config: &AuthConfig, ttl_secs: u64) -> AppResult<String> {
    let exp = chrono::Utc::now().timestamp() as usize + ttl_secs as usize;
    let claims = Claims { user_id: user_id.to_string(), exp };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

fn token_from_headers<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value);

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    })
}

/// Verify the request's token and return the caller id it names.
pub fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> AppResult<Uuid> {
    let token = token_from_headers(headers, &config.cookie_name)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth("User not authenticated".to_string()))?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        debug!(error = %e, "Rejected session token");
        AppError::Auth("Invalid token".to_string())
    })?;

    data.claims
        .user_id
        .parse()
        .map_err(|_| AppError::Auth("Invalid token subject".to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = authenticate(&parts.headers, &state.config.auth)?;

        if !state.jobs.user_exists(id).await? {
            return Err(AppError::Auth("User no longer exists".to_string()));
        }

        Ok(AuthUser { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".to_string(),
            cookie_name: "token".to_string(),
        }
    }

    #[test]
    fn test_token_from_cookie() {
        let user = Uuid::new_v4();
        let token = issue_token(user, &auth_config(), 3600).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; token={}", token)).unwrap(),
        );
        assert_eq!(authenticate(&headers, &auth_config()).unwrap(), user);
    }

    #[test]
    fn test_token_from_bearer_header() {
        let user = Uuid::new_v4();
        let token = issue_token(user, &auth_config(), 3600).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert_eq!(authenticate(&headers, &auth_config()).unwrap(), user);
    }

    #[test]
    fn test_missing_token_is_rejected() {
        assert!(matches!(
            authenticate(&HeaderMap::new(), &auth_config()),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let other = AuthConfig { secret: "other".to_string(), ..auth_config() };
        let token = issue_token(Uuid::new_v4(), &other, 3600).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert!(matches!(authenticate(&headers, &auth_config()), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_non_uuid_subject_is_rejected() {
        let claims = Claims {
            user_id: "65f1c0ffee".to_string(),
            exp: chrono::Utc::now().timestamp() as usize + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&format!("token={}", token)).unwrap());
        assert!(matches!(authenticate(&headers, &auth_config()), Err(AppError::Auth(_))));
    }
}
