use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;

const DEFAULT_ISSUER: &str = "access-hub";
const DEFAULT_EXP_HOURS: i64 = 24;

/// Signing settings read from `JWT_SECRET`, `JWT_ISSUER` and `JWT_EXP_HOURS`.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    secret: Arc<Vec<u8>>,
    issuer: String,
    exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: impl Into<String>, exp_hours: i64) -> Result<Self, AppError> {
        let secret = secret.into();
        if secret.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }
        if exp_hours <= 0 {
            return Err(AppError::configuration("JWT_EXP_HOURS must be positive"));
        }

        Ok(Self {
            secret: Arc::new(secret),
            issuer: issuer.into(),
            exp_hours,
        })
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());
        let exp_hours = match std::env::var("JWT_EXP_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?,
            Err(_) => DEFAULT_EXP_HOURS,
        };

        Self::new(secret, issuer, exp_hours)
    }

    pub fn encode(&self, user_id: Uuid) -> Result<String, AppError> {
        let issued_at = Utc::now();
        let claims = Claims {
            sub: user_id,
            iss: self.issuer.clone(),
            exp: (issued_at + Duration::hours(self.exp_hours)).timestamp() as usize,
            iat: issued_at.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Checks signature, expiry and issuer.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[self.issuer.as_str()]);

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
}

/// Bearer-token identity. Use [`crate::authz::Actor`] when roles are needed.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;
        let claims = state.jwt.decode(token)?;

        Ok(AuthUser { user_id: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(issuer: &str) -> JwtConfig {
        JwtConfig::new("unit-test-secret", issuer, 1).unwrap()
    }

    #[test]
    fn token_carries_subject() {
        let jwt = config(DEFAULT_ISSUER);
        let user_id = Uuid::new_v4();
        let token = jwt.encode(user_id).unwrap();

        assert_eq!(jwt.decode(&token).unwrap().sub, user_id);
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let token = config("someone-else").encode(Uuid::new_v4()).unwrap();
        assert!(matches!(config(DEFAULT_ISSUER).decode(&token), Err(AppError::Token(_))));
    }

    #[test]
    fn blank_secret_and_non_positive_expiry_are_refused() {
        assert!(JwtConfig::new("   ", DEFAULT_ISSUER, 1).is_err());
        assert!(JwtConfig::new("secret", DEFAULT_ISSUER, 0).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
