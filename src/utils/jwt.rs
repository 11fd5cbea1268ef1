// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// JWT Claims issued by the platform's auth service.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// User's role (e.g., 'student', 'editor', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// The authenticated student's id.
    pub fn student_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Token subject is not a user id".to_string()))
    }

    pub fn can_edit_quizzes(&self) -> bool {
        matches!(self.role.as_str(), "editor" | "admin")
    }
}

/// Signs a token. Tokens are normally minted by the auth service; this is
/// used by tooling and tests.
pub fn sign_jwt(
    id: i64,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects `Claims`
/// into the request extensions. Otherwise returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Editor Authorization.
///
/// Must run after `auth_middleware`. Only 'editor' and 'admin' pass.
pub async fn editor_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.can_edit_quizzes() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let token = sign_jwt(17, "student", "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.student_id().unwrap(), 17);
        assert!(!claims.can_edit_quizzes());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = sign_jwt(17, "editor", "secret", 60).unwrap();
        assert!(matches!(verify_jwt(&token, "other"), Err(AppError::AuthError(_))));
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims {
            sub: "abc".into(),
            role: "admin".into(),
            exp: 0,
        };
        assert!(claims.student_id().is_err());
        assert!(claims.can_edit_quizzes());
    }
}
