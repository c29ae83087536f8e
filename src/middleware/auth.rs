use axum::{extract::FromRef, extract::FromRequestParts, http::header};
use jsonwebtoken::{Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, state::JwtKeys};

/// Identity resolved from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

/// Every verification failure maps to the same 401; callers cannot tell a
/// missing token from an expired or forged one.
pub fn decode_token(keys: &JwtKeys, token: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map_err(|_| AppError::Unauthenticated("Invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthenticated("Invalid or expired token".into()))?;

    Ok(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthenticated("No token provided".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthenticated("No token provided".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("No token provided".into()))?
            .trim();

        let keys = JwtKeys::from_ref(state);
        decode_token(&keys, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service::issue_token;

    #[test]
    fn token_round_trip_preserves_identity() {
        let keys = JwtKeys::new("test-secret");
        let user_id = Uuid::new_v4();
        let token = issue_token(&keys, user_id, "user").unwrap();

        let auth = decode_token(&keys, &token).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.role, "user");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = JwtKeys::new("test-secret");
        let other = JwtKeys::new("other-secret");
        let token = issue_token(&other, Uuid::new_v4(), "user").unwrap();

        let err = decode_token(&keys, &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let keys = JwtKeys::new("test-secret");
        let err = decode_token(&keys, "not-a-jwt").unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn admin_check_rejects_plain_users() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        };
        assert!(matches!(ensure_admin(&user), Err(AppError::Forbidden)));

        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: "admin".into(),
        };
        assert!(ensure_admin(&admin).is_ok());
    }
}
