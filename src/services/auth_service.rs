use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Header, encode};
use uuid::Uuid;

use password_hash::rand_core::OsRng;

use crate::{
    audit,
    dto::auth::{AuthData, Claims, LoginRequest, RegisterRequest},
    dto::users::UserProfile,
    dto::validate_payload,
    error::{AppError, AppResult},
    models::User,
    response::ApiResponse,
    state::{AppState, JwtKeys},
};

const TOKEN_TTL_DAYS: i64 = 7;

pub fn issue_token(keys: &JwtKeys, user_id: Uuid, role: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(TOKEN_TTL_DAYS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// Password policy: at least 8 characters, with a letter and a digit, and
/// the confirmation must match.
fn check_password_rules(password: &str, confirm: &str) -> Result<(), AppError> {
    let mut messages: Vec<String> = Vec::new();
    if password.chars().count() < 8 {
        messages.push("Password must be at least 8 characters long".into());
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        messages.push("Password must include letters and numbers".into());
    }
    if password != confirm {
        messages.push("Passwords do not match".into());
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(messages.join(", ")))
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string())
}

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthData>> {
    validate_payload(&payload)?;
    check_password_rules(&payload.password, &payload.confirm_password)?;

    let email = payload.email.trim().to_lowercase();

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Validation("Email is already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name.trim())
    .bind(email.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await?;

    let token = issue_token(&state.jwt, user.id, &user.role)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let data = AuthData {
        token,
        user: UserProfile::from(user),
    };
    Ok(ApiResponse::success("User registered successfully", data, None))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<AuthData>> {
    validate_payload(&payload)?;

    let email = payload.email.trim().to_lowercase();

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    // Unknown email and wrong password get the same answer so the endpoint
    // cannot be used to enumerate accounts.
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Validation("Invalid credentials".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Validation("Invalid credentials".into()));
    }

    let token = issue_token(&state.jwt, user.id, &user.role)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let data = AuthData {
        token,
        user: UserProfile::from(user),
    };
    Ok(ApiResponse::success("Login successful", data, None))
}

pub async fn profile(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<UserProfile>> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound("User not found".into())),
    };

    Ok(ApiResponse::success("OK", UserProfile::from(user), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_strong_matching_password() {
        assert!(check_password_rules("Passw0rd1", "Passw0rd1").is_ok());
    }

    #[test]
    fn rejects_short_password() {
        let err = check_password_rules("P4ss", "P4ss").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));
    }

    #[test]
    fn rejects_password_without_digit() {
        let err = check_password_rules("Passwords", "Passwords").unwrap_err();
        assert!(err.to_string().contains("letters and numbers"));
    }

    #[test]
    fn rejects_password_without_letter() {
        let err = check_password_rules("12345678", "12345678").unwrap_err();
        assert!(err.to_string().contains("letters and numbers"));
    }

    #[test]
    fn rejects_mismatched_confirmation() {
        let err = check_password_rules("Passw0rd1", "Passw0rd2").unwrap_err();
        assert!(err.to_string().contains("Passwords do not match"));
    }

    #[test]
    fn joins_multiple_failures_into_one_message() {
        let err = check_password_rules("abc", "abcd").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("at least 8 characters"));
        assert!(msg.contains("letters and numbers"));
        assert!(msg.contains("Passwords do not match"));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Passw0rd1").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"Passw0rd1", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong", &parsed)
                .is_err()
        );
    }
}
