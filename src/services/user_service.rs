use crate::{
    audit,
    dto::users::{UpdateProfileRequest, UserList, UserProfile},
    dto::validate_payload,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::User,
    response::ApiResponse,
    state::AppState,
};

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserProfile>> {
    let found: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;

    match found {
        Some(u) => Ok(ApiResponse::success("OK", UserProfile::from(u), None)),
        None => Err(AppError::NotFound("User not found".into())),
    }
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    validate_payload(&payload)?;

    let updated: Option<User> = sqlx::query_as(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            address = COALESCE($4, address),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.name)
    .bind(payload.phone)
    .bind(payload.address.map(sqlx::types::Json))
    .fetch_optional(&state.pool)
    .await?;

    let updated = match updated {
        Some(u) => u,
        None => return Err(AppError::NotFound("User not found".into())),
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Profile updated successfully",
        UserProfile::from(updated),
        None,
    ))
}

/// Admin listing of all accounts, hashes excluded.
pub async fn list_users(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.pool)
        .await?;

    let items = users.into_iter().map(UserProfile::from).collect();
    Ok(ApiResponse::success("OK", UserList { items }, None))
}
