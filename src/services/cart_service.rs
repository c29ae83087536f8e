use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{
        AddToCartRequest, CartDto, CartLine, RemoveFromCartRequest, UpdateCartItemRequest,
    },
    dto::validate_payload,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::ApiResponse,
    state::AppState,
};

#[derive(FromRow)]
struct CartRow {
    product_id: Uuid,
    name: String,
    image: Option<String>,
    quantity: i32,
    price: i64,
    updated_at: DateTime<Utc>,
}

/// Assemble the user's cart from its rows. No rows is simply an empty cart,
/// so the lazily-created cart of the contract never errors.
async fn fetch_cart(state: &AppState, user_id: Uuid) -> AppResult<CartDto> {
    let rows: Vec<CartRow> = sqlx::query_as(
        r#"
        SELECT ci.product_id, p.name, p.image, ci.quantity, ci.price, ci.updated_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    let updated_at = rows.iter().map(|r| r.updated_at).max();
    let total = rows.iter().map(|r| r.price * r.quantity as i64).sum();
    let items = rows
        .into_iter()
        .map(|row| CartLine {
            product_id: row.product_id,
            name: row.name,
            image: row.image,
            quantity: row.quantity,
            price: row.price,
        })
        .collect();

    Ok(CartDto {
        user_id,
        items,
        total,
        updated_at,
    })
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let cart = fetch_cart(state, user.user_id).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartDto>> {
    validate_payload(&payload)?;

    let product: Option<(i64, i32)> = sqlx::query_as("SELECT price, stock FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;

    let (price, stock) = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".into())),
    };

    if payload.quantity > stock {
        return Err(AppError::Validation("Insufficient stock".into()));
    }

    // Atomic merge-by-product: a concurrent add from the same user increments
    // instead of racing a read-modify-write. The stored price is the snapshot
    // from the first add and is deliberately left untouched on conflict.
    sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity, price)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity,
                      updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(price)
    .execute(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = fetch_cart(state, user.user_id).await?;
    Ok(ApiResponse::success("Item added to cart", cart, None))
}

/// Removing an absent item is a no-op success.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    payload: RemoveFromCartRequest,
) -> AppResult<ApiResponse<CartDto>> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(payload.product_id)
        .execute(&state.pool)
        .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id }),
    )
    .await;

    let cart = fetch_cart(state, user.user_id).await?;
    Ok(ApiResponse::success("Item removed from cart", cart, None))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    let touched: Option<(Uuid,)> = if payload.quantity <= 0 {
        sqlx::query_as(
            "DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 RETURNING id",
        )
        .bind(user.user_id)
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            UPDATE cart_items SET quantity = $3, updated_at = now()
            WHERE user_id = $1 AND product_id = $2
            RETURNING id
            "#,
        )
        .bind(user.user_id)
        .bind(payload.product_id)
        .bind(payload.quantity)
        .fetch_optional(&state.pool)
        .await?
    };

    if touched.is_none() {
        return Err(AppError::NotFound("Item not found in cart".into()));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = fetch_cart(state, user.user_id).await?;
    Ok(ApiResponse::success("Cart updated", cart, None))
}

/// Unconditional delete; clearing an already-empty cart succeeds.
pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        "cart_items",
        serde_json::json!({}),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        None,
    ))
}
