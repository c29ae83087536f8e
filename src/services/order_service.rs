use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::retry,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    dto::validate_payload,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem},
    response::ApiResponse,
    state::AppState,
};

const ORDER_STATUSES: [&str; 5] = ["pending", "paid", "shipped", "delivered", "cancelled"];
const PAYMENT_STATUSES: [&str; 3] = ["pending", "paid", "failed"];

#[derive(FromRow)]
struct SnapshotRow {
    product_id: Uuid,
    name: String,
    price: i64,
    quantity: i32,
}

fn compute_total(rows: &[SnapshotRow]) -> i64 {
    rows.iter().map(|r| r.price * r.quantity as i64).sum()
}

fn validate_order_status(status: &str) -> Result<(), AppError> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid order status".into()))
    }
}

fn validate_payment_status(status: &str) -> Result<(), AppError> {
    if PAYMENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid payment status".into()))
    }
}

/// Checkout. The order and its item snapshot are written in one transaction;
/// the cart is cleared after commit, best-effort. The order is the source of
/// truth, so a failed clear degrades to a stale cart, never a lost order.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_payload(&payload)?;

    let mut txn = state.pool.begin().await?;

    let rows: Vec<SnapshotRow> = sqlx::query_as(
        r#"
        SELECT ci.product_id, p.name, ci.price, ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&mut *txn)
    .await?;

    if rows.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    let total_amount = compute_total(&rows);

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders
            (id, user_id, total_amount, shipping_address, payment_method, status, payment_status)
        VALUES ($1, $2, $3, $4, $5, 'pending', 'pending')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(total_amount)
    .bind(sqlx::types::Json(&payload.shipping_address))
    .bind(&payload.payment_method)
    .fetch_one(&mut *txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(rows.len());
    for row in &rows {
        let item: OrderItem = sqlx::query_as(
            r#"
            INSERT INTO order_items (id, order_id, product_id, name, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(row.product_id)
        .bind(&row.name)
        .bind(row.price)
        .bind(row.quantity)
        .fetch_one(&mut *txn)
        .await?;
        items.push(item);
    }

    txn.commit().await?;

    // Best-effort cart clear with bounded retry. The order already committed,
    // so a persistent failure here only leaves stale cart rows behind.
    let pool = &state.pool;
    let user_id = user.user_id;
    let cleared = retry(3, || {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
    })
    .await;
    if let Err(err) = cleared {
        tracing::warn!(error = %err, order_id = %order.id, "cart clear after checkout failed");
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created successfully",
        OrderWithItems { order, items },
        None,
    ))
}

pub async fn list_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let items: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.user_id)
            .fetch_all(&state.pool)
            .await?;

    Ok(ApiResponse::success("OK", OrderList { items }, None))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".into())),
    };

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let items: Vec<OrderItem> =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at")
            .bind(order.id)
            .fetch_all(&state.pool)
            .await?;

    Ok(ApiResponse::success("OK", OrderWithItems { order, items }, None))
}

/// Administrative status override; no ownership check by design.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    validate_order_status(&payload.status)?;
    validate_payment_status(&payload.payment_status)?;

    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET status = $2, payment_status = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&payload.status)
    .bind(&payload.payment_status)
    .fetch_optional(&state.pool)
    .await?;

    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".into())),
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success("Order updated successfully", order, None))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".into())),
    };

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    if order.status != "pending" {
        return Err(AppError::Validation("Can only cancel pending orders".into()));
    }

    let order: Order = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'cancelled', updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(order.id)
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success("Order cancelled successfully", order, None))
}
