use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    dto::validate_payload,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// Append the WHERE clause shared by the listing and its count query.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min_price) = query.min_price {
        qb.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        qb.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.normalize();

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE TRUE");
    push_filters(&mut count_qb, &query);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.pool)
        .await?;

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM products WHERE TRUE");
    push_filters(&mut qb, &query);
    // Secondary sort on id keeps the ordering stable within one call.
    qb.push(format!(
        " ORDER BY {} {}, id DESC",
        sort_by.as_sql(),
        sort_order.as_sql()
    ));
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let items: Vec<Product> = qb.build_query_as().fetch_all(&state.pool).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    match product {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound("Product not found".into())),
    }
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_payload(&payload)?;

    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products
            (id, name, brand, description, price, original_price, image,
             rating, stock, category, is_best_seller, discount)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name)
    .bind(payload.brand)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.original_price)
    .bind(payload.image)
    .bind(payload.rating)
    .bind(payload.stock)
    .bind(payload.category)
    .bind(payload.is_best_seller)
    .bind(payload.discount)
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success("Product created successfully", product, None))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_payload(&payload)?;

    let product: Option<Product> = sqlx::query_as(
        r#"
        UPDATE products SET
            name = COALESCE($2, name),
            brand = COALESCE($3, brand),
            description = COALESCE($4, description),
            price = COALESCE($5, price),
            original_price = COALESCE($6, original_price),
            image = COALESCE($7, image),
            rating = COALESCE($8, rating),
            stock = COALESCE($9, stock),
            category = COALESCE($10, category),
            is_best_seller = COALESCE($11, is_best_seller),
            discount = COALESCE($12, discount),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.brand)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.original_price)
    .bind(payload.image)
    .bind(payload.rating)
    .bind(payload.stock)
    .bind(payload.category)
    .bind(payload.is_best_seller)
    .bind(payload.discount)
    .fetch_optional(&state.pool)
    .await?;

    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".into())),
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success("Product updated successfully", product, None))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Product not found".into()));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted successfully",
        serde_json::json!({}),
        None,
    ))
}
