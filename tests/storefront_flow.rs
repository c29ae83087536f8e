use storefront_api::{
    db::create_pool,
    dto::{
        auth::{LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, RemoveFromCartRequest, UpdateCartItemRequest},
        orders::{CreateOrderRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
        users::UpdateProfileRequest,
    },
    error::AppError,
    middleware::auth::{AuthUser, decode_token},
    models::Address,
    routes::params::ProductQuery,
    services::{auth_service, cart_service, order_service, product_service, user_service},
    state::{AppState, JwtKeys},
};
use uuid::Uuid;

// Full storefront flow: registration and login, catalog filters, cart
// merge/stock/idempotence behavior, checkout snapshot and order lifecycle.
// Runs as a single sequential flow so table truncation cannot race.
#[tokio::test]
async fn storefront_contract_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    let state = setup_state(&database_url).await?;

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };

    // --- registration: duplicate email rejected, weak password rejected ---
    let registered = auth_service::register(
        &state,
        RegisterRequest {
            name: "Alice".into(),
            email: "a@x.com".into(),
            password: "Passw0rd1".into(),
            confirm_password: "Passw0rd1".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(registered.user.email, "a@x.com");
    assert_eq!(registered.user.role, "user");

    let err = auth_service::register(
        &state,
        RegisterRequest {
            name: "Alice Again".into(),
            email: "A@X.com".into(),
            password: "Passw0rd1".into(),
            confirm_password: "Passw0rd1".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.to_string(), "Email is already registered");

    let err = auth_service::register(
        &state,
        RegisterRequest {
            name: "Bob".into(),
            email: "weak@x.com".into(),
            password: "short".into(),
            confirm_password: "short".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // --- login round trip: token resolves back to the registered user ---
    let logged_in = auth_service::login(
        &state,
        LoginRequest {
            email: "a@x.com".into(),
            password: "Passw0rd1".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let alice = decode_token(&state.jwt, &logged_in.token)?;
    assert_eq!(alice.user_id, registered.user.id);

    let profile = auth_service::profile(&state, alice.user_id).await?.data.unwrap();
    assert_eq!(profile.name, "Alice");
    assert_eq!(profile.email, "a@x.com");

    let err = auth_service::login(
        &state,
        LoginRequest {
            email: "a@x.com".into(),
            password: "WrongPass1".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");

    let err = auth_service::login(
        &state,
        LoginRequest {
            email: "nobody@x.com".into(),
            password: "Passw0rd1".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");

    // --- catalog: admin gate and filters ---
    let err = product_service::create_product(&state, &alice, widget_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let widget = product_service::create_product(&state, &admin, widget_payload())
        .await?
        .data
        .unwrap();
    let gadget = product_service::create_product(&state, &admin, gadget_payload())
        .await?
        .data
        .unwrap();

    let by_category = product_service::list_products(&state, query(|q| {
        q.category = Some("widgets".into());
    }))
    .await?
    .data
    .unwrap();
    assert_eq!(by_category.items.len(), 1);
    assert_eq!(by_category.items[0].id, widget.id);

    let by_search = product_service::list_products(&state, query(|q| {
        q.search = Some("WIDG".into());
    }))
    .await?
    .data
    .unwrap();
    assert_eq!(by_search.items.len(), 1);

    // Price bounds are inclusive on both ends.
    let by_price = product_service::list_products(&state, query(|q| {
        q.min_price = Some(5000);
        q.max_price = Some(5000);
    }))
    .await?
    .data
    .unwrap();
    assert_eq!(by_price.items.len(), 1);
    assert_eq!(by_price.items[0].id, widget.id);

    // --- cart: stock boundary leaves the cart untouched ---
    let err = cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: widget.id,
            quantity: 6,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Insufficient stock");
    let cart = cart_service::get_cart(&state, &alice).await?.data.unwrap();
    assert!(cart.items.is_empty());

    let err = cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Product not found");

    // --- cart: merge by product keeps the first-add price snapshot ---
    cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: widget.id,
            quantity: 2,
        },
    )
    .await?;

    product_service::update_product(
        &state,
        &admin,
        widget.id,
        update_price(9999),
    )
    .await?;

    let cart = cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: widget.id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 4);
    assert_eq!(cart.items[0].price, 5000);

    // --- cart: update sets exactly, no accumulation ---
    let cart = cart_service::update_cart_item(
        &state,
        &alice,
        UpdateCartItemRequest {
            product_id: widget.id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items[0].quantity, 2);

    let err = cart_service::update_cart_item(
        &state,
        &alice,
        UpdateCartItemRequest {
            product_id: gadget.id,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Item not found in cart");

    cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: gadget.id,
            quantity: 2,
        },
    )
    .await?;

    let cart = cart_service::get_cart(&state, &alice).await?.data.unwrap();
    assert_eq!(cart.total, 2 * 5000 + 2 * 2500);

    // --- checkout: snapshot totals, pending status, emptied cart ---
    let err = order_service::create_order(
        &state,
        &AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        },
        order_payload(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Cart is empty");

    let checkout = order_service::create_order(&state, &alice, order_payload())
        .await?
        .data
        .unwrap();
    assert_eq!(checkout.order.total_amount, 15000);
    assert_eq!(checkout.order.status, "pending");
    assert_eq!(checkout.order.payment_status, "pending");
    assert_eq!(checkout.items.len(), 2);
    assert!(checkout.items.iter().any(|i| i.name == "Blue Widget"));

    let cart = cart_service::get_cart(&state, &alice).await?.data.unwrap();
    assert!(cart.items.is_empty());

    // Later price changes must not alter the historical order.
    product_service::update_product(&state, &admin, gadget.id, update_price(100))
        .await?;
    let fetched = order_service::get_order(&state, &alice, checkout.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.total_amount, 15000);

    // --- ownership: another user's order is forbidden ---
    let bob_data = auth_service::register(
        &state,
        RegisterRequest {
            name: "Bob".into(),
            email: "b@x.com".into(),
            password: "Passw0rd2".into(),
            confirm_password: "Passw0rd2".into(),
        },
    )
    .await?
    .data
    .unwrap();
    let bob = AuthUser {
        user_id: bob_data.user.id,
        role: "user".into(),
    };

    let err = order_service::get_order(&state, &bob, checkout.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // --- status updates: admin only, validated, no ownership check ---
    let err = order_service::update_order_status(
        &state,
        &alice,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
            payment_status: "paid".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = order_service::update_order_status(
        &state,
        &admin,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "misplaced".into(),
            payment_status: "paid".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let shipped = order_service::update_order_status(
        &state,
        &admin,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
            payment_status: "paid".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(shipped.status, "shipped");
    assert_eq!(shipped.payment_status, "paid");

    // A shipped order can no longer be cancelled.
    let err = order_service::cancel_order(&state, &alice, checkout.order.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Can only cancel pending orders");

    // --- cancellation lifecycle on a fresh pending order ---
    cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: gadget.id,
            quantity: 1,
        },
    )
    .await?;
    let pending = order_service::create_order(&state, &alice, order_payload())
        .await?
        .data
        .unwrap();

    let err = order_service::cancel_order(&state, &bob, pending.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let cancelled = order_service::cancel_order(&state, &alice, pending.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");

    let err = order_service::cancel_order(&state, &alice, pending.order.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Can only cancel pending orders");

    let orders = order_service::list_orders(&state, &alice).await?.data.unwrap();
    assert_eq!(orders.items.len(), 2);

    // --- cart idempotence: clearing twice, removing absent items ---
    cart_service::clear_cart(&state, &alice).await?;
    cart_service::clear_cart(&state, &alice).await?;
    let cart = cart_service::remove_from_cart(
        &state,
        &alice,
        RemoveFromCartRequest {
            product_id: widget.id,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(cart.items.is_empty());

    // --- profile merge: email stays, supplied fields change ---
    let updated = user_service::update_profile(
        &state,
        &alice,
        UpdateProfileRequest {
            name: Some("Alice B.".into()),
            phone: Some("555-0100".into()),
            address: Some(Address {
                street: Some("1 Main St".into()),
                city: Some("Springfield".into()),
                state: None,
                zip_code: Some("12345".into()),
                country: Some("US".into()),
            }),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.name, "Alice B.");
    assert_eq!(updated.email, "a@x.com");
    assert_eq!(updated.phone.as_deref(), Some("555-0100"));
    assert_eq!(
        updated.address.as_ref().and_then(|a| a.city.as_deref()),
        Some("Springfield")
    );

    // --- admin user listing ---
    let err = user_service::list_users(&state, &alice).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let users = user_service::list_users(&state, &admin).await?.data.unwrap();
    assert_eq!(users.items.len(), 2);

    // --- product names are not unique across the catalog ---
    let widget_twin = product_service::create_product(&state, &admin, widget_payload())
        .await?
        .data
        .unwrap();
    assert_ne!(widget_twin.id, widget.id);
    assert_eq!(widget_twin.name, widget.name);
    product_service::delete_product(&state, &admin, widget_twin.id).await?;

    // --- product delete is permanent, even with the item sitting in a cart ---
    let doomed = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Clearance Trinket".into(),
            brand: "Acme".into(),
            description: None,
            price: 100,
            original_price: None,
            image: None,
            rating: 0.0,
            stock: 1,
            category: "trinkets".into(),
            is_best_seller: false,
            discount: 0,
        },
    )
    .await?
    .data
    .unwrap();
    cart_service::add_to_cart(
        &state,
        &alice,
        AddToCartRequest {
            product_id: doomed.id,
            quantity: 1,
        },
    )
    .await?;
    product_service::delete_product(&state, &admin, doomed.id).await?;
    let cart = cart_service::get_cart(&state, &alice).await?.data.unwrap();
    assert!(cart.items.is_empty());
    let err = product_service::get_product(&state, doomed.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Product not found");
    let err = product_service::delete_product(&state, &admin, doomed.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, audit_logs, products, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState {
        pool,
        jwt: JwtKeys::new("integration-test-secret"),
    })
}

fn widget_payload() -> CreateProductRequest {
    CreateProductRequest {
        name: "Blue Widget".into(),
        brand: "Acme".into(),
        description: Some("A dependable widget".into()),
        price: 5000,
        original_price: Some(6000),
        image: Some("widget.jpg".into()),
        rating: 4.5,
        stock: 5,
        category: "widgets".into(),
        is_best_seller: true,
        discount: 10,
    }
}

fn gadget_payload() -> CreateProductRequest {
    CreateProductRequest {
        name: "Pocket Gadget".into(),
        brand: "Globex".into(),
        description: Some("Fits in a pocket".into()),
        price: 2500,
        original_price: None,
        image: None,
        rating: 4.0,
        stock: 10,
        category: "gadgets".into(),
        is_best_seller: false,
        discount: 0,
    }
}

fn update_price(price: i64) -> UpdateProductRequest {
    UpdateProductRequest {
        name: None,
        brand: None,
        description: None,
        price: Some(price),
        original_price: None,
        image: None,
        rating: None,
        stock: None,
        category: None,
        is_best_seller: None,
        discount: None,
    }
}

fn order_payload() -> CreateOrderRequest {
    CreateOrderRequest {
        shipping_address: Address {
            street: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            state: None,
            zip_code: Some("12345".into()),
            country: Some("US".into()),
        },
        payment_method: "cod".into(),
    }
}

fn query(build: impl FnOnce(&mut ProductQuery)) -> ProductQuery {
    let mut q = ProductQuery::default();
    build(&mut q);
    q
}
