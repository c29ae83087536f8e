use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    brand: &'static str,
    description: &'static str,
    price: i64,
    original_price: Option<i64>,
    image: &'static str,
    rating: f64,
    stock: i32,
    category: &'static str,
    is_best_seller: bool,
    discount: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "Store Admin", "admin@example.com", "Admin123x", "admin").await?;
    let user_id = ensure_user(&pool, "Demo User", "user@example.com", "User1234", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        SeedProduct {
            name: "iPhone 15 Pro Max 256GB",
            brand: "Apple",
            description: "Titanium design, A17 Pro chip, Pro camera system with 5x Telephoto.",
            price: 119_999,
            original_price: Some(129_999),
            image: "iphone-15.jpg",
            rating: 4.9,
            stock: 12,
            category: "smartphones",
            is_best_seller: true,
            discount: 8,
        },
        SeedProduct {
            name: "Samsung Galaxy S24 Ultra",
            brand: "Samsung",
            description: "6.8\" Dynamic AMOLED, Snapdragon 8 Gen 3, 200MP camera, S Pen included.",
            price: 109_999,
            original_price: Some(119_999),
            image: "galaxy-s24.jpg",
            rating: 4.8,
            stock: 8,
            category: "smartphones",
            is_best_seller: true,
            discount: 8,
        },
        SeedProduct {
            name: "OnePlus 12 256GB",
            brand: "OnePlus",
            description: "Snapdragon 8 Gen 3, 100W fast charging, 50MP triple camera system.",
            price: 79_999,
            original_price: None,
            image: "oneplus-12.jpg",
            rating: 4.7,
            stock: 15,
            category: "smartphones",
            is_best_seller: false,
            discount: 0,
        },
        SeedProduct {
            name: "MacBook Pro 16\" M3 Max",
            brand: "Apple",
            description: "M3 Max chip, 36GB RAM, 1TB SSD, Liquid Retina XDR display.",
            price: 349_999,
            original_price: Some(369_999),
            image: "macbook-pro-16.jpg",
            rating: 4.9,
            stock: 5,
            category: "laptops",
            is_best_seller: true,
            discount: 5,
        },
        SeedProduct {
            name: "Dell XPS 15",
            brand: "Dell",
            description: "Intel Core i9, NVIDIA RTX 4090, 32GB RAM, OLED display.",
            price: 279_999,
            original_price: None,
            image: "dell-xps-15.jpg",
            rating: 4.7,
            stock: 10,
            category: "laptops",
            is_best_seller: false,
            discount: 0,
        },
        SeedProduct {
            name: "Nintendo Switch OLED",
            brand: "Nintendo",
            description: "7\" OLED screen, 64GB internal storage, Joy-Con controllers.",
            price: 34_999,
            original_price: None,
            image: "switch-oled.jpg",
            rating: 4.8,
            stock: 20,
            category: "gaming",
            is_best_seller: false,
            discount: 0,
        },
    ];

    for p in products {
        // Re-running the seed must not duplicate the demo catalog.
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, brand, description, price, original_price, image,
                 rating, stock, category, is_best_seller, discount)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(p.name)
        .bind(p.brand)
        .bind(p.description)
        .bind(p.price)
        .bind(p.original_price)
        .bind(p.image)
        .bind(p.rating)
        .bind(p.stock)
        .bind(p.category)
        .bind(p.is_best_seller)
        .bind(p.discount)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
