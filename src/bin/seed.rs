use anyhow::Context;
use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use storefront::{
    catalog::{Catalog, Warehouse},
    db::{create_pool, run_migrations},
};

/// Gives every catalog item a stock row in every warehouse and, when
/// SEED_ADMIN_PASSWORD is set, prints a hash for ADMIN_PASSWORD_HASH.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let catalog_path =
        std::env::var("CATALOG_PATH").unwrap_or_else(|_| "catalog.json".to_string());
    let initial: i32 = match std::env::var("SEED_STOCK") {
        Ok(raw) => raw.parse().context("SEED_STOCK must be a whole number")?,
        Err(_) => 0,
    };
    anyhow::ensure!(initial >= 0, "SEED_STOCK must not be negative");

    let catalog = Catalog::load(catalog_path.as_ref())?;
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let inserted = seed_inventory(&pool, &catalog, initial).await?;
    println!("Seeded {inserted} stock rows");

    if let Ok(password) = std::env::var("SEED_ADMIN_PASSWORD") {
        println!("ADMIN_PASSWORD_HASH={}", hash_password(&password)?);
    }
    Ok(())
}

async fn seed_inventory(
    pool: &sqlx::PgPool,
    catalog: &Catalog,
    quantity: i32,
) -> anyhow::Result<u64> {
    let mut inserted = 0;
    for item in catalog.ids() {
        for warehouse in Warehouse::ALL {
            let result = sqlx::query(
                r#"
                INSERT INTO inventory_list (item, warehouse, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (item, warehouse) DO NOTHING
                "#,
            )
            .bind(item)
            .bind(warehouse.code())
            .bind(quantity)
            .execute(pool)
            .await?;
            inserted += result.rows_affected();
        }
    }
    Ok(inserted)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    Ok(hash)
}
