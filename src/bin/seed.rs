use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use foodgram_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{Ingredients, Tags, Users, ingredients, tags, users},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_INGREDIENTS_FILE: &str = "data/ingredients.json";

#[derive(Debug, Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin", "admin123", "admin").await?;
    let user_id = ensure_user(&orm, "user@example.com", "cook", "user123", "user").await?;
    seed_tags(&orm).await?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_INGREDIENTS_FILE.to_string());
    seed_ingredients(&orm, &path).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    username: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(users::Column::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already exists");
        return Ok(existing.id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        username: Set(username.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Created user {email} (role={role})");
    Ok(user.id)
}

async fn seed_tags(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let defaults = [
        ("Breakfast", "#E26C2D", "breakfast"),
        ("Lunch", "#49B64E", "lunch"),
        ("Dinner", "#8775D2", "dinner"),
    ];

    for (name, color, slug) in defaults {
        let exists = Tags::find()
            .filter(tags::Column::Slug.eq(slug))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }
        tags::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            color: Set(Some(color.to_string())),
            slug: Set(Some(slug.to_string())),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded tags");
    Ok(())
}

/// Loads the ingredient catalog; rows already present with the same name and
/// unit are left alone.
async fn seed_ingredients(orm: &DatabaseConnection, path: &str) -> anyhow::Result<()> {
    println!("Loading {path}...");
    let raw = tokio::fs::read_to_string(path).await?;
    let records: Vec<IngredientRecord> = serde_json::from_str(&raw)?;

    let mut created = 0usize;
    for record in &records {
        let exists = Ingredients::find()
            .filter(ingredients::Column::Name.eq(record.name.as_str()))
            .filter(ingredients::Column::MeasurementUnit.eq(record.measurement_unit.as_str()))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }
        ingredients::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(record.name.clone()),
            measurement_unit: Set(record.measurement_unit.clone()),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;
        created += 1;
    }

    println!("Seeded ingredients: {created} new of {}", records.len());
    Ok(())
}
