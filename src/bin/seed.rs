use campus_stationery_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        pickup_slots::{ActiveModel as SlotActive, Column as SlotCol, Entity as PickupSlots},
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    models::{ProductCategory, Role},
    services::auth_service::hash_password,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let shopkeeper_id =
        ensure_user(&orm, "shopkeeper@campus.test", "shop123", Role::Shopkeeper).await?;
    let student_id = ensure_user(&orm, "student@campus.test", "student123", Role::Student).await?;
    seed_products(&orm).await?;
    seed_slots(&orm).await?;

    println!("Seed completed. Shopkeeper ID: {shopkeeper_id}, Student ID: {student_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present");
        return Ok(existing.id);
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password)?),
        role: Set(role.as_str().to_string()),
        phone_number: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let products = [
        ("A4 Ruled Notebook", "200 pages, spiral bound", 6000, ProductCategory::Stationery, 120),
        ("Blue Ball Pen (pack of 5)", "Smooth 0.7mm tip", 5000, ProductCategory::Stationery, 200),
        ("Geometry Box", "Compass, divider, protractor and scales", 15000, ProductCategory::Stationery, 40),
        ("Xerox A4 B/W (per page)", "Single-sided black and white copy", 200, ProductCategory::Xerox, 5000),
        ("Engineering Mathematics Vol. 1", "First-year reference text", 45000, ProductCategory::Books, 15),
        ("Lab Coat", "Cotton, unisex", 35000, ProductCategory::Other, 3),
    ];

    for (name, description, price, category, stock) in products {
        let exists = Products::find()
            .filter(ProductCol::Name.eq(name))
            .count(orm)
            .await?
            > 0;
        if exists {
            continue;
        }

        let now = Utc::now();
        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price: Set(price),
            category: Set(category.as_str().to_string()),
            stock: Set(stock),
            is_available: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_slots(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let now = Utc::now();
    let upcoming = PickupSlots::find()
        .filter(SlotCol::StartTime.gte(sea_orm::prelude::DateTimeWithTimeZone::from(now)))
        .count(orm)
        .await?;
    if upcoming > 0 {
        println!("Pickup slots already present");
        return Ok(());
    }

    // Hourly windows for the next two days, 10:00 to 16:00.
    let today = now.date_naive();
    for day in 1..=2 {
        let date = today + Duration::days(day);
        for hour in 10..16 {
            let Some(start) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let start = start.and_utc();
            SlotActive {
                id: Set(Uuid::new_v4()),
                start_time: Set(start.into()),
                end_time: Set((start + Duration::hours(1)).into()),
                max_orders: Set(10),
                current_orders: Set(0),
                is_available: Set(true),
            }
            .insert(orm)
            .await?;
        }
    }

    println!("Seeded pickup slots");
    Ok(())
}
