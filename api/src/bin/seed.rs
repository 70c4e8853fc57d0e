//! Parking Lot Seeder
//!
//! ```text
//! parking-helper-seed <lots.json>
//! ```
//!
//! DATABASE_URL의 PostgreSQL에 마이그레이션을 적용한 뒤 파일의 주차장을 등록함.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parking_helper_api::{seed, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "parking_helper_api=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: parking-helper-seed <lots.json>")?;
    let json = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;

    let config = Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!("🗄️  Database connected");

    let report = seed::seed_lots(&db, &json).await?;
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped,
        file = %path,
        "🌱 Parking lots seeded"
    );

    Ok(())
}
