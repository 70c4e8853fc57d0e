//! Parking Helper API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Browser Extension (map page content)              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /api/parking/*  /api/place/*  /api/reviews/*  ││
//! │  │  /api/tips                                               ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Auth Layer                          ││
//! │  │  Bearer token → SHA3-256 → api_tokens                   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL (sqlx)    MemoryStore (STORE=memory)        ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use parking_helper_api::{
    auth, config::StoreKind, db::Role, routes, AppState, Config, Database, MemoryStore,
    ParkingStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "parking_helper_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Parking Helper API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(store = ?config.store, environment = ?config.environment, "📋 Configuration loaded");

    // 저장소 선택
    let store: Arc<dyn ParkingStore> = match config.store {
        StoreKind::Postgres => {
            let db = Database::connect(&config.database_url).await?;
            tracing::info!("🗄️  Database connected");

            db.run_migrations().await?;
            tracing::info!("📦 Migrations completed");

            Arc::new(db)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // 초기 admin 토큰 등록
    if let Some(token) = &config.bootstrap_admin_token {
        let admin_id = Uuid::new_v4();
        auth::register_token(store.as_ref(), token, admin_id, Role::Admin).await?;
        tracing::info!(user_id = %admin_id, "🔑 Bootstrap admin token registered");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    // 앱 상태 구성 + 라우터
    let state = AppState::new(store, config);
    let app = routes::create_router(state);

    // 서버 시작
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
