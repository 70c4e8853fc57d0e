//! Parking Helper API Library
//!
//! # Overview
//!
//! 지도 서비스(네이버/카카오/구글)에서 감지한 장소를 중복 없이 저장하고,
//! 장소·주차장별 주차 리뷰와 꿀팁을 제공하는 백엔드 API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │  Auth   │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!              ┌──────────────────────────┐
//!              │ PostgreSQL | MemoryStore │
//!              └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 `{error:{code,message}}` 응답
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `auth`: Bearer 토큰 인증
//! - `db`: `ParkingStore` trait과 PostgreSQL/인메모리 구현
//! - `seed`: JSON 파일로 주차장 일괄 등록
//! - `types`: 공통 타입 (Provider, 커서, 위치 범위)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parking_helper_api::{config::Config, db::MemoryStore, routes, AppState};
//!
//! let state = AppState::new(Arc::new(MemoryStore::new()), Config::default());
//! let app = routes::create_router(state);
//! ```

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod seed;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use db::{Database, MemoryStore, ParkingStore};
pub use error::ApiError;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ParkingStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn ParkingStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
