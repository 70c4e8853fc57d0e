//! Parking Helper Extension Library
//!
//! # Overview
//!
//! 지도 페이지(네이버/카카오/구글)에서 현재 보고 있는 장소를 감지하고,
//! 백엔드에서 주차장·리뷰·꿀팁을 가져와 패널 상태로 내보내는 쪽.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                              │
//! │                                                               │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   │
//! │  │ Detector │──▶│ Identity │──▶│ Fetcher  │──▶│  Panel   │   │
//! │  └──────────┘   └──────────┘   └────┬─────┘   └──────────┘   │
//! │                                     │ TTL cache               │
//! └─────────────────────────────────────┼────────────────────────┘
//!                                       │ ParkingApi
//!                                       ▼
//!                          ┌──────────────────────────┐
//!                          │   Backend REST (reqwest)  │
//!                          └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `detector`: URL + HTML에서 장소 후보 추출
//! - `identity`: 장소 식별 키와 변경 감지
//! - `client`: 백엔드 HTTP 클라이언트
//! - `fetcher`: 주차 정보 조회 + 5분 캐시
//! - `session`: 디바운스, 패널 상태, 런타임 메시지 처리
//! - `messages`: 구성 요소 간 JSON 메시지
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parking_helper_extension::{ApiClient, ClientConfig, Session};
//!
//! let config = ClientConfig::from_env()?;
//! let api = Arc::new(ApiClient::new(&config)?);
//! let mut session = Session::from_config(api, &config);
//! session.run(snapshots, panel).await;
//! ```

pub mod client;
pub mod config;
pub mod detector;
pub mod fetcher;
pub mod identity;
pub mod messages;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use client::{ApiClient, ClientError, ParkingApi};
pub use config::ClientConfig;
pub use detector::{detect, PageSnapshot, RetryPolicy, SnapshotSource};
pub use fetcher::ParkingInfoFetcher;
pub use identity::PlaceTracker;
pub use messages::{MessageResponse, RuntimeMessage};
pub use session::{PanelState, Session};
pub use types::{ParkingInfo, PlaceCandidate, Provider};
