//! API Routes Module
//!
//! # Routes
//!
//! ```text
//! GET    /health                      - 서버 상태 확인
//!
//! GET    /api/parking/search          - 주차장 검색 (텍스트/위치, 커서)
//! GET    /api/parking/:id             - 주차장 상세 + 최근 리뷰/팁
//!
//! POST   /api/place/ingest            - 장소 생성 또는 기존 장소 반환
//! GET    /api/place/:id               - 장소 상세 + 주차장/별칭/링크
//!
//! GET    /api/reviews                 - 리뷰 목록
//! POST   /api/reviews                 - 리뷰 작성 (인증)
//! POST   /api/reviews/:id/helpful     - 도움돼요 (인증)
//! DELETE /api/reviews/:id/helpful     - 도움돼요 취소 (인증)
//!
//! POST   /api/tips                    - 꿀팁 작성 (인증)
//! ```

pub mod health;
pub mod parking;
pub mod place;
pub mod reviews;
pub mod tips;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{error::ApiError, AppState};

// ============ Extractors ============
// 추출 실패도 `{error:{code:"BAD_REQUEST"}}` 형식으로 응답

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// 라우터 생성
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.is_production() {
        // 프로덕션: ALLOWED_ORIGINS에 지정된 도메인만 허용
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        // 개발: 확장 프로그램과 로컬 웹 모두 허용
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Parking lots
        .route("/api/parking/search", get(parking::search_parking_lots))
        .route("/api/parking/:id", get(parking::get_parking_lot))

        // Places
        .route("/api/place/ingest", post(place::ingest_place))
        .route("/api/place/:id", get(place::get_place))

        // Reviews
        .route("/api/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route(
            "/api/reviews/:id/helpful",
            post(reviews::mark_helpful).delete(reviews::unmark_helpful),
        )

        // Tips
        .route("/api/tips", post(tips::create_tip))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
