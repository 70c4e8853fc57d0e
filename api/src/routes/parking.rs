//! Parking Lot Endpoints
//!
//! 텍스트/위치 기반 주차장 검색과 주차장 상세 조회.
//! 위치 검색은 위도/경도 사각 범위 근사치 (PostGIS 미사용).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{ParkingLot, ParkingSearch, RatingSubject, Review, ReviewFilter, ReviewQuery, ReviewSort, Tip},
    error::ApiError,
    routes::{ApiPath, ApiQuery},
    types::{
        clamp_limit, is_valid_latitude, is_valid_longitude, next_cursor, BoundingBox, Cursor,
        DataResponse, PageInfo, PagedResponse, DEFAULT_SEARCH_RADIUS_M,
    },
    AppState,
};

/// 상세 화면의 최근 리뷰/팁 개수
const RECENT_REVIEWS: u32 = 5;
const RECENT_TIPS: u32 = 3;

// ============ Request/Response Types ============

/// 검색 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// 이름/주소 검색어
    pub q: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// 반경 (미터, 기본 1000, 100~10000)
    pub radius: Option<f64>,
    /// 페이지 크기 (기본 20, 최대 50)
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

/// 주차장 상세 응답
#[derive(Debug, Serialize)]
pub struct ParkingLotDetail {
    #[serde(flatten)]
    pub lot: ParkingLot,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
    pub recent_reviews: Vec<Review>,
    pub recent_tips: Vec<Tip>,
}

// ============ Handlers ============

/// GET /api/parking/search
///
/// # Response
///
/// ```json
/// {
///   "data": [{ "id": "...", "name": "B 공영주차장", "type": "public", ... }],
///   "page": { "next_cursor": "1717000000000000_..." }
/// }
/// ```
pub async fn search_parking_lots(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<PagedResponse<ParkingLot>>, ApiError> {
    let limit = clamp_limit(query.limit);
    let text = query
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    let bbox = parse_location(query.lat, query.lng, query.radius, DEFAULT_SEARCH_RADIUS_M)?;
    let cursor = parse_cursor(query.cursor.as_deref())?;

    let lots = state
        .store
        .search_parking_lots(&ParkingSearch { text, bbox, cursor, limit })
        .await?;

    tracing::debug!(results = lots.len(), limit, "Parking search");

    let next_cursor = next_cursor(&lots, limit, ParkingLot::cursor);
    Ok(Json(PagedResponse {
        data: lots,
        page: PageInfo { next_cursor },
    }))
}

/// GET /api/parking/:id
///
/// 주차장 + 평균 평점 + 최근 리뷰 5개 + 최근 팁 3개
pub async fn get_parking_lot(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DataResponse<ParkingLotDetail>>, ApiError> {
    let lot = state
        .store
        .get_parking_lot(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Parking lot".to_string()))?;

    let recent_reviews = state
        .store
        .list_reviews(&ReviewQuery {
            filter: ReviewFilter::ParkingLot(id),
            sort: ReviewSort::CreatedDesc,
            cursor: None,
            limit: RECENT_REVIEWS,
        })
        .await?;
    let recent_tips = state.store.list_tips(id, RECENT_TIPS).await?;
    let stats = state.store.rating_stats(RatingSubject::ParkingLot(id)).await?;

    Ok(Json(DataResponse::new(ParkingLotDetail {
        lot,
        average_rating: stats.average_rating,
        rating_count: stats.rating_count,
        recent_reviews,
        recent_tips,
    })))
}

// ============ Helpers ============

/// lat/lng 쌍 검증 후 사각 범위 계산 (둘 다 없으면 위치 필터 없음)
pub(crate) fn parse_location(
    lat: Option<f64>,
    lng: Option<f64>,
    radius: Option<f64>,
    default_radius: f64,
) -> Result<Option<BoundingBox>, ApiError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => {
            if !is_valid_latitude(lat) || !is_valid_longitude(lng) {
                return Err(ApiError::BadRequest("lat/lng out of range".to_string()));
            }
            let radius = radius.unwrap_or(default_radius);
            if !radius.is_finite() {
                return Err(ApiError::BadRequest("radius must be a number".to_string()));
            }
            Ok(Some(BoundingBox::around(lat, lng, radius)))
        }
        _ => Err(ApiError::BadRequest(
            "lat and lng must be provided together".to_string(),
        )),
    }
}

pub(crate) fn parse_cursor(raw: Option<&str>) -> Result<Option<Cursor>, ApiError> {
    match raw.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(raw) => Cursor::decode(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest("Invalid cursor".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_requires_pair() {
        assert!(parse_location(None, None, None, 1000.0).unwrap().is_none());
        assert!(parse_location(Some(37.5), None, None, 1000.0).is_err());
        assert!(parse_location(Some(91.0), Some(127.0), None, 1000.0).is_err());
        assert!(parse_location(Some(37.5), Some(127.0), None, 1000.0).unwrap().is_some());
    }

    #[test]
    fn test_parse_cursor() {
        assert_eq!(parse_cursor(None).unwrap(), None);
        assert_eq!(parse_cursor(Some("")).unwrap(), None);
        assert!(parse_cursor(Some("garbage")).is_err());
    }
}
