//! Review Endpoints
//!
//! 리뷰 대상은 세 가지: 주차장, 장소, 좌표(location).
//! subject_type에 맞는 참조 필드 하나만 채워짐.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::{NewReview, Review, ReviewFilter, ReviewQuery, ReviewSort, ReviewTarget},
    error::ApiError,
    routes::{
        parking::{parse_cursor, parse_location},
        ApiJson, ApiPath, ApiQuery,
    },
    types::{
        clamp_limit, is_valid_latitude, is_valid_longitude, next_cursor, DataResponse, PageInfo,
        PagedResponse, SubjectType, DEFAULT_REVIEW_RADIUS_M,
    },
    AppState,
};

const MAX_COMMENT_CHARS: usize = 1000;

// ============ Request/Response Types ============

/// 리뷰 목록 쿼리
#[derive(Debug, Deserialize)]
pub struct ListReviewsQuery {
    pub parking_lot_id: Option<Uuid>,
    pub place_id: Option<Uuid>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// 반경 (미터, 기본 500)
    pub radius: Option<f64>,
    /// created_desc | rating_desc | helpful_desc
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

/// 리뷰 작성 요청
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub subject_type: Option<String>,
    pub parking_lot_id: Option<Uuid>,
    pub place_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// 범위 밖 값도 받아서 400으로 돌려주기 위해 넓은 타입 사용
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HelpfulResponse {
    pub message: String,
}

impl HelpfulResponse {
    fn new(message: &str) -> Json<DataResponse<Self>> {
        Json(DataResponse::new(Self {
            message: message.to_string(),
        }))
    }
}

// ============ Handlers ============

/// GET /api/reviews
///
/// 필터 우선순위: parking_lot_id > place_id > lat/lng > 전체
pub async fn list_reviews(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListReviewsQuery>,
) -> Result<Json<PagedResponse<Review>>, ApiError> {
    let sort = match query.sort.as_deref() {
        None | Some("") => ReviewSort::default(),
        Some(raw) => ReviewSort::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid sort: {}", raw)))?,
    };

    let cursor = parse_cursor(query.cursor.as_deref())?;
    if cursor.is_some() && sort != ReviewSort::CreatedDesc {
        return Err(ApiError::BadRequest(
            "cursor is only supported with sort=created_desc".to_string(),
        ));
    }

    let filter = if let Some(id) = query.parking_lot_id {
        ReviewFilter::ParkingLot(id)
    } else if let Some(id) = query.place_id {
        ReviewFilter::Place(id)
    } else {
        match parse_location(query.lat, query.lng, query.radius, DEFAULT_REVIEW_RADIUS_M)? {
            Some(bbox) => ReviewFilter::Near(bbox),
            None => ReviewFilter::All,
        }
    };

    let limit = clamp_limit(query.limit);
    let reviews = state
        .store
        .list_reviews(&ReviewQuery { filter, sort, cursor, limit })
        .await?;

    // 평점/도움돼요 정렬은 커서를 발급하지 않음
    let next_cursor = match sort {
        ReviewSort::CreatedDesc => next_cursor(&reviews, limit, Review::cursor),
        _ => None,
    };

    Ok(Json(PagedResponse {
        data: reviews,
        page: PageInfo { next_cursor },
    }))
}

/// POST /api/reviews
///
/// # Request Body
///
/// ```json
/// { "subject_type": "parking_lot", "parking_lot_id": "...", "rating": 4, "comment": "넓어요" }
/// ```
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<DataResponse<Review>>), ApiError> {
    let input = validate_review(user.user_id, req)?;

    // 참조 대상 존재 확인
    match input.target {
        ReviewTarget::ParkingLot(id) => {
            if state.store.get_parking_lot(id).await?.is_none() {
                return Err(ApiError::NotFound("Parking lot".to_string()));
            }
        }
        ReviewTarget::Place(id) => {
            if state.store.get_place(id).await?.is_none() {
                return Err(ApiError::NotFound("Place".to_string()));
            }
        }
        ReviewTarget::Location { .. } => {}
    }

    let review = state.store.insert_review(&input).await?;

    tracing::info!(
        review_id = %review.id,
        user_id = %review.user_id,
        subject_type = %review.subject_type,
        "Review created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse::new(review))))
}

/// POST /api/reviews/:id/helpful
pub async fn mark_helpful(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(review_id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<DataResponse<HelpfulResponse>>), ApiError> {
    if !state.store.review_exists(review_id).await? {
        return Err(ApiError::NotFound("Review".to_string()));
    }

    if state.store.mark_helpful(review_id, user.user_id).await? {
        tracing::debug!(%review_id, user_id = %user.user_id, "Review marked helpful");
        Ok((StatusCode::CREATED, HelpfulResponse::new("Marked as helpful")))
    } else {
        Ok((StatusCode::OK, HelpfulResponse::new("Already marked as helpful")))
    }
}

/// DELETE /api/reviews/:id/helpful
pub async fn unmark_helpful(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(review_id): ApiPath<Uuid>,
) -> Result<Json<DataResponse<HelpfulResponse>>, ApiError> {
    let removed = state.store.unmark_helpful(review_id, user.user_id).await?;
    tracing::debug!(%review_id, user_id = %user.user_id, removed, "Review unmarked helpful");

    Ok(HelpfulResponse::new("Unmarked as helpful"))
}

// ============ Validation ============

fn validate_review(user_id: Uuid, req: CreateReviewRequest) -> Result<NewReview, ApiError> {
    let subject_type = req
        .subject_type
        .as_deref()
        .and_then(SubjectType::parse)
        .ok_or_else(|| {
            ApiError::BadRequest(
                "subject_type must be one of parking_lot, place, location".to_string(),
            )
        })?;

    let target = match subject_type {
        SubjectType::ParkingLot => ReviewTarget::ParkingLot(
            req.parking_lot_id
                .ok_or_else(|| ApiError::BadRequest("parking_lot_id is required".to_string()))?,
        ),
        SubjectType::Place => ReviewTarget::Place(
            req.place_id
                .ok_or_else(|| ApiError::BadRequest("place_id is required".to_string()))?,
        ),
        SubjectType::Location => match (req.latitude, req.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !is_valid_latitude(latitude) || !is_valid_longitude(longitude) {
                    return Err(ApiError::BadRequest(
                        "latitude/longitude out of range".to_string(),
                    ));
                }
                ReviewTarget::Location { latitude, longitude }
            }
            _ => {
                return Err(ApiError::BadRequest(
                    "latitude and longitude are required".to_string(),
                ))
            }
        },
    };

    let rating = match req.rating {
        None => None,
        Some(r @ 1..=5) => Some(r as i16),
        Some(_) => {
            return Err(ApiError::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ))
        }
    };

    let comment = req
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
    {
        return Err(ApiError::BadRequest(format!(
            "comment must be at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }

    Ok(NewReview {
        user_id,
        target,
        rating,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot_review(rating: Option<i64>) -> CreateReviewRequest {
        CreateReviewRequest {
            subject_type: Some("parking_lot".to_string()),
            parking_lot_id: Some(Uuid::new_v4()),
            place_id: None,
            latitude: None,
            longitude: None,
            rating,
            comment: None,
        }
    }

    #[test]
    fn test_rating_bounds() {
        let user = Uuid::new_v4();
        assert!(validate_review(user, lot_review(Some(0))).is_err());
        assert!(validate_review(user, lot_review(Some(6))).is_err());
        assert_eq!(validate_review(user, lot_review(Some(3))).unwrap().rating, Some(3));
        assert_eq!(validate_review(user, lot_review(None)).unwrap().rating, None);
    }

    #[test]
    fn test_reference_field_required() {
        let mut req = lot_review(Some(4));
        req.parking_lot_id = None;
        let err = validate_review(Uuid::new_v4(), req).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "parking_lot_id is required"));
    }

    #[test]
    fn test_location_needs_both_coordinates() {
        let mut req = lot_review(None);
        req.subject_type = Some("location".to_string());
        req.latitude = Some(37.5);
        let err = validate_review(Uuid::new_v4(), req).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("latitude and longitude")));
    }

    #[test]
    fn test_unknown_subject_type() {
        let mut req = lot_review(None);
        req.subject_type = Some("building".to_string());
        assert!(validate_review(Uuid::new_v4(), req).is_err());
    }

    #[test]
    fn test_comment_length_limit() {
        let mut req = lot_review(Some(5));
        req.comment = Some("a".repeat(MAX_COMMENT_CHARS + 1));
        assert!(validate_review(Uuid::new_v4(), req).is_err());
    }
}
