//! Place Endpoints
//!
//! 지도에서 감지한 장소를 (provider, external_place_id) 기준으로
//! 생성하거나 기존 장소를 반환함.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth,
    db::{IngestOutcome, NewPlaceLink, ParkingLot, Place, PlaceAlias, PlaceLink, RatingSubject},
    error::ApiError,
    routes::{ApiJson, ApiPath},
    types::{is_valid_latitude, is_valid_longitude, DataResponse, Provider},
    AppState,
};

const MAX_NAME_CHARS: usize = 255;

// ============ Request/Response Types ============

/// 장소 ingest 요청
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub provider: Option<String>,
    pub external_place_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// 장소 상세 응답
#[derive(Debug, Serialize)]
pub struct PlaceDetail {
    #[serde(flatten)]
    pub place: Place,
    pub parking_lots: Vec<ParkingLot>,
    pub aliases: Vec<PlaceAlias>,
    pub links: Vec<PlaceLink>,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
}

// ============ Handlers ============

/// POST /api/place/ingest
///
/// # Flow
///
/// 1. (설정 시) admin 토큰 확인
/// 2. 필수 필드/provider/좌표 검증
/// 3. 연결이 있으면 기존 장소 (200, existing: true)
/// 4. 없으면 장소+연결 생성 (201, existing: false)
pub async fn ingest_place(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<IngestRequest>,
) -> Result<(StatusCode, Json<DataResponse<IngestOutcome>>), ApiError> {
    if state.config.ingest_require_admin {
        auth::authenticate(state.store.as_ref(), &headers)
            .await?
            .require_admin()?;
    }

    let input = validate_ingest(req)?;
    let outcome = state.store.ingest_place(&input).await?;

    tracing::info!(
        place_id = %outcome.place.id,
        provider = %input.provider,
        external_place_id = %input.external_place_id,
        existing = outcome.existing,
        "Place ingested"
    );

    let status = if outcome.existing { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(DataResponse::new(outcome))))
}

/// GET /api/place/:id
pub async fn get_place(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DataResponse<PlaceDetail>>, ApiError> {
    let place = state
        .store
        .get_place(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Place".to_string()))?;

    let parking_lots = state.store.list_parking_lots_for_place(id).await?;
    let aliases = state.store.list_place_aliases(id).await?;
    let links = state.store.list_place_links(id).await?;
    let stats = state.store.rating_stats(RatingSubject::Place(id)).await?;

    Ok(Json(DataResponse::new(PlaceDetail {
        place,
        parking_lots,
        aliases,
        links,
        average_rating: stats.average_rating,
        rating_count: stats.rating_count,
    })))
}

// ============ Helpers ============

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_ingest(req: IngestRequest) -> Result<NewPlaceLink, ApiError> {
    let (provider, external_place_id, name) = match (
        non_blank(req.provider),
        non_blank(req.external_place_id),
        non_blank(req.name),
    ) {
        (Some(p), Some(e), Some(n)) => (p, e, n),
        _ => {
            return Err(ApiError::BadRequest(
                "provider, external_place_id, and name are required".to_string(),
            ))
        }
    };

    let provider = Provider::parse(&provider)
        .ok_or_else(|| ApiError::BadRequest("Invalid provider".to_string()))?;

    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }

    if req.latitude.is_some_and(|lat| !is_valid_latitude(lat))
        || req.longitude.is_some_and(|lng| !is_valid_longitude(lng))
    {
        return Err(ApiError::BadRequest("latitude/longitude out of range".to_string()));
    }

    Ok(NewPlaceLink {
        provider,
        external_place_id,
        name,
        address: non_blank(req.address),
        latitude: req.latitude,
        longitude: req.longitude,
    })
}
