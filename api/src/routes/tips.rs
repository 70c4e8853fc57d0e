//! Tip Endpoints
//!
//! 주차장별 꿀팁 (할인 정보 등) 작성.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::{NewTip, Tip},
    error::ApiError,
    routes::ApiJson,
    types::DataResponse,
    AppState,
};

const MAX_CONTENT_CHARS: usize = 500;
const MAX_DISCOUNT_CHARS: usize = 255;

/// 팁 작성 요청
#[derive(Debug, Deserialize)]
pub struct CreateTipRequest {
    pub parking_lot_id: Option<Uuid>,
    pub content: Option<String>,
    pub discount_info: Option<String>,
}

/// POST /api/tips
pub async fn create_tip(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTipRequest>,
) -> Result<(StatusCode, Json<DataResponse<Tip>>), ApiError> {
    let input = validate_tip(user.user_id, req)?;

    if state.store.get_parking_lot(input.parking_lot_id).await?.is_none() {
        return Err(ApiError::NotFound("Parking lot".to_string()));
    }

    let tip = state.store.insert_tip(&input).await?;
    tracing::info!(tip_id = %tip.id, parking_lot_id = %tip.parking_lot_id, "Tip created");

    Ok((StatusCode::CREATED, Json(DataResponse::new(tip))))
}

fn validate_tip(user_id: Uuid, req: CreateTipRequest) -> Result<NewTip, ApiError> {
    let parking_lot_id = req
        .parking_lot_id
        .ok_or_else(|| ApiError::BadRequest("parking_lot_id is required".to_string()))?;

    let content = req
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("content is required".to_string()))?;
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "content must be at most {} characters",
            MAX_CONTENT_CHARS
        )));
    }

    let discount_info = req
        .discount_info
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if discount_info
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DISCOUNT_CHARS)
    {
        return Err(ApiError::BadRequest(format!(
            "discount_info must be at most {} characters",
            MAX_DISCOUNT_CHARS
        )));
    }

    Ok(NewTip {
        user_id,
        parking_lot_id,
        content,
        discount_info,
    })
}
