//! Shared Types
//!
//! 지도 페이지에서 감지한 장소 후보와 백엔드 응답 DTO.
//! 백엔드 JSON은 `{data}` / `{data, page}` / `{error:{code,message}}` 형식.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Provider ============

/// 지원 지도 서비스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Naver,
    Kakao,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Naver => "naver",
            Provider::Kakao => "kakao",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Place Candidate ============

/// 페이지에서 감지한 장소 (최선 추정)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceCandidate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub provider: Provider,
    /// 지도 서비스의 안정적인 장소 ID (없으면 name|address로 대체)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl PlaceCandidate {
    pub fn new(provider: Provider, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            latitude: None,
            longitude: None,
            provider,
            external_id: None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

// ============ Backend DTOs ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    pub place: Place,
    pub existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingLot {
    pub id: Uuid,
    pub place_id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "type")]
    pub lot_type: String,
    #[serde(default)]
    pub price_info: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub place_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_type: String,
    pub parking_lot_id: Option<Uuid>,
    pub place_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parking_lot_id: Uuid,
    pub content: String,
    pub discount_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /api/place/:id
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceDetail {
    #[serde(flatten)]
    pub place: Place,
    #[serde(default)]
    pub parking_lots: Vec<ParkingLot>,
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub rating_count: i64,
}

/// GET /api/parking/:id
#[derive(Debug, Clone, Deserialize)]
pub struct ParkingLotDetail {
    #[serde(flatten)]
    pub lot: ParkingLot,
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub rating_count: i64,
    #[serde(default)]
    pub recent_reviews: Vec<Review>,
    #[serde(default)]
    pub recent_tips: Vec<Tip>,
}

/// `{data}` 응답
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// `{data, page}` 응답
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInfo {
    pub next_cursor: Option<String>,
}

/// `{error:{code,message}}` 응답
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

// ============ Parking Info ============

/// 패널에 표시할 주차 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParkingInfo {
    pub place_id: Option<Uuid>,
    pub parking_lots: Vec<ParkingLot>,
    pub reviews: Vec<Review>,
    pub tips: Vec<Tip>,
    pub average_rating: Option<f64>,
}

impl ParkingInfo {
    /// 보여줄 내용이 하나도 없는지
    pub fn is_empty(&self) -> bool {
        self.parking_lots.is_empty() && self.reviews.is_empty() && self.tips.is_empty()
    }
}

/// NULL 평점을 제외한 평균
pub fn average_rating(reviews: &[Review]) -> Option<f64> {
    let ratings: Vec<f64> = reviews
        .iter()
        .filter_map(|r| r.rating)
        .map(f64::from)
        .collect();
    (!ratings.is_empty()).then(|| ratings.iter().sum::<f64>() / ratings.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: Option<i16>) -> Review {
        Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subject_type: "place".to_string(),
            parking_lot_id: None,
            place_id: Some(Uuid::new_v4()),
            latitude: None,
            longitude: None,
            rating,
            comment: None,
            helpful_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_average_rating_skips_null() {
        let reviews = vec![review(Some(4)), review(None), review(Some(3))];
        assert_eq!(average_rating(&reviews), Some(3.5));
        assert_eq!(average_rating(&[review(None)]), None);
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn test_candidate_serializes_camel_case() {
        let mut place = PlaceCandidate::new(Provider::Naver, "테스트 장소");
        place.external_id = Some("1234567890".to_string());

        let json = serde_json::to_value(&place).unwrap();
        assert_eq!(json["provider"], "naver");
        assert_eq!(json["externalId"], "1234567890");
        assert!(json.get("address").is_none());
    }

    #[test]
    fn test_parking_lot_reads_type_field() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "place_id": null,
            "name": "B 공영주차장",
            "address": null,
            "latitude": 37.5,
            "longitude": 127.0,
            "type": "public",
            "price_info": {},
            "created_at": "2025-01-01T00:00:00Z",
            "place_name": null
        });
        let lot: ParkingLot = serde_json::from_value(json).unwrap();
        assert_eq!(lot.lot_type, "public");
    }
}
