//! Database Models
//!
//! Row types for places, parking lots, reviews and tips, plus the
//! write/query inputs the store accepts. Enum-like columns are kept as
//! TEXT and validated at the handler boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{BoundingBox, Cursor, Provider, SubjectType};

/// 중복 제거된 장소
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Place {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// 지도 서비스 ID ↔ 장소 연결 (provider, external_place_id 유일)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlaceLink {
    pub id: Uuid,
    pub place_id: Uuid,
    pub provider: String,
    pub external_place_id: String,
}

/// 장소 별칭 (지도마다 다른 이름)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlaceAlias {
    pub id: Uuid,
    pub place_id: Uuid,
    pub alias: String,
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 주차장
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParkingLot {
    pub id: Uuid,
    pub place_id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// public | private
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub lot_type: String,
    /// 요금 정보 (자유 형식 JSON)
    pub price_info: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// 연결된 장소 이름 (조인 결과)
    pub place_name: Option<String>,
}

impl ParkingLot {
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

/// 리뷰
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    /// parking_lot | place | location
    pub subject_type: String,
    pub parking_lot_id: Option<Uuid>,
    pub place_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// 1~5
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

/// 주차 꿀팁
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tip {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parking_lot_id: Uuid,
    pub content: String,
    pub discount_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 평점 통계 (NULL 평점 제외)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatingStats {
    pub average_rating: Option<f64>,
    pub rating_count: i64,
}

impl RatingStats {
    pub fn from_ratings(ratings: impl IntoIterator<Item = i16>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), r| (sum + r as i64, count + 1));
        Self {
            average_rating: (count > 0).then(|| sum as f64 / count as f64),
            rating_count: count,
        }
    }
}

/// 인증된 사용자 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// 토큰 조회 결과
#[derive(Debug, Clone, FromRow)]
pub struct TokenRecord {
    pub user_id: Uuid,
    pub role: String,
}

// ============ Store Inputs ============

/// 장소 ingest 입력
#[derive(Debug, Clone)]
pub struct NewPlaceLink {
    pub provider: Provider,
    pub external_place_id: String,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// ingest 결과
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub place: Place,
    pub existing: bool,
}

/// 주차장 생성 입력 (데이터 적재/테스트용)
#[derive(Debug, Clone)]
pub struct NewParkingLot {
    pub place_id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lot_type: crate::types::LotType,
    pub price_info: serde_json::Value,
}

/// 리뷰 대상 (subject_type과 참조 필드를 한 번에 표현)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewTarget {
    ParkingLot(Uuid),
    Place(Uuid),
    Location { latitude: f64, longitude: f64 },
}

impl ReviewTarget {
    pub fn subject_type(&self) -> SubjectType {
        match self {
            ReviewTarget::ParkingLot(_) => SubjectType::ParkingLot,
            ReviewTarget::Place(_) => SubjectType::Place,
            ReviewTarget::Location { .. } => SubjectType::Location,
        }
    }
}

/// 리뷰 생성 입력
#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: Uuid,
    pub target: ReviewTarget,
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

/// 팁 생성 입력
#[derive(Debug, Clone)]
pub struct NewTip {
    pub user_id: Uuid,
    pub parking_lot_id: Uuid,
    pub content: String,
    pub discount_info: Option<String>,
}

/// 주차장 검색 조건
#[derive(Debug, Clone, Default)]
pub struct ParkingSearch {
    /// 이름/주소 부분 일치 (대소문자 무시)
    pub text: Option<String>,
    pub bbox: Option<BoundingBox>,
    pub cursor: Option<Cursor>,
    pub limit: u32,
}

/// 리뷰 목록 필터
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewFilter {
    All,
    ParkingLot(Uuid),
    Place(Uuid),
    /// subject_type = location 이고 범위 안에 있는 리뷰
    Near(BoundingBox),
}

/// 리뷰 정렬
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewSort {
    #[default]
    CreatedDesc,
    RatingDesc,
    HelpfulDesc,
}

impl ReviewSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_desc" => Some(ReviewSort::CreatedDesc),
            "rating_desc" => Some(ReviewSort::RatingDesc),
            "helpful_desc" => Some(ReviewSort::HelpfulDesc),
            _ => None,
        }
    }
}

/// 리뷰 목록 조회 조건
#[derive(Debug, Clone)]
pub struct ReviewQuery {
    pub filter: ReviewFilter,
    pub sort: ReviewSort,
    /// created_desc 정렬에서만 사용
    pub cursor: Option<Cursor>,
    pub limit: u32,
}

/// 평점 집계 대상
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingSubject {
    ParkingLot(Uuid),
    Place(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_stats_ignores_empty() {
        let stats = RatingStats::from_ratings(Vec::<i16>::new());
        assert_eq!(stats.average_rating, None);
        assert_eq!(stats.rating_count, 0);
    }

    #[test]
    fn test_rating_stats_average() {
        let stats = RatingStats::from_ratings([4, 3, 5]);
        assert_eq!(stats.rating_count, 3);
        assert!((stats.average_rating.unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_review_target_subject() {
        let id = Uuid::new_v4();
        assert_eq!(ReviewTarget::Place(id).subject_type(), SubjectType::Place);
        assert_eq!(
            ReviewTarget::Location { latitude: 37.5, longitude: 127.0 }.subject_type(),
            SubjectType::Location
        );
    }
}
