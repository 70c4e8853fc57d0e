//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//! (응답 래퍼, Provider/SubjectType, 커서, 위치 범위 계산)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 성공 응답 래퍼 `{ "data": ... }`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// 커서 페이지네이션 응답 `{ "data": [...], "page": { "next_cursor": ... } }`
#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub page: PageInfo,
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub next_cursor: Option<String>,
}

/// 지도 서비스 제공자
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

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "naver" => Some(Provider::Naver),
            "kakao" => Some(Provider::Kakao),
            "google" => Some(Provider::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 리뷰 대상 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    ParkingLot,
    Place,
    Location,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::ParkingLot => "parking_lot",
            SubjectType::Place => "place",
            SubjectType::Location => "location",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parking_lot" => Some(SubjectType::ParkingLot),
            "place" => Some(SubjectType::Place),
            "location" => Some(SubjectType::Location),
            _ => None,
        }
    }
}

/// 주차장 운영 형태 (공영/민영)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotType {
    Public,
    Private,
}

impl LotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotType::Public => "public",
            LotType::Private => "private",
        }
    }
}

// ============ Pagination ============

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 50;

/// limit 파라미터 정규화 (기본 20, 1..=50)
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// (created_at, id) 복합 커서
///
/// 문자열 형식: `"{created_at 마이크로초}_{id}"`
/// 정렬 순서는 항상 `created_at DESC, id DESC` 이므로
/// 다음 페이지는 커서보다 "작은" 행들
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn encode(&self) -> String {
        format!("{}_{}", self.created_at.timestamp_micros(), self.id)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (ts, id) = raw.split_once('_')?;
        let micros: i64 = ts.parse().ok()?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros)?;
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { created_at, id })
    }

    /// 정렬 키가 커서 뒤(다음 페이지)에 위치하는지
    pub fn precedes(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        (created_at, id) < (self.created_at, self.id)
    }
}

/// 한 페이지가 꽉 찼을 때만 다음 커서 생성
pub fn next_cursor<T>(rows: &[T], limit: u32, key: impl Fn(&T) -> Cursor) -> Option<String> {
    if rows.len() == limit as usize {
        rows.last().map(|row| key(row).encode())
    } else {
        None
    }
}

/// 저장 시각은 마이크로초 단위로 잘라 커서와 정확히 일치시킴 (PostgreSQL TIMESTAMPTZ 정밀도)
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::<Utc>::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

// ============ Location ============

/// 반경 기본값 (미터)
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 1000.0;
pub const DEFAULT_REVIEW_RADIUS_M: f64 = 500.0;
pub const MIN_RADIUS_M: f64 = 100.0;
pub const MAX_RADIUS_M: f64 = 10_000.0;

/// 1도 ≈ 111km (근사치, 측지학적으로 정확하지 않음)
const KM_PER_DEGREE: f64 = 111.0;

/// 위도/경도 사각 범위
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// 중심 좌표와 반경(미터)으로 대략적인 범위 계산
    pub fn around(lat: f64, lng: f64, radius_m: f64) -> Self {
        let radius_km = radius_m.clamp(MIN_RADIUS_M, MAX_RADIUS_M) / 1000.0;
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lng_delta = radius_km / (KM_PER_DEGREE * lat.to_radians().cos());

        Self {
            min_lat: lat - lat_delta,
            max_lat: lat + lat_delta,
            min_lng: lng - lng_delta,
            max_lng: lng + lng_delta,
        }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng)
}
