//! Parking Info Fetcher
//!
//! 장소별 주차 정보(주차장, 리뷰, 꿀팁, 평균 평점)를 모아서 TTL 캐시에 보관.
//!
//! # Caching Strategy
//!
//! - 키: `{provider}-{externalId 또는 name}`
//! - TTL 안의 재조회는 네트워크 호출 없이 캐시 값 반환
//! - 항목은 통째로 교체만 하고 부분 수정하지 않음
//! - 실패한 조회는 캐시에 남기지 않음

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    client::{ClientError, IngestRequest, ParkingApi, ReviewParams, SearchParams},
    config::ClientConfig,
    types::{average_rating, ParkingInfo, ParkingLot, PlaceCandidate, Tip},
};

/// 좌표만 있을 때 주변 검색 반경 (미터)
const NEARBY_RADIUS_M: f64 = 500.0;

/// 꿀팁을 가져올 주차장 수 (주차장마다 상세 조회 1회)
const TIP_LOT_LIMIT: usize = 3;

struct CacheEntry {
    info: ParkingInfo,
    cached_at: Instant,
}

/// 주차 정보 조회기
pub struct ParkingInfoFetcher {
    api: Arc<dyn ParkingApi>,
    ttl: Duration,
    review_limit: u32,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

/// 캐시 키
pub fn cache_key(place: &PlaceCandidate) -> String {
    let id = place
        .external_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(&place.name);
    format!("{}-{}", place.provider, id)
}

impl ParkingInfoFetcher {
    pub fn new(api: Arc<dyn ParkingApi>, config: &ClientConfig) -> Self {
        Self {
            api,
            ttl: config.cache_ttl,
            review_limit: config.review_page_size,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 주차 정보 조회 (캐시 우선)
    pub async fn fetch_parking_info(&self, place: &PlaceCandidate) -> Result<ParkingInfo, ClientError> {
        let key = cache_key(place);

        // 캐시 확인
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.cached_at.elapsed() < self.ttl {
                    tracing::debug!(%key, "Parking info cache hit");
                    return Ok(entry.info.clone());
                }
            }
        }

        let info = if !place.name.trim().is_empty() {
            self.fetch_by_place(place).await?
        } else if let Some((lat, lng)) = place.coordinates() {
            self.fetch_nearby(lat, lng).await?
        } else {
            return Err(ClientError::Validation(
                "place name or coordinates are required".to_string(),
            ));
        };

        // 캐시 업데이트 (만료 항목은 함께 정리)
        {
            let mut cache = self.cache.write().await;
            let ttl = self.ttl;
            cache.retain(|_, entry| entry.cached_at.elapsed() < ttl);
            cache.insert(
                key,
                CacheEntry {
                    info: info.clone(),
                    cached_at: Instant::now(),
                },
            );
        }

        Ok(info)
    }

    /// 캐시 항목 수 (마지막 삽입 이후 만료된 항목 포함)
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// ingest → 장소 상세 → 장소 리뷰 → 주차장 꿀팁
    async fn fetch_by_place(&self, place: &PlaceCandidate) -> Result<ParkingInfo, ClientError> {
        let ingested = self.api.ingest(&IngestRequest::from_candidate(place)).await?;
        let place_id = ingested.place.id;

        let detail = self.api.place_detail(place_id).await?;
        let reviews = self
            .api
            .reviews(&ReviewParams {
                place_id: Some(place_id),
                limit: Some(self.review_limit),
                ..ReviewParams::default()
            })
            .await?
            .data;
        let tips = self.collect_tips(&detail.parking_lots).await?;

        Ok(ParkingInfo {
            place_id: Some(place_id),
            average_rating: average_rating(&reviews),
            parking_lots: detail.parking_lots,
            reviews,
            tips,
        })
    }

    /// 좌표 주변 주차장 + 위치 리뷰
    async fn fetch_nearby(&self, lat: f64, lng: f64) -> Result<ParkingInfo, ClientError> {
        let parking_lots = self
            .api
            .search_parking(&SearchParams {
                lat: Some(lat),
                lng: Some(lng),
                radius: Some(NEARBY_RADIUS_M),
                ..SearchParams::default()
            })
            .await?
            .data;
        let reviews = self
            .api
            .reviews(&ReviewParams {
                lat: Some(lat),
                lng: Some(lng),
                radius: Some(NEARBY_RADIUS_M),
                limit: Some(self.review_limit),
                ..ReviewParams::default()
            })
            .await?
            .data;
        let tips = self.collect_tips(&parking_lots).await?;

        Ok(ParkingInfo {
            place_id: None,
            average_rating: average_rating(&reviews),
            parking_lots,
            reviews,
            tips,
        })
    }

    async fn collect_tips(&self, lots: &[ParkingLot]) -> Result<Vec<Tip>, ClientError> {
        let mut tips = Vec::new();
        for id in lots.iter().take(TIP_LOT_LIMIT).map(|l| l.id) {
            tips.extend(self.lot_tips(id).await?);
        }
        Ok(tips)
    }

    async fn lot_tips(&self, lot_id: Uuid) -> Result<Vec<Tip>, ClientError> {
        Ok(self.api.parking_detail(lot_id).await?.recent_tips)
    }
}
