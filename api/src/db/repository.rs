//! Store Trait
//!
//! 핸들러는 `ParkingStore` trait에만 의존함.
//!
//! - `Database` (db/mod.rs): PostgreSQL 구현
//! - `MemoryStore` (db/memory.rs): 로컬 실행과 라우트 테스트용 인메모리 구현
//!
//! 두 구현은 같은 불변식을 지켜야 함:
//! - (provider, external_place_id)는 하나의 장소에만 연결됨
//! - helpful_count는 review_helpfuls 행 수와 함께 변하고 0 미만이 되지 않음
//! - 목록은 `created_at DESC, id DESC` 순서로 커서 페이지네이션

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::models::{
    IngestOutcome, NewParkingLot, NewPlaceLink, NewReview, NewTip, ParkingLot, ParkingSearch,
    Place, PlaceAlias, PlaceLink, RatingStats, RatingSubject, Review, ReviewQuery, Role, Tip,
    TokenRecord,
};

#[async_trait]
pub trait ParkingStore: Send + Sync {
    /// 저장소 연결 확인
    async fn health_check(&self) -> Result<()>;

    // ============ Places ============

    /// 기존 연결이 있으면 그 장소를, 없으면 장소+연결을 원자적으로 생성
    ///
    /// 기존 장소의 이름과 입력 이름이 다르면 별칭을 기록함
    async fn ingest_place(&self, input: &NewPlaceLink) -> Result<IngestOutcome>;

    async fn get_place(&self, id: Uuid) -> Result<Option<Place>>;

    async fn list_place_links(&self, place_id: Uuid) -> Result<Vec<PlaceLink>>;

    async fn list_place_aliases(&self, place_id: Uuid) -> Result<Vec<PlaceAlias>>;

    // ============ Parking Lots ============

    async fn insert_parking_lot(&self, input: &NewParkingLot) -> Result<ParkingLot>;

    async fn get_parking_lot(&self, id: Uuid) -> Result<Option<ParkingLot>>;

    async fn list_parking_lots_for_place(&self, place_id: Uuid) -> Result<Vec<ParkingLot>>;

    async fn search_parking_lots(&self, search: &ParkingSearch) -> Result<Vec<ParkingLot>>;

    // ============ Reviews ============

    async fn insert_review(&self, input: &NewReview) -> Result<Review>;

    async fn review_exists(&self, id: Uuid) -> Result<bool>;

    async fn list_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>>;

    async fn rating_stats(&self, subject: RatingSubject) -> Result<RatingStats>;

    /// 새로 표시했으면 true, 이미 표시돼 있으면 false
    async fn mark_helpful(&self, review_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// 표시를 지웠으면 true, 표시가 없었으면 false
    async fn unmark_helpful(&self, review_id: Uuid, user_id: Uuid) -> Result<bool>;

    // ============ Tips ============

    async fn insert_tip(&self, input: &NewTip) -> Result<Tip>;

    async fn list_tips(&self, parking_lot_id: Uuid, limit: u32) -> Result<Vec<Tip>>;

    // ============ Auth ============

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>>;

    /// 같은 해시가 있으면 사용자/역할을 덮어씀
    async fn upsert_token(&self, token_hash: &str, user_id: Uuid, role: Role) -> Result<()>;
}
