//! In-memory `ParkingStore`
//!
//! `STORE=memory`로 DB 없이 서버를 띄우거나 라우트 테스트에 사용.
//! 모든 쓰기는 하나의 write lock 안에서 일어나므로 ingest 확인+생성이 원자적임.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::repository::ParkingStore;
use crate::types::now_micros;

#[derive(Default)]
struct Tables {
    places: HashMap<Uuid, Place>,
    /// (provider, external_place_id) → 연결
    links: HashMap<(String, String), PlaceLink>,
    aliases: Vec<PlaceAlias>,
    parking_lots: HashMap<Uuid, ParkingLot>,
    reviews: HashMap<Uuid, Review>,
    helpfuls: HashSet<(Uuid, Uuid)>,
    tips: Vec<Tip>,
    tokens: HashMap<String, TokenRecord>,
}

impl Tables {
    fn with_place_name(&self, lot: &ParkingLot) -> ParkingLot {
        let mut lot = lot.clone();
        lot.place_name = lot
            .place_id
            .and_then(|id| self.places.get(&id))
            .map(|p| p.name.clone());
        lot
    }

    fn record_alias(&mut self, place: &Place, input: &NewPlaceLink) {
        if place.name == input.name {
            return;
        }
        let exists = self
            .aliases
            .iter()
            .any(|a| a.place_id == place.id && a.alias == input.name);
        if !exists {
            self.aliases.push(PlaceAlias {
                id: Uuid::new_v4(),
                place_id: place.id,
                alias: input.name.clone(),
                provider: Some(input.provider.as_str().to_string()),
                created_at: now_micros(),
            });
        }
    }
}

/// 최신순 (created_at DESC, id DESC)
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// 인메모리 저장소
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParkingStore for MemoryStore {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn ingest_place(&self, input: &NewPlaceLink) -> Result<IngestOutcome> {
        let mut tables = self.tables.write().await;
        let key = (
            input.provider.as_str().to_string(),
            input.external_place_id.clone(),
        );

        if let Some(link) = tables.links.get(&key) {
            if let Some(place) = tables.places.get(&link.place_id).cloned() {
                tables.record_alias(&place, input);
                return Ok(IngestOutcome { place, existing: true });
            }
        }

        let place = Place {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            address: input.address.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            created_at: now_micros(),
        };

        tables.places.insert(place.id, place.clone());
        tables.links.insert(
            key,
            PlaceLink {
                id: Uuid::new_v4(),
                place_id: place.id,
                provider: input.provider.as_str().to_string(),
                external_place_id: input.external_place_id.clone(),
            },
        );

        Ok(IngestOutcome { place, existing: false })
    }

    async fn get_place(&self, id: Uuid) -> Result<Option<Place>> {
        Ok(self.tables.read().await.places.get(&id).cloned())
    }

    async fn list_place_links(&self, place_id: Uuid) -> Result<Vec<PlaceLink>> {
        let tables = self.tables.read().await;
        let mut links: Vec<PlaceLink> = tables
            .links
            .values()
            .filter(|l| l.place_id == place_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| {
            (a.provider.as_str(), a.external_place_id.as_str())
                .cmp(&(b.provider.as_str(), b.external_place_id.as_str()))
        });
        Ok(links)
    }

    async fn list_place_aliases(&self, place_id: Uuid) -> Result<Vec<PlaceAlias>> {
        let tables = self.tables.read().await;
        Ok(tables
            .aliases
            .iter()
            .filter(|a| a.place_id == place_id)
            .cloned()
            .collect())
    }

    async fn insert_parking_lot(&self, input: &NewParkingLot) -> Result<ParkingLot> {
        let mut tables = self.tables.write().await;
        let lot = ParkingLot {
            id: Uuid::new_v4(),
            place_id: input.place_id,
            name: input.name.clone(),
            address: input.address.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            lot_type: input.lot_type.as_str().to_string(),
            price_info: input.price_info.clone(),
            created_at: now_micros(),
            place_name: None,
        };
        tables.parking_lots.insert(lot.id, lot.clone());
        Ok(tables.with_place_name(&lot))
    }

    async fn get_parking_lot(&self, id: Uuid) -> Result<Option<ParkingLot>> {
        let tables = self.tables.read().await;
        Ok(tables.parking_lots.get(&id).map(|l| tables.with_place_name(l)))
    }

    async fn list_parking_lots_for_place(&self, place_id: Uuid) -> Result<Vec<ParkingLot>> {
        let tables = self.tables.read().await;
        let mut lots: Vec<ParkingLot> = tables
            .parking_lots
            .values()
            .filter(|l| l.place_id == Some(place_id))
            .map(|l| tables.with_place_name(l))
            .collect();
        newest_first(&mut lots, |l| (l.created_at, l.id));
        Ok(lots)
    }

    async fn search_parking_lots(&self, search: &ParkingSearch) -> Result<Vec<ParkingLot>> {
        let tables = self.tables.read().await;
        let needle = search.text.as_ref().map(|t| t.to_lowercase());

        let mut lots: Vec<ParkingLot> = tables
            .parking_lots
            .values()
            .filter(|lot| match &needle {
                Some(n) => {
                    lot.name.to_lowercase().contains(n)
                        || lot
                            .address
                            .as_ref()
                            .is_some_and(|a| a.to_lowercase().contains(n))
                }
                None => true,
            })
            .filter(|lot| match (&search.bbox, lot.latitude, lot.longitude) {
                (Some(bbox), Some(lat), Some(lng)) => bbox.contains(lat, lng),
                (Some(_), _, _) => false,
                (None, _, _) => true,
            })
            .filter(|lot| {
                search
                    .cursor
                    .map_or(true, |c| c.precedes(lot.created_at, lot.id))
            })
            .map(|lot| tables.with_place_name(lot))
            .collect();

        newest_first(&mut lots, |l| (l.created_at, l.id));
        lots.truncate(search.limit as usize);
        Ok(lots)
    }

    async fn insert_review(&self, input: &NewReview) -> Result<Review> {
        let (parking_lot_id, place_id, latitude, longitude) = match input.target {
            ReviewTarget::ParkingLot(id) => (Some(id), None, None, None),
            ReviewTarget::Place(id) => (None, Some(id), None, None),
            ReviewTarget::Location { latitude, longitude } => {
                (None, None, Some(latitude), Some(longitude))
            }
        };

        let review = Review {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            subject_type: input.target.subject_type().as_str().to_string(),
            parking_lot_id,
            place_id,
            latitude,
            longitude,
            rating: input.rating,
            comment: input.comment.clone(),
            helpful_count: 0,
            created_at: now_micros(),
        };

        self.tables
            .write()
            .await
            .reviews
            .insert(review.id, review.clone());
        Ok(review)
    }

    async fn review_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.read().await.reviews.contains_key(&id))
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>> {
        let tables = self.tables.read().await;

        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| match query.filter {
                ReviewFilter::All => true,
                ReviewFilter::ParkingLot(id) => r.parking_lot_id == Some(id),
                ReviewFilter::Place(id) => r.place_id == Some(id),
                ReviewFilter::Near(bbox) => {
                    r.subject_type == "location"
                        && matches!((r.latitude, r.longitude), (Some(lat), Some(lng)) if bbox.contains(lat, lng))
                }
            })
            .filter(|r| query.cursor.map_or(true, |c| c.precedes(r.created_at, r.id)))
            .cloned()
            .collect();

        newest_first(&mut reviews, |r| (r.created_at, r.id));
        match query.sort {
            ReviewSort::CreatedDesc => {}
            // NULL 평점은 맨 뒤 (sort_by는 안정 정렬이라 동점은 최신순 유지)
            ReviewSort::RatingDesc => reviews.sort_by(|a, b| b.rating.cmp(&a.rating)),
            ReviewSort::HelpfulDesc => reviews.sort_by(|a, b| b.helpful_count.cmp(&a.helpful_count)),
        }

        reviews.truncate(query.limit as usize);
        Ok(reviews)
    }

    async fn rating_stats(&self, subject: RatingSubject) -> Result<RatingStats> {
        let tables = self.tables.read().await;
        let ratings = tables
            .reviews
            .values()
            .filter(|r| match subject {
                RatingSubject::ParkingLot(id) => r.parking_lot_id == Some(id),
                RatingSubject::Place(id) => r.place_id == Some(id),
            })
            .filter_map(|r| r.rating);

        Ok(RatingStats::from_ratings(ratings))
    }

    async fn mark_helpful(&self, review_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.helpfuls.insert((review_id, user_id)) {
            return Ok(false);
        }
        if let Some(review) = tables.reviews.get_mut(&review_id) {
            review.helpful_count += 1;
        }
        Ok(true)
    }

    async fn unmark_helpful(&self, review_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.helpfuls.remove(&(review_id, user_id)) {
            return Ok(false);
        }
        if let Some(review) = tables.reviews.get_mut(&review_id) {
            review.helpful_count = (review.helpful_count - 1).max(0);
        }
        Ok(true)
    }

    async fn insert_tip(&self, input: &NewTip) -> Result<Tip> {
        let tip = Tip {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            parking_lot_id: input.parking_lot_id,
            content: input.content.clone(),
            discount_info: input.discount_info.clone(),
            created_at: now_micros(),
        };
        self.tables.write().await.tips.push(tip.clone());
        Ok(tip)
    }

    async fn list_tips(&self, parking_lot_id: Uuid, limit: u32) -> Result<Vec<Tip>> {
        let tables = self.tables.read().await;
        let mut tips: Vec<Tip> = tables
            .tips
            .iter()
            .filter(|t| t.parking_lot_id == parking_lot_id)
            .cloned()
            .collect();
        newest_first(&mut tips, |t| (t.created_at, t.id));
        tips.truncate(limit as usize);
        Ok(tips)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tables.read().await.tokens.get(token_hash).cloned())
    }

    async fn upsert_token(&self, token_hash: &str, user_id: Uuid, role: Role) -> Result<()> {
        self.tables.write().await.tokens.insert(
            token_hash.to_string(),
            TokenRecord {
                user_id,
                role: role.as_str().to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LotType, Provider};

    fn naver(external_id: &str, name: &str) -> NewPlaceLink {
        NewPlaceLink {
            provider: Provider::Naver,
            external_place_id: external_id.to_string(),
            name: name.to_string(),
            address: None,
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    async fn test_ingest_reuses_linked_place() {
        let store = MemoryStore::new();

        let first = store.ingest_place(&naver("123", "Test Lot")).await.unwrap();
        let second = store.ingest_place(&naver("123", "Test Lot")).await.unwrap();

        assert!(!first.existing);
        assert!(second.existing);
        assert_eq!(first.place.id, second.place.id);
    }

    #[tokio::test]
    async fn test_ingest_records_alias_for_new_name() {
        let store = MemoryStore::new();

        let first = store.ingest_place(&naver("123", "스타벅스 강남점")).await.unwrap();
        store.ingest_place(&naver("123", "Starbucks Gangnam")).await.unwrap();
        store.ingest_place(&naver("123", "Starbucks Gangnam")).await.unwrap();

        let aliases = store.list_place_aliases(first.place.id).await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].alias, "Starbucks Gangnam");
    }

    #[tokio::test]
    async fn test_helpful_count_never_negative() {
        let store = MemoryStore::new();
        let lot = store
            .insert_parking_lot(&NewParkingLot {
                place_id: None,
                name: "B 공영주차장".to_string(),
                address: None,
                latitude: None,
                longitude: None,
                lot_type: LotType::Public,
                price_info: serde_json::json!({}),
            })
            .await
            .unwrap();
        let review = store
            .insert_review(&NewReview {
                user_id: Uuid::new_v4(),
                target: ReviewTarget::ParkingLot(lot.id),
                rating: Some(4),
                comment: None,
            })
            .await
            .unwrap();
        let user = Uuid::new_v4();

        assert!(store.mark_helpful(review.id, user).await.unwrap());
        assert!(!store.mark_helpful(review.id, user).await.unwrap());
        assert!(store.unmark_helpful(review.id, user).await.unwrap());
        assert!(!store.unmark_helpful(review.id, user).await.unwrap());

        let reviews = store
            .list_reviews(&ReviewQuery {
                filter: ReviewFilter::ParkingLot(lot.id),
                sort: ReviewSort::CreatedDesc,
                cursor: None,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(reviews[0].helpful_count, 0);
    }
}
