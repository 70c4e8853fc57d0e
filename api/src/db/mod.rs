//! Database Module
//!
//! PostgreSQL(SQLx) 구현과 인메모리 구현이 같은 `ParkingStore` trait을 제공함.
//!
//! # Connection Pool
//!
//! - max_connections: 10
//! - min_connections: 1
//! - acquire_timeout: 3초
//!
//! # Ingest 동시성
//!
//! (provider, external_place_id) UNIQUE 제약 + `ON CONFLICT DO NOTHING`을
//! 한 트랜잭션 안에서 사용. 같은 외부 ID를 동시에 ingest하면 늦은 쪽은
//! 장소 생성을 롤백하고 먼저 커밋된 장소를 `existing: true`로 받음.

mod memory;
mod models;
mod repository;

pub use memory::MemoryStore;
pub use models::*;
pub use repository::ParkingStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const PLACE_COLUMNS: &str = "id, name, address, latitude, longitude, created_at";

const REVIEW_COLUMNS: &str = "id, user_id, subject_type, parking_lot_id, place_id, \
     latitude, longitude, rating, comment, helpful_count, created_at";

const TIP_COLUMNS: &str = "id, user_id, parking_lot_id, content, discount_info, created_at";

/// 주차장 + 연결된 장소 이름
const PARKING_LOT_SELECT: &str = "SELECT l.id, l.place_id, l.name, l.address, l.latitude, \
     l.longitude, l.type, l.price_info, l.created_at, p.name AS place_name \
     FROM parking_lots l LEFT JOIN places p ON p.id = l.place_id";

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

/// LIKE 패턴 특수문자 이스케이프 (기본 이스케이프 문자 '\')
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

async fn find_linked_place<'e, E>(
    executor: E,
    provider: &str,
    external_place_id: &str,
) -> sqlx::Result<Option<Place>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Place>(
        r#"
        SELECT p.id, p.name, p.address, p.latitude, p.longitude, p.created_at
        FROM place_links pl
        JOIN places p ON p.id = pl.place_id
        WHERE pl.provider = $1 AND pl.external_place_id = $2
        "#,
    )
    .bind(provider)
    .bind(external_place_id)
    .fetch_optional(executor)
    .await
}

async fn record_alias<'e, E>(executor: E, place: &Place, input: &NewPlaceLink) -> sqlx::Result<()>
where
    E: PgExecutor<'e>,
{
    if place.name == input.name {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO place_aliases (place_id, alias, provider)
        VALUES ($1, $2, $3)
        ON CONFLICT (place_id, alias) DO NOTHING
        "#,
    )
    .bind(place.id)
    .bind(&input.name)
    .bind(input.provider.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl ParkingStore for Database {
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ingest_place(&self, input: &NewPlaceLink) -> Result<IngestOutcome> {
        let provider = input.provider.as_str();
        let mut tx = self.pool.begin().await?;

        if let Some(place) = find_linked_place(&mut *tx, provider, &input.external_place_id).await? {
            record_alias(&mut *tx, &place, input).await?;
            tx.commit().await?;
            return Ok(IngestOutcome { place, existing: true });
        }

        let place = sqlx::query_as::<_, Place>(&format!(
            r#"
            INSERT INTO places (name, address, latitude, longitude)
            VALUES ($1, $2, $3, $4)
            RETURNING {PLACE_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .fetch_one(&mut *tx)
        .await?;

        let linked: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO place_links (place_id, provider, external_place_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, external_place_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(place.id)
        .bind(provider)
        .bind(&input.external_place_id)
        .fetch_optional(&mut *tx)
        .await?;

        if linked.is_some() {
            tx.commit().await?;
            tracing::info!(
                place_id = %place.id,
                provider,
                external_place_id = %input.external_place_id,
                "Place created"
            );
            return Ok(IngestOutcome { place, existing: false });
        }

        // 동시 요청이 먼저 연결을 만듦 → 방금 만든 장소는 버리고 그쪽을 사용
        tx.rollback().await?;
        tracing::debug!(provider, external_place_id = %input.external_place_id, "Lost ingest race");

        let place = find_linked_place(&self.pool, provider, &input.external_place_id)
            .await?
            .context("place link disappeared after conflict")?;
        record_alias(&self.pool, &place, input).await?;

        Ok(IngestOutcome { place, existing: true })
    }

    async fn get_place(&self, id: Uuid) -> Result<Option<Place>> {
        let place = sqlx::query_as::<_, Place>(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(place)
    }

    async fn list_place_links(&self, place_id: Uuid) -> Result<Vec<PlaceLink>> {
        let links = sqlx::query_as::<_, PlaceLink>(
            r#"
            SELECT id, place_id, provider, external_place_id
            FROM place_links
            WHERE place_id = $1
            ORDER BY provider, external_place_id
            "#,
        )
        .bind(place_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    async fn list_place_aliases(&self, place_id: Uuid) -> Result<Vec<PlaceAlias>> {
        let aliases = sqlx::query_as::<_, PlaceAlias>(
            r#"
            SELECT id, place_id, alias, provider, created_at
            FROM place_aliases
            WHERE place_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(place_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(aliases)
    }

    async fn insert_parking_lot(&self, input: &NewParkingLot) -> Result<ParkingLot> {
        let lot = sqlx::query_as::<_, ParkingLot>(
            r#"
            WITH inserted AS (
                INSERT INTO parking_lots (place_id, name, address, latitude, longitude, type, price_info)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT i.id, i.place_id, i.name, i.address, i.latitude, i.longitude,
                   i.type, i.price_info, i.created_at, p.name AS place_name
            FROM inserted i
            LEFT JOIN places p ON p.id = i.place_id
            "#,
        )
        .bind(input.place_id)
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.lot_type.as_str())
        .bind(&input.price_info)
        .fetch_one(&self.pool)
        .await?;

        Ok(lot)
    }

    async fn get_parking_lot(&self, id: Uuid) -> Result<Option<ParkingLot>> {
        let lot = sqlx::query_as::<_, ParkingLot>(&format!("{PARKING_LOT_SELECT} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lot)
    }

    async fn list_parking_lots_for_place(&self, place_id: Uuid) -> Result<Vec<ParkingLot>> {
        let lots = sqlx::query_as::<_, ParkingLot>(&format!(
            "{PARKING_LOT_SELECT} WHERE l.place_id = $1 ORDER BY l.created_at DESC, l.id DESC"
        ))
        .bind(place_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lots)
    }

    async fn search_parking_lots(&self, search: &ParkingSearch) -> Result<Vec<ParkingLot>> {
        let mut qb = QueryBuilder::<Postgres>::new(PARKING_LOT_SELECT);
        qb.push(" WHERE TRUE");

        if let Some(text) = &search.text {
            let pattern = like_pattern(text);
            qb.push(" AND (l.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR l.address ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(bbox) = &search.bbox {
            qb.push(" AND l.latitude BETWEEN ")
                .push_bind(bbox.min_lat)
                .push(" AND ")
                .push_bind(bbox.max_lat)
                .push(" AND l.longitude BETWEEN ")
                .push_bind(bbox.min_lng)
                .push(" AND ")
                .push_bind(bbox.max_lng);
        }

        if let Some(cursor) = &search.cursor {
            qb.push(" AND (l.created_at, l.id) < (")
                .push_bind(cursor.created_at)
                .push(", ")
                .push_bind(cursor.id)
                .push(")");
        }

        qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
            .push_bind(search.limit as i64);

        let lots = qb
            .build_query_as::<ParkingLot>()
            .fetch_all(&self.pool)
            .await?;

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

        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews (
                user_id, subject_type, parking_lot_id, place_id,
                latitude, longitude, rating, comment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(input.user_id)
        .bind(input.target.subject_type().as_str())
        .bind(parking_lot_id)
        .bind(place_id)
        .bind(latitude)
        .bind(longitude)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    async fn review_exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE TRUE"
        ));

        match query.filter {
            ReviewFilter::All => {}
            ReviewFilter::ParkingLot(id) => {
                qb.push(" AND parking_lot_id = ").push_bind(id);
            }
            ReviewFilter::Place(id) => {
                qb.push(" AND place_id = ").push_bind(id);
            }
            ReviewFilter::Near(bbox) => {
                qb.push(" AND subject_type = 'location' AND latitude BETWEEN ")
                    .push_bind(bbox.min_lat)
                    .push(" AND ")
                    .push_bind(bbox.max_lat)
                    .push(" AND longitude BETWEEN ")
                    .push_bind(bbox.min_lng)
                    .push(" AND ")
                    .push_bind(bbox.max_lng);
            }
        }

        if let Some(cursor) = &query.cursor {
            qb.push(" AND (created_at, id) < (")
                .push_bind(cursor.created_at)
                .push(", ")
                .push_bind(cursor.id)
                .push(")");
        }

        qb.push(match query.sort {
            ReviewSort::CreatedDesc => " ORDER BY created_at DESC, id DESC",
            ReviewSort::RatingDesc => " ORDER BY rating DESC NULLS LAST, created_at DESC, id DESC",
            ReviewSort::HelpfulDesc => " ORDER BY helpful_count DESC, created_at DESC, id DESC",
        });

        qb.push(" LIMIT ").push_bind(query.limit as i64);

        let reviews = qb
            .build_query_as::<Review>()
            .fetch_all(&self.pool)
            .await?;

        Ok(reviews)
    }

    async fn rating_stats(&self, subject: RatingSubject) -> Result<RatingStats> {
        let (column, id) = match subject {
            RatingSubject::ParkingLot(id) => ("parking_lot_id", id),
            RatingSubject::Place(id) => ("place_id", id),
        };

        let (average_rating, rating_count): (Option<f64>, i64) = sqlx::query_as(&format!(
            "SELECT AVG(rating)::float8, COUNT(rating) FROM reviews WHERE {column} = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingStats { average_rating, rating_count })
    }

    async fn mark_helpful(&self, review_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO review_helpfuls (review_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (review_id, user_id) DO NOTHING
            "#,
        )
        .bind(review_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            sqlx::query("UPDATE reviews SET helpful_count = helpful_count + 1 WHERE id = $1")
                .bind(review_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn unmark_helpful(&self, review_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM review_helpfuls WHERE review_id = $1 AND user_id = $2")
            .bind(review_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if deleted {
            sqlx::query(
                "UPDATE reviews SET helpful_count = GREATEST(helpful_count - 1, 0) WHERE id = $1",
            )
            .bind(review_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn insert_tip(&self, input: &NewTip) -> Result<Tip> {
        let tip = sqlx::query_as::<_, Tip>(&format!(
            r#"
            INSERT INTO tips (user_id, parking_lot_id, content, discount_info)
            VALUES ($1, $2, $3, $4)
            RETURNING {TIP_COLUMNS}
            "#
        ))
        .bind(input.user_id)
        .bind(input.parking_lot_id)
        .bind(&input.content)
        .bind(&input.discount_info)
        .fetch_one(&self.pool)
        .await?;

        Ok(tip)
    }

    async fn list_tips(&self, parking_lot_id: Uuid, limit: u32) -> Result<Vec<Tip>> {
        let tips = sqlx::query_as::<_, Tip>(&format!(
            r#"
            SELECT {TIP_COLUMNS}
            FROM tips
            WHERE parking_lot_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(parking_lot_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(tips)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT user_id, role FROM api_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert_token(&self, token_hash: &str, user_id: Uuid, role: Role) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens (token_hash, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_hash)
            DO UPDATE SET user_id = EXCLUDED.user_id, role = EXCLUDED.role
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
