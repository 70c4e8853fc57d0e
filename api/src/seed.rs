//! Parking Lot Seeding
//!
//! 주차장 데이터는 API로 만들 수 없으므로 JSON 파일에서 일괄 등록함.
//!
//! ```json
//! [
//!   { "name": "B 공영주차장", "address": "서울 강남구 테스트로 1",
//!     "latitude": 37.5, "longitude": 127.0, "type": "public",
//!     "price_info": { "base": "30분 1000원" } }
//! ]
//! ```
//!
//! 같은 주소가 파일 안에 여러 번 나오면 첫 항목만 등록함.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{NewParkingLot, ParkingStore},
    types::{is_valid_latitude, is_valid_longitude, LotType},
};

/// 파일 한 항목
#[derive(Debug, Deserialize)]
pub struct SeedLot {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "type")]
    pub lot_type: LotType,
    #[serde(default)]
    pub price_info: Option<serde_json::Value>,
    /// 이미 ingest된 장소에 연결할 때
    #[serde(default)]
    pub place_id: Option<Uuid>,
}

/// 시딩 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// JSON 배열을 검증해 등록할 주차장 목록으로 변환
pub fn parse_lots(json: &str) -> Result<(Vec<NewParkingLot>, usize)> {
    let raw: Vec<SeedLot> = serde_json::from_str(json).context("Invalid seed file")?;

    let mut seen = HashSet::new();
    let mut lots = Vec::with_capacity(raw.len());
    let mut duplicates = 0;

    for (index, lot) in raw.into_iter().enumerate() {
        let name = lot.name.trim().to_string();
        if name.is_empty() {
            bail!("lot #{}: name is required", index);
        }
        if lot.latitude.is_some() != lot.longitude.is_some() {
            bail!("lot #{} ({}): latitude and longitude go together", index, name);
        }
        if lot.latitude.is_some_and(|lat| !is_valid_latitude(lat))
            || lot.longitude.is_some_and(|lng| !is_valid_longitude(lng))
        {
            bail!("lot #{} ({}): latitude/longitude out of range", index, name);
        }

        let address = lot
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        if let Some(address) = &address {
            if !seen.insert(address.clone()) {
                duplicates += 1;
                continue;
            }
        }

        lots.push(NewParkingLot {
            place_id: lot.place_id,
            name,
            address,
            latitude: lot.latitude,
            longitude: lot.longitude,
            lot_type: lot.lot_type,
            price_info: lot.price_info.unwrap_or_else(|| serde_json::json!({})),
        });
    }

    Ok((lots, duplicates))
}

/// 파일 내용을 저장소에 등록
pub async fn seed_lots(store: &dyn ParkingStore, json: &str) -> Result<SeedReport> {
    let (lots, skipped) = parse_lots(json)?;

    let mut report = SeedReport {
        inserted: 0,
        skipped,
    };
    for lot in &lots {
        let saved = store
            .insert_parking_lot(lot)
            .await
            .with_context(|| format!("Failed to insert parking lot {}", lot.name))?;
        tracing::debug!(id = %saved.id, name = %saved.name, "Parking lot seeded");
        report.inserted += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, ParkingSearch};
    use crate::types::BoundingBox;

    const LOTS: &str = r#"[
        { "name": "B 공영주차장", "address": "서울 강남구 테스트로 1",
          "latitude": 37.5, "longitude": 127.0, "type": "public",
          "price_info": { "base": "30분 1000원" } },
        { "name": "  C 민영주차장 ", "type": "private" },
        { "name": "B 공영주차장 (중복)", "address": " 서울 강남구 테스트로 1 ",
          "latitude": 37.5, "longitude": 127.0, "type": "public" }
    ]"#;

    #[test]
    fn test_parse_lots_trims_and_dedupes_address() {
        let (lots, duplicates) = parse_lots(LOTS).unwrap();

        assert_eq!(lots.len(), 2);
        assert_eq!(duplicates, 1);
        assert_eq!(lots[1].name, "C 민영주차장");
        assert_eq!(lots[1].lot_type, LotType::Private);
        assert_eq!(lots[1].price_info, serde_json::json!({}));
    }

    #[test]
    fn test_parse_lots_rejects_bad_entries() {
        assert!(parse_lots(r#"[{ "name": " ", "type": "public" }]"#).is_err());
        assert!(parse_lots(r#"[{ "name": "A", "type": "valet" }]"#).is_err());
        assert!(parse_lots(r#"[{ "name": "A", "type": "public", "latitude": 37.5 }]"#).is_err());
        assert!(parse_lots(
            r#"[{ "name": "A", "type": "public", "latitude": 91.0, "longitude": 127.0 }]"#
        )
        .is_err());
        assert!(parse_lots("{}").is_err());
    }

    #[tokio::test]
    async fn test_seeded_lots_are_searchable() {
        let store = MemoryStore::new();

        let report = seed_lots(&store, LOTS).await.unwrap();
        assert_eq!(report, SeedReport { inserted: 2, skipped: 1 });

        let nearby = store
            .search_parking_lots(&ParkingSearch {
                bbox: Some(BoundingBox::around(37.5, 127.0, 500.0)),
                limit: 20,
                ..ParkingSearch::default()
            })
            .await
            .unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].name, "B 공영주차장");
    }

    #[tokio::test]
    async fn test_invalid_file_inserts_nothing() {
        let store = MemoryStore::new();
        let json = r#"[
            { "name": "A", "type": "public" },
            { "name": "", "type": "public" }
        ]"#;

        assert!(seed_lots(&store, json).await.is_err());
        let all = store
            .search_parking_lots(&ParkingSearch { limit: 20, ..ParkingSearch::default() })
            .await
            .unwrap();
        assert!(all.is_empty());
    }
}
