//! Runtime Messages
//!
//! 확장 프로그램 구성 요소(팝업, 백그라운드, 콘텐츠) 사이에 오가는 JSON 메시지.
//! `type` 필드로 구분함.
//!
//! ```json
//! { "type": "GET_CURRENT_PLACE" }
//! { "type": "GET_DATA", "placeId": "..." }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::PlaceCandidate;

/// 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    /// 팝업 → 콘텐츠: 현재 장소 요청
    GetCurrentPlace,
    /// 팝업 → 콘텐츠: 상세 패널 표시
    ShowParkingDetails,
    /// 팝업 → 콘텐츠: 리뷰 작성 대상 요청
    ShowReviewForm,
    /// 콘텐츠 → 백그라운드: 장소 감지 알림
    PlaceDetected { place: DetectedPlace },
    /// 백그라운드 → 콘텐츠: 지도 페이지 진입
    MapDetected,
    /// 백그라운드 → 콘텐츠: 주차 정보 다시 조회
    FetchPlaceData { place: PlaceRef },
    /// 콘텐츠 → 백그라운드: 저장된 데이터 조회
    GetData {
        #[serde(rename = "placeId")]
        place_id: String,
    },
    /// 콘텐츠 → 백그라운드: 데이터 저장
    SaveData { key: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPlace {
    pub id: String,
    pub service: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRef {
    pub id: String,
}

/// 응답: `{success, data|error}` 또는 `{place}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageResponse {
    Place {
        place: Option<PlaceCandidate>,
    },
    Outcome {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl MessageResponse {
    pub fn ok(data: Option<Value>) -> Self {
        MessageResponse::Outcome {
            success: true,
            data,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        MessageResponse::Outcome {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl RuntimeMessage {
    /// 감지된 장소를 백그라운드 알림으로 변환
    pub fn place_detected(place: &PlaceCandidate, key: &str, url: &str) -> Self {
        RuntimeMessage::PlaceDetected {
            place: DetectedPlace {
                id: key.to_string(),
                service: place.provider.as_str().to_string(),
                url: url.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_tags() {
        let msg: RuntimeMessage = serde_json::from_value(json!({ "type": "GET_CURRENT_PLACE" })).unwrap();
        assert_eq!(msg, RuntimeMessage::GetCurrentPlace);

        let msg: RuntimeMessage =
            serde_json::from_value(json!({ "type": "GET_DATA", "placeId": "abc" })).unwrap();
        assert_eq!(msg, RuntimeMessage::GetData { place_id: "abc".to_string() });

        let json = serde_json::to_value(RuntimeMessage::FetchPlaceData {
            place: PlaceRef { id: "1".to_string() },
        })
        .unwrap();
        assert_eq!(json, json!({ "type": "FETCH_PLACE_DATA", "place": { "id": "1" } }));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_value::<RuntimeMessage>(json!({ "type": "SEARCH_PARKING" })).is_err());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            serde_json::to_value(MessageResponse::ok(Some(json!(1)))).unwrap(),
            json!({ "success": true, "data": 1 })
        );
        assert_eq!(
            serde_json::to_value(MessageResponse::error("nope")).unwrap(),
            json!({ "success": false, "error": "nope" })
        );
        assert_eq!(
            serde_json::to_value(MessageResponse::Place { place: None }).unwrap(),
            json!({ "place": null })
        );
    }
}
