//! Backend API Client
//!
//! reqwest 기반 HTTP 클라이언트. `ParkingApi` trait 뒤에 두어서
//! 캐시/세션 테스트에서는 mock으로 바꿔 끼울 수 있음.
//!
//! 실패는 재시도하지 않고 `ClientError`로 그대로 올려보냄.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    identity::resolve_external_id,
    types::{
        DataEnvelope, ErrorEnvelope, IngestResult, Page, ParkingLot, ParkingLotDetail,
        PlaceCandidate, PlaceDetail, Provider, Review,
    },
};

// ============ Errors ============

/// 클라이언트 에러
#[derive(Debug, Error)]
pub enum ClientError {
    /// 요청 전에 걸러진 입력 오류
    #[error("Invalid input: {0}")]
    Validation(String),

    /// 연결 실패, 타임아웃 등
    #[error("Network error: {0}")]
    Network(String),

    /// 서버가 `{error:{code,message}}`로 응답
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// 응답 본문 파싱 실패
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn code(&self) -> &str {
        match self {
            ClientError::Validation(_) => "BAD_REQUEST",
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::Api { code, .. } => code,
            ClientError::Decode(_) => "INTERNAL",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

// ============ Requests ============

/// POST /api/place/ingest 본문
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRequest {
    pub provider: Provider,
    pub external_place_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl IngestRequest {
    pub fn new(provider: Provider, external_place_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider,
            external_place_id: external_place_id.into(),
            name: name.into(),
            address: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    pub fn with_coordinates(mut self, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    /// 감지된 장소에서 요청 생성 (외부 ID 없으면 복합 키)
    pub fn from_candidate(candidate: &PlaceCandidate) -> Self {
        Self::new(candidate.provider, resolve_external_id(candidate), candidate.name.clone())
            .with_address(candidate.address.clone())
            .with_coordinates(candidate.latitude, candidate.longitude)
    }

    /// 네트워크 호출 전 필수 필드 확인
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.external_place_id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(ClientError::Validation(
                "provider, external_place_id, and name are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// GET /api/parking/search 쿼리
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// GET /api/reviews 쿼리
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parking_lot_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

// ============ API Trait ============

/// 백엔드 API
#[async_trait]
pub trait ParkingApi: Send + Sync {
    /// 장소 생성 또는 기존 장소 반환
    async fn ingest(&self, req: &IngestRequest) -> Result<IngestResult, ClientError>;

    async fn place_detail(&self, id: Uuid) -> Result<PlaceDetail, ClientError>;

    async fn parking_detail(&self, id: Uuid) -> Result<ParkingLotDetail, ClientError>;

    async fn search_parking(&self, params: &SearchParams) -> Result<Page<ParkingLot>, ClientError>;

    async fn reviews(&self, params: &ReviewParams) -> Result<Page<Review>, ClientError>;
}

// ============ HTTP Implementation ============

/// reqwest 클라이언트
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 성공이면 본문을 T로, 실패면 `{error}` 본문을 ClientError::Api로
    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()));
        }

        let err = match serde_json::from_slice::<ErrorEnvelope>(&body) {
            Ok(envelope) => ClientError::Api {
                status: status.as_u16(),
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: "HTTP_ERROR".to_string(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unexpected status")
                    .to_string(),
            },
        };
        tracing::warn!(status = status.as_u16(), error = %err, "API request failed");
        Err(err)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.http.get(self.url(path)).send().await?;
        let envelope: DataEnvelope<T> = Self::read(resp).await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ParkingApi for ApiClient {
    async fn ingest(&self, req: &IngestRequest) -> Result<IngestResult, ClientError> {
        req.validate()?;

        let resp = self
            .http
            .post(self.url("/api/place/ingest"))
            .json(req)
            .send()
            .await?;
        let envelope: DataEnvelope<IngestResult> = Self::read(resp).await?;

        tracing::debug!(
            place_id = %envelope.data.place.id,
            existing = envelope.data.existing,
            "Place ingested"
        );
        Ok(envelope.data)
    }

    async fn place_detail(&self, id: Uuid) -> Result<PlaceDetail, ClientError> {
        self.get_data(&format!("/api/place/{}", id)).await
    }

    async fn parking_detail(&self, id: Uuid) -> Result<ParkingLotDetail, ClientError> {
        self.get_data(&format!("/api/parking/{}", id)).await
    }

    async fn search_parking(&self, params: &SearchParams) -> Result<Page<ParkingLot>, ClientError> {
        let resp = self
            .http
            .get(self.url("/api/parking/search"))
            .query(params)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn reviews(&self, params: &ReviewParams) -> Result<Page<Review>, ClientError> {
        let resp = self
            .http
            .get(self.url("/api/reviews"))
            .query(params)
            .send()
            .await?;
        Self::read(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validation_happens_before_network() {
        let req = IngestRequest::new(Provider::Naver, "123", "  ");
        assert!(matches!(req.validate(), Err(ClientError::Validation(_))));

        let req = IngestRequest::new(Provider::Naver, "", "Test Lot");
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_from_candidate_uses_composite_key() {
        let candidate = PlaceCandidate {
            address: Some("서울 강남구".to_string()),
            ..PlaceCandidate::new(Provider::Kakao, "카페")
        };
        let req = IngestRequest::from_candidate(&candidate);
        assert_eq!(req.external_place_id, "카페|서울 강남구");

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["provider"], "kakao");
        assert!(json.get("latitude").is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ClientError::Network("x".into()).code(), "NETWORK_ERROR");
        assert_eq!(ClientError::Validation("x".into()).code(), "BAD_REQUEST");
        let api = ClientError::Api {
            status: 404,
            code: "NOT_FOUND".to_string(),
            message: "Place not found".to_string(),
        };
        assert_eq!(api.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_ingest_rejects_blank_name_without_connecting() {
        // 닿지 않는 주소: 검증에서 먼저 실패해야 함
        let config = ClientConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();

        let err = client
            .ingest(&IngestRequest::new(Provider::Google, "x", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = ClientConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();

        let err = client
            .ingest(&IngestRequest::new(Provider::Naver, "123", "Test Lot"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
    }
}
