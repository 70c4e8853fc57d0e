//! Client Configuration
//!
//! 백엔드 주소와 캐시/디바운스 파라미터. 모두 환경변수로 덮어쓸 수 있음.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::detector::RetryPolicy;

/// 클라이언트 설정
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 백엔드 API 주소 (기본값: http://localhost:3001)
    pub api_url: String,

    /// 주차 정보 캐시 유효 시간 (기본값: 5분)
    pub cache_ttl: Duration,

    /// 장소별 리뷰 조회 개수 (기본값: 10)
    pub review_page_size: u32,

    /// HTTP 요청 타임아웃 (기본값: 10초)
    pub request_timeout: Duration,

    /// 페이지 변경 디바운스 (기본값: 300ms)
    pub debounce: Duration,

    /// 이름 추출 실패 시 재시도 정책
    pub detect_retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_string(),
            cache_ttl: Duration::from_secs(300),
            review_page_size: 10,
            request_timeout: Duration::from_secs(10),
            debounce: Duration::from_millis(300),
            detect_retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// 환경변수에서 설정 로드
    ///
    /// # Environment Variables
    ///
    /// - `PARKING_HELPER_API_URL`: 백엔드 주소
    /// - `PARKING_HELPER_CACHE_TTL_SECS`: 캐시 유효 시간 (초)
    /// - `PARKING_HELPER_REVIEW_LIMIT`: 리뷰 조회 개수
    /// - `PARKING_HELPER_TIMEOUT_SECS`: 요청 타임아웃 (초)
    /// - `PARKING_HELPER_DEBOUNCE_MS`: 디바운스 (밀리초)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            api_url: env::var("PARKING_HELPER_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),

            cache_ttl: match env::var("PARKING_HELPER_CACHE_TTL_SECS") {
                Ok(raw) => Duration::from_secs(
                    raw.parse()
                        .context("PARKING_HELPER_CACHE_TTL_SECS must be a number")?,
                ),
                Err(_) => defaults.cache_ttl,
            },

            review_page_size: match env::var("PARKING_HELPER_REVIEW_LIMIT") {
                Ok(raw) => raw
                    .parse()
                    .context("PARKING_HELPER_REVIEW_LIMIT must be a number")?,
                Err(_) => defaults.review_page_size,
            },

            request_timeout: match env::var("PARKING_HELPER_TIMEOUT_SECS") {
                Ok(raw) => Duration::from_secs(
                    raw.parse()
                        .context("PARKING_HELPER_TIMEOUT_SECS must be a number")?,
                ),
                Err(_) => defaults.request_timeout,
            },

            debounce: match env::var("PARKING_HELPER_DEBOUNCE_MS") {
                Ok(raw) => Duration::from_millis(
                    raw.parse()
                        .context("PARKING_HELPER_DEBOUNCE_MS must be a number")?,
                ),
                Err(_) => defaults.debounce,
            },

            detect_retry: defaults.detect_retry,
        })
    }
}
