//! Place Detector
//!
//! 지도 페이지 스냅샷(URL + HTML)에서 장소 후보를 최선으로 추정함.
//!
//! # Flow
//!
//! ```text
//! URL host ──▶ Provider ──▶ Strategy (셀렉터 우선순위)
//!                              │
//!                              ├─▶ 이름/주소: 첫 번째로 비어있지 않고 제외 목록에 없는 텍스트
//!                              ├─▶ 외부 ID: URL 정규식 (/place/123, itemId=123, ...)
//!                              └─▶ 좌표: 구글 URL의 @lat,lng
//! ```
//!
//! 지도 서비스의 DOM은 자주 바뀌므로 셀렉터는 여러 개를 순서대로 시도하고,
//! 실패는 모두 `None`으로 흡수함 (로그는 debug/trace).

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::types::{PlaceCandidate, Provider};

// ============ Snapshot ============

/// 페이지 스냅샷 (URL + 직렬화된 DOM)
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// HTML 파싱 후 감지 (파싱된 문서는 이 호출 안에서만 유지)
    pub fn detect(&self) -> Option<PlaceCandidate> {
        let document = Html::parse_document(&self.html);
        detect(&self.url, &document)
    }
}

// ============ Provider / Strategy ============

/// 호스트 이름으로 지도 서비스 판별
pub fn provider_for_url(url: &str) -> Option<Provider> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    if host.contains("map.naver.com") {
        Some(Provider::Naver)
    } else if host.contains("map.kakao.com") {
        // place.map.kakao.com 포함
        Some(Provider::Kakao)
    } else if host.contains("maps.google.com")
        || (host.contains("google.com") && parsed.path().starts_with("/maps"))
    {
        Some(Provider::Google)
    } else {
        None
    }
}

/// 지도 서비스별 셀렉터 (앞쪽이 우선)
struct Strategy {
    name_selectors: &'static [&'static str],
    address_selectors: &'static [&'static str],
}

const NAVER: Strategy = Strategy {
    name_selectors: &[
        ".place_bluelink",
        ".YouOG span",
        "h1.GHAhO",
        "h2.GHAhO",
        "[class*=\"place_name\"]",
    ],
    address_selectors: &[
        ".YouOG + div span",
        ".LDgIH",
        "[class*=\"place_address\"]",
    ],
};

const KAKAO: Strategy = Strategy {
    name_selectors: &[
        ".link_name",
        ".link_placename",
        ".tit_location",
        "[class*=\"place_name\"]",
    ],
    address_selectors: &[
        ".txt_address",
        ".desc_address",
        "[class*=\"place_address\"]",
    ],
};

const GOOGLE: Strategy = Strategy {
    name_selectors: &[
        "h1[class*=\"fontHeadlineLarge\"]",
        "h1[data-value=\"Place name\"]",
        ".section-hero-header-title-title",
    ],
    address_selectors: &[
        "[data-item-id*=\"address\"]",
        "[data-value=\"Address\"]",
        "[aria-label*=\"주소\"]",
    ],
};

fn strategy(provider: Provider) -> &'static Strategy {
    match provider {
        Provider::Naver => &NAVER,
        Provider::Kakao => &KAKAO,
        Provider::Google => &GOOGLE,
    }
}

/// 로그인 배너나 계정 이메일이 장소 이름으로 잡히는 것 방지
const EXCLUDED_TEXT: &[&str] = &[
    "로그인",
    "sign in",
    "@naver.com",
    "@gmail.com",
    "@kakao.com",
    "@daum.net",
];

fn is_excluded(text: &str) -> bool {
    let lower = text.to_lowercase();
    EXCLUDED_TEXT.iter().any(|needle| lower.contains(needle))
}

/// 셀렉터를 순서대로 시도해서 첫 번째 유효 텍스트 반환
fn select_text(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let selector = match Selector::parse(raw) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::trace!(selector = raw, error = ?e, "Skipping invalid selector");
                continue;
            }
        };

        for element in document.select(&selector) {
            let text = element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                continue;
            }
            if is_excluded(&text) {
                tracing::trace!(selector = raw, %text, "Excluded candidate text");
                continue;
            }
            return Some(text);
        }
    }
    None
}

// ============ URL Patterns ============

fn re_place_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/place/(\d+)").unwrap())
}

fn re_kakao_place_host() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"place\.map\.kakao\.com/(\d+)").unwrap())
}

fn re_kakao_item_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]itemId=(\d+)").unwrap())
}

fn re_google_place() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/place/([^/?#]+)").unwrap())
}

fn re_google_coords() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap())
}

fn capture(re: &Regex, url: &str) -> Option<String> {
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// URL 경로의 숫자 장소 ID
fn numeric_place_id(provider: Provider, url: &str) -> Option<String> {
    match provider {
        Provider::Naver => capture(re_place_numeric(), url),
        Provider::Kakao => capture(re_place_numeric(), url)
            .or_else(|| capture(re_kakao_place_host(), url))
            .or_else(|| capture(re_kakao_item_id(), url)),
        Provider::Google => None,
    }
}

/// 구글 `/place/<이름>` 세그먼트 디코딩 (`+` → 공백)
fn google_place_name(url: &str) -> Option<String> {
    let raw = capture(re_google_place(), url)?;
    let decoded = percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .trim()
        .to_string();
    (!decoded.is_empty() && !is_excluded(&decoded)).then_some(decoded)
}

fn google_coordinates(url: &str) -> Option<(f64, f64)> {
    let caps = re_google_coords().captures(url)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lng = caps.get(2)?.as_str().parse().ok()?;
    Some((lat, lng))
}

// ============ Detection ============

/// 스냅샷 하나에서 장소 후보 추출
pub fn detect(url: &str, document: &Html) -> Option<PlaceCandidate> {
    let Some(provider) = provider_for_url(url) else {
        tracing::trace!(url, "Unsupported host");
        return None;
    };

    let strategy = strategy(provider);
    let dom_name = select_text(document, strategy.name_selectors);
    let address = select_text(document, strategy.address_selectors);

    let candidate = match provider {
        Provider::Google => {
            let url_name = google_place_name(url);
            let name = dom_name.or_else(|| url_name.clone())?;
            let (latitude, longitude) = match google_coordinates(url) {
                Some((lat, lng)) => (Some(lat), Some(lng)),
                None => (None, None),
            };
            PlaceCandidate {
                name,
                address,
                latitude,
                longitude,
                provider,
                external_id: url_name,
            }
        }
        Provider::Naver | Provider::Kakao => PlaceCandidate {
            name: dom_name?,
            address,
            latitude: None,
            longitude: None,
            provider,
            external_id: numeric_place_id(provider, url),
        },
    };

    tracing::debug!(
        provider = %candidate.provider,
        name = %candidate.name,
        external_id = ?candidate.external_id,
        "Place detected"
    );
    Some(candidate)
}

// ============ Retry ============

/// 이름 추출 재시도 정책 (대기 시간 = base × attempt)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// 현재 페이지 상태를 새로 읽어오는 소스
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<PageSnapshot>;
}

/// 첫 시도에서 이름을 못 찾으면 지연 후 새 스냅샷으로 재시도
///
/// 지원하지 않는 호스트는 재시도 없이 바로 `None`.
/// 모든 시도가 실패해도 에러 없이 `None`.
pub async fn detect_with_retry(
    source: &dyn SnapshotSource,
    policy: &RetryPolicy,
) -> Option<PlaceCandidate> {
    detect_attempts(source, policy, 0).await
}

/// 이미 한 번 실패한 뒤의 지연 재시도만 수행 (attempt 1..=max_retries)
pub async fn redetect(source: &dyn SnapshotSource, policy: &RetryPolicy) -> Option<PlaceCandidate> {
    detect_attempts(source, policy, 1).await
}

async fn detect_attempts(
    source: &dyn SnapshotSource,
    policy: &RetryPolicy,
    first_attempt: u32,
) -> Option<PlaceCandidate> {
    for attempt in first_attempt..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }

        let snapshot = match source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Snapshot unavailable");
                continue;
            }
        };

        if provider_for_url(&snapshot.url).is_none() {
            return None;
        }

        if let Some(candidate) = snapshot.detect() {
            return Some(candidate);
        }
        tracing::debug!(attempt, url = %snapshot.url, "Place name not rendered yet");
    }

    None
}
