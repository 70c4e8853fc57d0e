//! Place Identity
//!
//! 같은 장소를 반복 감지해도 ingest/조회가 한 번만 일어나도록
//! 마지막으로 본 장소의 식별 키를 기억함.

use crate::types::PlaceCandidate;

/// 외부 ID가 없을 때 쓰는 `name|address` 복합 키
pub fn composite_key(candidate: &PlaceCandidate) -> String {
    format!(
        "{}|{}",
        candidate.name,
        candidate.address.as_deref().unwrap_or_default()
    )
}

/// 장소 식별 키 (외부 ID 우선)
pub fn resolve_external_id(candidate: &PlaceCandidate) -> String {
    match candidate.external_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => composite_key(candidate),
    }
}

/// 현재 장소 추적기
#[derive(Debug, Default)]
pub struct PlaceTracker {
    current: Option<Tracked>,
}

#[derive(Debug)]
struct Tracked {
    key: String,
    candidate: PlaceCandidate,
}

impl PlaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키가 바뀌었으면 새 장소를 저장하고 반환, 같으면 `None`
    ///
    /// provider가 다르면 같은 ID라도 다른 장소로 봄.
    pub fn observe(&mut self, candidate: PlaceCandidate) -> Option<PlaceCandidate> {
        let key = format!("{}:{}", candidate.provider, resolve_external_id(&candidate));

        if self.current.as_ref().is_some_and(|t| t.key == key) {
            return None;
        }

        tracing::debug!(%key, "Place changed");
        self.current = Some(Tracked {
            key,
            candidate: candidate.clone(),
        });
        Some(candidate)
    }

    /// 현재 장소 잊기
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&PlaceCandidate> {
        self.current.as_ref().map(|t| &t.candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    fn place(name: &str, address: Option<&str>, external_id: Option<&str>) -> PlaceCandidate {
        PlaceCandidate {
            address: address.map(str::to_string),
            external_id: external_id.map(str::to_string),
            ..PlaceCandidate::new(Provider::Naver, name)
        }
    }

    #[test]
    fn test_resolve_prefers_external_id() {
        assert_eq!(resolve_external_id(&place("A", Some("B"), Some("42"))), "42");
        assert_eq!(resolve_external_id(&place("A", Some("B"), None)), "A|B");
        assert_eq!(resolve_external_id(&place("A", None, Some("  "))), "A|");
    }

    #[test]
    fn test_observe_is_idempotent() {
        let mut tracker = PlaceTracker::new();

        assert!(tracker.observe(place("A", None, Some("1"))).is_some());
        assert!(tracker.observe(place("A", None, Some("1"))).is_none());
        // 이름이 바뀌어도 ID가 같으면 같은 장소
        assert!(tracker.observe(place("A'", None, Some("1"))).is_none());
        assert!(tracker.observe(place("B", None, Some("2"))).is_some());
        assert_eq!(tracker.current().unwrap().name, "B");
    }

    #[test]
    fn test_reset_forgets_place() {
        let mut tracker = PlaceTracker::new();
        tracker.observe(place("A", None, Some("1")));
        tracker.reset();

        assert!(tracker.current().is_none());
        assert!(tracker.observe(place("A", None, Some("1"))).is_some());
    }

    #[test]
    fn test_composite_key_collapses_same_name_and_address() {
        let mut tracker = PlaceTracker::new();
        tracker.observe(place("스타벅스", Some("강남"), None));
        assert!(tracker.observe(place("스타벅스", Some("강남"), None)).is_none());
    }
}
