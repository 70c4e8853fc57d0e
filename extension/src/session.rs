//! Detection Session
//!
//! 지도 페이지 하나의 상태(현재 장소, 캐시, 패널 상태)를 소유하는 객체.
//!
//! # Flow
//!
//! ```text
//! PageSnapshot ──▶ debounce ──▶ detect ──▶ PlaceTracker ──(변경)──▶ fetch
//!                                  │                                 │
//!                                  └─(URL 변경 + 재시도 후에도 없음)─▶ Empty
//!                                                                    ▼
//!                                                   Loading ──▶ Info | Empty | Error
//! ```
//!
//! 한 번에 한 사이클씩 순서대로 처리함. 진행 중인 조회를 취소하지 않으므로
//! 오래된 결과가 새 결과를 덮어쓰는 경우가 없음.
//!
//! 새 URL에서 이름을 찾지 못하면 `with_source`로 연결한 페이지를
//! `RetryPolicy`에 따라 다시 읽어 감지함 (기본 1s, 2s, 3s).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::{
    client::ParkingApi,
    config::ClientConfig,
    detector::{provider_for_url, redetect, PageSnapshot, RetryPolicy, SnapshotSource},
    fetcher::ParkingInfoFetcher,
    identity::PlaceTracker,
    messages::{MessageResponse, RuntimeMessage},
    types::{ParkingInfo, PlaceCandidate},
};

/// 패널 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelState {
    /// 아직 아무것도 감지하지 않음
    Idle,
    Loading { place: PlaceCandidate },
    Info { place: PlaceCandidate, info: ParkingInfo },
    /// 장소가 없거나 주차 정보가 비어 있음
    Empty { place_id: Option<Uuid> },
    Error { code: String, message: String },
}

/// 메시지 + 응답 채널
pub type MessageEnvelope = (RuntimeMessage, oneshot::Sender<MessageResponse>);

enum Input {
    Snapshot(PageSnapshot),
    Message(MessageEnvelope),
    Closed,
}

/// 페이지 세션
pub struct Session {
    fetcher: ParkingInfoFetcher,
    tracker: PlaceTracker,
    debounce: Duration,
    retry: RetryPolicy,
    /// 이름이 아직 렌더링되지 않았을 때 다시 읽어올 페이지
    source: Option<Arc<dyn SnapshotSource>>,
    last_url: Option<String>,
    state: PanelState,
}

impl Session {
    pub fn new(fetcher: ParkingInfoFetcher, debounce: Duration) -> Self {
        Self {
            fetcher,
            tracker: PlaceTracker::new(),
            debounce,
            retry: RetryPolicy::default(),
            source: None,
            last_url: None,
            state: PanelState::Idle,
        }
    }

    pub fn from_config(api: Arc<dyn ParkingApi>, config: &ClientConfig) -> Self {
        Self::new(ParkingInfoFetcher::new(api, config), config.debounce)
            .with_retry_policy(config.detect_retry)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 감지 실패 시 지연 재시도에 쓸 스냅샷 소스 연결
    pub fn with_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn current_place(&self) -> Option<&PlaceCandidate> {
        self.tracker.current()
    }

    /// 스냅샷 채널이 닫힐 때까지 처리
    pub async fn run(
        &mut self,
        snapshots: mpsc::Receiver<PageSnapshot>,
        panel: watch::Sender<PanelState>,
    ) {
        let (_idle, messages) = mpsc::channel(1);
        self.serve(snapshots, messages, panel).await;
    }

    /// 스냅샷과 런타임 메시지를 함께 처리
    pub async fn serve(
        &mut self,
        mut snapshots: mpsc::Receiver<PageSnapshot>,
        mut messages: mpsc::Receiver<MessageEnvelope>,
        panel: watch::Sender<PanelState>,
    ) {
        loop {
            let input = tokio::select! {
                snapshot = snapshots.recv() => match snapshot {
                    Some(snapshot) => Input::Snapshot(snapshot),
                    None => Input::Closed,
                },
                Some(envelope) = messages.recv() => Input::Message(envelope),
            };

            match input {
                Input::Snapshot(first) => {
                    let latest = self.coalesce(first, &mut snapshots).await;
                    self.process(latest, &panel).await;
                }
                Input::Message((message, reply)) => {
                    let response = self.handle_message(message, &panel).await;
                    if reply.send(response).is_err() {
                        tracing::trace!("Message sender went away before reply");
                    }
                }
                Input::Closed => break,
            }
        }
        tracing::debug!("Session stopped");
    }

    /// 디바운스 창 안에 들어온 스냅샷 중 마지막 것만 남김
    async fn coalesce(
        &self,
        first: PageSnapshot,
        snapshots: &mut mpsc::Receiver<PageSnapshot>,
    ) -> PageSnapshot {
        let mut latest = first;
        while let Ok(Some(next)) = tokio::time::timeout(self.debounce, snapshots.recv()).await {
            latest = next;
        }
        latest
    }

    /// 스냅샷 한 개 처리 (디바운스 이후)
    pub async fn process(&mut self, snapshot: PageSnapshot, panel: &watch::Sender<PanelState>) {
        let url_changed = self.last_url.as_deref() != Some(snapshot.url.as_str());
        self.last_url = Some(snapshot.url.clone());

        let detected = match snapshot.detect() {
            Some(candidate) => Some(candidate),
            None if url_changed => self.await_render(&snapshot.url).await,
            None => None,
        };

        match detected {
            Some(candidate) => {
                if let Some(place) = self.tracker.observe(candidate) {
                    self.refresh(place, panel).await;
                }
            }
            None if url_changed => {
                self.tracker.reset();
                self.publish(panel, PanelState::Empty { place_id: None });
            }
            None => {}
        }
    }

    /// 새 URL에서 이름을 못 찾았을 때 렌더링을 기다리며 다시 감지
    async fn await_render(&self, url: &str) -> Option<PlaceCandidate> {
        let source = self.source.as_ref()?;
        provider_for_url(url)?;
        redetect(source.as_ref(), &self.retry).await
    }

    /// 현재 장소 다시 조회 (수동 재시도)
    pub async fn retry(&mut self, panel: &watch::Sender<PanelState>) -> bool {
        match self.tracker.current().cloned() {
            Some(place) => {
                self.refresh(place, panel).await;
                true
            }
            None => false,
        }
    }

    /// 콘텐츠 측 메시지 응답
    pub async fn handle_message(
        &mut self,
        message: RuntimeMessage,
        panel: &watch::Sender<PanelState>,
    ) -> MessageResponse {
        match message {
            RuntimeMessage::GetCurrentPlace => MessageResponse::Place {
                place: self.tracker.current().cloned(),
            },
            RuntimeMessage::ShowParkingDetails => MessageResponse::ok(self.state_value()),
            RuntimeMessage::ShowReviewForm => match self.review_target() {
                Some(target) => MessageResponse::ok(Some(target)),
                None => MessageResponse::error("No place detected"),
            },
            RuntimeMessage::MapDetected => MessageResponse::ok(None),
            RuntimeMessage::FetchPlaceData { .. } => {
                if self.retry(panel).await {
                    MessageResponse::ok(self.state_value())
                } else {
                    MessageResponse::error("No place detected")
                }
            }
            // 백그라운드에서 처리하는 메시지
            RuntimeMessage::PlaceDetected { .. }
            | RuntimeMessage::GetData { .. }
            | RuntimeMessage::SaveData { .. } => MessageResponse::error("Unsupported message"),
        }
    }

    async fn refresh(&mut self, place: PlaceCandidate, panel: &watch::Sender<PanelState>) {
        self.publish(panel, PanelState::Loading { place: place.clone() });

        let next = match self.fetcher.fetch_parking_info(&place).await {
            Ok(info) if info.is_empty() => PanelState::Empty {
                place_id: info.place_id,
            },
            Ok(info) => PanelState::Info { place, info },
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Failed to load parking info");
                PanelState::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                }
            }
        };
        self.publish(panel, next);
    }

    fn publish(&mut self, panel: &watch::Sender<PanelState>, state: PanelState) {
        self.state = state.clone();
        panel.send_replace(state);
    }

    fn state_value(&self) -> Option<Value> {
        serde_json::to_value(&self.state).ok()
    }

    /// 리뷰 작성 대상: 서버 장소 ID 우선, 없으면 좌표
    fn review_target(&self) -> Option<Value> {
        let place_id = match &self.state {
            PanelState::Info { info, .. } => info.place_id,
            PanelState::Empty { place_id } => *place_id,
            _ => None,
        };
        if let Some(id) = place_id {
            return Some(json!({ "subject_type": "place", "place_id": id }));
        }

        let (latitude, longitude) = self.tracker.current()?.coordinates()?;
        Some(json!({ "subject_type": "location", "latitude": latitude, "longitude": longitude }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::client::{ClientError, IngestRequest, ReviewParams, SearchParams};
    use crate::types::{
        IngestResult, Page, PageInfo, ParkingLot, ParkingLotDetail, Place, PlaceDetail, Review,
    };

    /// 장소마다 주차장 하나를 돌려주는 mock
    #[derive(Default)]
    struct OneLotApi {
        ingests: AtomicUsize,
        offline: AtomicBool,
        place_id: Uuid,
    }

    impl OneLotApi {
        fn place(&self) -> Place {
            Place {
                id: self.place_id,
                name: "테스트 장소".to_string(),
                address: None,
                latitude: None,
                longitude: None,
                created_at: Utc::now(),
            }
        }

        fn lot(&self) -> ParkingLot {
            ParkingLot {
                id: Uuid::nil(),
                place_id: Some(self.place_id),
                name: "B 공영주차장".to_string(),
                address: None,
                latitude: None,
                longitude: None,
                lot_type: "public".to_string(),
                price_info: json!({}),
                created_at: Utc::now(),
                place_name: None,
            }
        }
    }

    #[async_trait]
    impl ParkingApi for OneLotApi {
        async fn ingest(&self, _req: &IngestRequest) -> Result<IngestResult, ClientError> {
            self.ingests.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(ClientError::Network("offline".to_string()));
            }
            Ok(IngestResult {
                place: self.place(),
                existing: true,
            })
        }

        async fn place_detail(&self, _id: Uuid) -> Result<PlaceDetail, ClientError> {
            Ok(PlaceDetail {
                place: self.place(),
                parking_lots: vec![self.lot()],
                average_rating: None,
                rating_count: 0,
            })
        }

        async fn parking_detail(&self, _id: Uuid) -> Result<ParkingLotDetail, ClientError> {
            Ok(ParkingLotDetail {
                lot: self.lot(),
                average_rating: None,
                rating_count: 0,
                recent_reviews: vec![],
                recent_tips: vec![],
            })
        }

        async fn search_parking(&self, _params: &SearchParams) -> Result<Page<ParkingLot>, ClientError> {
            Ok(Page { data: vec![], page: PageInfo::default() })
        }

        async fn reviews(&self, _params: &ReviewParams) -> Result<Page<Review>, ClientError> {
            Ok(Page { data: vec![], page: PageInfo::default() })
        }
    }

    fn naver_page(id: &str, name: &str) -> PageSnapshot {
        PageSnapshot::new(
            format!("https://map.naver.com/v5/entry/place/{}", id),
            format!(r#"<div class="place_bluelink">{}</div>"#, name),
        )
    }

    fn session(api: Arc<OneLotApi>) -> (Session, watch::Sender<PanelState>, watch::Receiver<PanelState>) {
        let config = ClientConfig {
            debounce: Duration::from_millis(20),
            ..ClientConfig::default()
        };
        let (tx, rx) = watch::channel(PanelState::Idle);
        (Session::from_config(api, &config), tx, rx)
    }

    #[tokio::test]
    async fn test_process_publishes_info() {
        let api = Arc::new(OneLotApi::default());
        let (mut session, tx, rx) = session(api.clone());

        session.process(naver_page("1", "테스트 장소"), &tx).await;

        let state = rx.borrow().clone();
        match state {
            PanelState::Info { place, info } => {
                assert_eq!(place.external_id.as_deref(), Some("1"));
                assert_eq!(info.parking_lots.len(), 1);
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    /// 세 번째 스냅샷에서야 이름이 렌더링되는 페이지
    struct SlowPage {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for SlowPage {
        async fn snapshot(&self) -> anyhow::Result<PageSnapshot> {
            // 세션이 받은 첫 스냅샷 이후 두 번째 읽기에서 렌더링 완료
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(if read >= 1 {
                naver_page("1", "늦게 뜨는 장소")
            } else {
                PageSnapshot::new("https://map.naver.com/v5/entry/place/1", "<div></div>")
            })
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_process_waits_for_late_render() {
        let api = Arc::new(OneLotApi::default());
        let page = Arc::new(SlowPage { reads: AtomicUsize::new(0) });
        let (session, tx, rx) = session(api.clone());
        let mut session = session.with_retry_policy(fast_retry()).with_source(page.clone());

        session
            .process(PageSnapshot::new("https://map.naver.com/v5/entry/place/1", "<div></div>"), &tx)
            .await;

        assert_eq!(page.reads.load(Ordering::SeqCst), 2);
        assert_eq!(api.ingests.load(Ordering::SeqCst), 1);
        assert_eq!(session.current_place().unwrap().name, "늦게 뜨는 장소");
        assert!(matches!(&*rx.borrow(), PanelState::Info { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_host_is_not_redetected() {
        let api = Arc::new(OneLotApi::default());
        let page = Arc::new(SlowPage { reads: AtomicUsize::new(0) });
        let (session, tx, rx) = session(api.clone());
        let mut session = session.with_retry_policy(fast_retry()).with_source(page.clone());

        session
            .process(PageSnapshot::new("https://example.com/", "<div></div>"), &tx)
            .await;

        assert_eq!(page.reads.load(Ordering::SeqCst), 0);
        assert_eq!(api.ingests.load(Ordering::SeqCst), 0);
        assert_eq!(*rx.borrow(), PanelState::Empty { place_id: None });
    }

    #[tokio::test]
    async fn test_same_place_is_fetched_once() {
        let api = Arc::new(OneLotApi::default());
        let (mut session, tx, _rx) = session(api.clone());

        session.process(naver_page("1", "테스트 장소"), &tx).await;
        session.process(naver_page("1", "테스트 장소"), &tx).await;

        assert_eq!(api.ingests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_url_change_without_place_resets() {
        let api = Arc::new(OneLotApi::default());
        let (mut session, tx, rx) = session(api);

        session.process(naver_page("1", "테스트 장소"), &tx).await;
        session
            .process(PageSnapshot::new("https://map.naver.com/v5/search", "<div></div>"), &tx)
            .await;

        assert!(session.current_place().is_none());
        assert_eq!(*rx.borrow(), PanelState::Empty { place_id: None });
    }

    #[tokio::test]
    async fn test_run_debounces_rapid_snapshots() {
        let api = Arc::new(OneLotApi::default());
        let (mut session, tx, _rx) = session(api.clone());
        let (snap_tx, snap_rx) = mpsc::channel(8);

        for (id, name) in [("1", "A"), ("2", "B"), ("3", "C")] {
            snap_tx.send(naver_page(id, name)).await.unwrap();
        }
        drop(snap_tx);

        session.run(snap_rx, tx).await;

        assert_eq!(api.ingests.load(Ordering::SeqCst), 1);
        assert_eq!(session.current_place().unwrap().name, "C");
    }

    #[tokio::test]
    async fn test_error_then_retry() {
        let api = Arc::new(OneLotApi::default());
        api.offline.store(true, Ordering::SeqCst);
        let (mut session, tx, rx) = session(api.clone());

        session.process(naver_page("1", "테스트 장소"), &tx).await;
        assert!(matches!(&*rx.borrow(), PanelState::Error { code, .. } if code == "NETWORK_ERROR"));

        api.offline.store(false, Ordering::SeqCst);
        assert!(session.retry(&tx).await);
        assert!(matches!(&*rx.borrow(), PanelState::Info { .. }));
    }

    #[tokio::test]
    async fn test_handle_messages() {
        let api = Arc::new(OneLotApi::default());
        let place_id = api.place_id;
        let (mut session, tx, _rx) = session(api);

        let response = session.handle_message(RuntimeMessage::ShowReviewForm, &tx).await;
        assert_eq!(response, MessageResponse::error("No place detected"));

        session.process(naver_page("1", "테스트 장소"), &tx).await;

        match session.handle_message(RuntimeMessage::GetCurrentPlace, &tx).await {
            MessageResponse::Place { place } => assert_eq!(place.unwrap().name, "테스트 장소"),
            other => panic!("unexpected response: {:?}", other),
        }

        let response = session.handle_message(RuntimeMessage::ShowReviewForm, &tx).await;
        assert_eq!(
            response,
            MessageResponse::ok(Some(json!({ "subject_type": "place", "place_id": place_id })))
        );

        let response = session
            .handle_message(RuntimeMessage::GetData { place_id: "x".to_string() }, &tx)
            .await;
        assert_eq!(response, MessageResponse::error("Unsupported message"));
    }

    #[tokio::test]
    async fn test_serve_answers_messages() {
        let api = Arc::new(OneLotApi::default());
        let (mut session, tx, _rx) = session(api);
        let (snap_tx, snap_rx) = mpsc::channel(4);
        let (msg_tx, msg_rx) = mpsc::channel(4);

        let handle = tokio::spawn(async move {
            session.serve(snap_rx, msg_rx, tx).await;
            session
        });

        let (reply_tx, reply_rx) = oneshot::channel();
        msg_tx.send((RuntimeMessage::MapDetected, reply_tx)).await.unwrap();
        assert_eq!(reply_rx.await.unwrap(), MessageResponse::ok(None));

        drop(snap_tx);
        let session = handle.await.unwrap();
        assert_eq!(*session.state(), PanelState::Idle);
    }
}
