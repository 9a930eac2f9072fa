//! 분석 스트림 관리자.
//!
//! 엔티티마다 최대 하나의 분석 스트림을 유지합니다. 스트림 이벤트는
//! 전용 태스크가 소비하며, 상태는 [`transition`] 리듀서로만 바뀝니다.
//!
//! ```text
//! Idle ──Opened──▶ Streaming ──Done──────────▶ Completed
//!                      │ ──ServerError/Transport/Ended──▶ Failed
//!                      └──Cancelled─────────▶ Cancelled
//! ```
//!
//! 현재 화면에 열려 있지 않은 엔티티의 이벤트는 공유 상태를 건드리기 전에 버립니다.

use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use watchdesk_core::{
    entity_span, AnalysisEvent, ErrorKind, SnapshotEntry, Suggestion, TickerVerdict,
};

use crate::error::ClientResult;
use crate::store::{EntityPatch, EntityStore};
use crate::traits::{AnalysisStream, WatchApi};

/// 알림 채널 용량.
const NOTICE_CAPACITY: usize = 256;

// ============================================================================
// 상태 머신
// ============================================================================

/// 엔티티별 스트림 상태.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed(String),
    Cancelled,
}

impl StreamState {
    /// 종료 상태인지 확인.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Failed(_) | StreamState::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Failed(_) => "failed",
            StreamState::Cancelled => "cancelled",
        }
    }
}

/// 상태 전이 입력.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// 연결 성공
    Opened,
    /// 연결 실패
    OpenFailed(String),
    /// `done` 이벤트
    Done,
    /// `error` 이벤트
    ServerError(String),
    /// 전송 계층 에러
    TransportError(String),
    /// 종료 이벤트 없이 스트림이 끝남
    Ended,
    /// 취소됨
    Cancelled,
}

/// 상태 전이 함수. 허용되지 않는 전이는 `None`.
pub fn transition(state: &StreamState, signal: &StreamSignal) -> Option<StreamState> {
    use StreamSignal as Sig;

    match (state, signal) {
        (StreamState::Streaming, Sig::Opened | Sig::OpenFailed(_)) => None,
        (_, Sig::Opened) => Some(StreamState::Streaming),
        (_, Sig::OpenFailed(msg)) => Some(StreamState::Failed(msg.clone())),
        (StreamState::Streaming, Sig::Done) => Some(StreamState::Completed),
        (StreamState::Streaming, Sig::ServerError(msg) | Sig::TransportError(msg)) => {
            Some(StreamState::Failed(msg.clone()))
        }
        (StreamState::Streaming, Sig::Ended) => Some(StreamState::Failed(
            "stream ended without terminal event".to_string(),
        )),
        (StreamState::Streaming, Sig::Cancelled) => Some(StreamState::Cancelled),
        _ => None,
    }
}

// ============================================================================
// 알림
// ============================================================================

/// 구독자에게 전달되는 진행 알림.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamNotice {
    Started {
        entity_id: String,
        tickers: Vec<String>,
    },
    Log {
        entity_id: String,
        ticker: Option<String>,
        message: String,
    },
    TickerStarted {
        entity_id: String,
        ticker: String,
    },
    TickerDone {
        entity_id: String,
        ticker: String,
        suggestion: Suggestion,
        current: Option<f64>,
        pct: Option<f64>,
    },
    TickerError {
        entity_id: String,
        ticker: String,
        error: String,
    },
    State {
        entity_id: String,
        state: StreamState,
    },
}

impl StreamNotice {
    pub fn entity_id(&self) -> &str {
        match self {
            StreamNotice::Started { entity_id, .. }
            | StreamNotice::Log { entity_id, .. }
            | StreamNotice::TickerStarted { entity_id, .. }
            | StreamNotice::TickerDone { entity_id, .. }
            | StreamNotice::TickerError { entity_id, .. }
            | StreamNotice::State { entity_id, .. } => entity_id,
        }
    }
}

// ============================================================================
// 관리자
// ============================================================================

struct StreamHandle {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct Shared {
    api: Arc<dyn WatchApi>,
    store: Arc<EntityStore>,
    viewing: RwLock<Option<String>>,
    states: RwLock<HashMap<String, StreamState>>,
    handles: Mutex<HashMap<String, StreamHandle>>,
    notices: broadcast::Sender<StreamNotice>,
}

impl Shared {
    fn notify(&self, notice: StreamNotice) {
        // 구독자가 없으면 버림
        let _ = self.notices.send(notice);
    }

    async fn is_viewing(&self, id: &str) -> bool {
        self.viewing.read().await.as_deref() == Some(id)
    }

    async fn signal(&self, id: &str, signal: &StreamSignal) -> Option<StreamState> {
        let mut states = self.states.write().await;
        let current = states.get(id).cloned().unwrap_or_default();

        match transition(&current, signal) {
            Some(next) => {
                debug!(entity_id = %id, from = current.name(), to = next.name(), "Stream state");
                states.insert(id.to_string(), next.clone());
                drop(states);
                self.notify(StreamNotice::State {
                    entity_id: id.to_string(),
                    state: next.clone(),
                });
                Some(next)
            }
            None => {
                warn!(entity_id = %id, state = current.name(), ?signal, "Ignored stream transition");
                None
            }
        }
    }

    /// 이벤트 하나를 처리합니다. 스트림을 끝내야 하면 신호를 반환합니다.
    async fn handle_event(&self, id: &str, event: AnalysisEvent) -> Option<StreamSignal> {
        debug!(entity_id = %id, event = event.name(), "Analysis event");

        if !self.is_viewing(id).await {
            return match event {
                AnalysisEvent::Done { .. } => {
                    debug!(entity_id = %id, "Entity not in view, skipping reload");
                    Some(StreamSignal::Done)
                }
                AnalysisEvent::Error { message } => Some(StreamSignal::ServerError(message)),
                other => {
                    debug!(entity_id = %id, event = other.name(), "Discarding event for entity not in view");
                    None
                }
            };
        }

        match event {
            AnalysisEvent::Start { tickers, .. } => {
                info!(entity_id = %id, tickers = ?tickers, "Analysis started");
                self.notify(StreamNotice::Started {
                    entity_id: id.to_string(),
                    tickers,
                });
                None
            }
            AnalysisEvent::TickerStart { ticker } => {
                self.notify(StreamNotice::TickerStarted {
                    entity_id: id.to_string(),
                    ticker,
                });
                None
            }
            AnalysisEvent::Log { ticker, message } => {
                self.notify(StreamNotice::Log {
                    entity_id: id.to_string(),
                    ticker,
                    message,
                });
                None
            }
            AnalysisEvent::TickerDone {
                ticker,
                suggestion,
                current,
                pct,
            } => {
                self.apply_ticker_done(id, ticker, suggestion, current, pct)
                    .await;
                None
            }
            AnalysisEvent::TickerError { ticker, error } => {
                warn!(entity_id = %id, ticker = %ticker, error = %error, "Ticker analysis failed");
                self.notify(StreamNotice::TickerError {
                    entity_id: id.to_string(),
                    ticker,
                    error,
                });
                None
            }
            AnalysisEvent::Done { .. } => {
                self.reload_after_done(id).await;
                Some(StreamSignal::Done)
            }
            AnalysisEvent::Error { message } => {
                error!(entity_id = %id, "Analysis failed: {}", message);
                Some(StreamSignal::ServerError(message))
            }
        }
    }

    async fn apply_ticker_done(
        &self,
        id: &str,
        ticker: String,
        suggestion: Suggestion,
        current: Option<f64>,
        pct: Option<f64>,
    ) {
        let Some(entity) = self.store.get(id).await else {
            debug!(entity_id = %id, "ticker-done for missing entity");
            return;
        };
        let Some(ticker) = entity.tracked_ticker(&ticker).map(str::to_string) else {
            warn!(entity_id = %id, ticker = %ticker, "ticker-done for untracked ticker");
            return;
        };

        // null 값은 기존 스냅샷 유지
        let previous = entity.snapshot.get(&ticker).copied().unwrap_or_default();
        let entry = SnapshotEntry::new(current.or(previous.current), pct.or(previous.pct));
        let signals = entity
            .analysis
            .as_ref()
            .and_then(|a| a.per_ticker.get(&ticker))
            .map(|v| v.signals.clone())
            .unwrap_or_default();

        let patch = EntityPatch::new()
            .verdict(ticker.clone(), TickerVerdict { suggestion, signals })
            .snapshot(ticker.clone(), entry)
            .updated_at(Utc::now());
        self.store.patch(id, patch).await;

        info!(entity_id = %id, ticker = %ticker, suggestion = %suggestion, "Ticker analysis done");
        self.notify(StreamNotice::TickerDone {
            entity_id: id.to_string(),
            ticker,
            suggestion,
            current: entry.current,
            pct: entry.pct,
        });
    }

    /// `done` 이후 권위 있는 재로딩과 요약 갱신.
    async fn reload_after_done(&self, id: &str) {
        let ticket = self.store.begin_reload().await;
        match self.api.list_entities().await {
            Ok(entities) => self.store.apply_reload(ticket, entities).await,
            Err(e) => warn!(entity_id = %id, error = %e, "Reload after analysis failed"),
        }

        let ticket = self.store.begin_reload().await;
        match self.api.summarize(id).await {
            Ok(entity) => {
                self.store.apply_entity(ticket, entity).await;
            }
            Err(e) => warn!(entity_id = %id, error = %e, "Summary fetch failed"),
        }
    }
}

async fn consume(shared: &Shared, id: &str, mut events: AnalysisStream) -> StreamSignal {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                if let Some(signal) = shared.handle_event(id, event).await {
                    return signal;
                }
            }
            Err(e) if e.kind() == ErrorKind::MalformedData => {
                warn!(entity_id = %id, error = %e, "Discarding malformed stream payload");
            }
            Err(e) => {
                error!(entity_id = %id, error = %e, "Analysis stream transport error");
                return StreamSignal::TransportError(e.to_string());
            }
        }
    }
    warn!(entity_id = %id, "Analysis stream ended without terminal event");
    StreamSignal::Ended
}

async fn run(
    shared: Arc<Shared>,
    id: String,
    generation: u64,
    token: CancellationToken,
    events: AnalysisStream,
) {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => StreamSignal::Cancelled,
        signal = consume(&shared, &id, events) => signal,
    };
    shared.signal(&id, &outcome).await;

    let mut handles = shared.handles.lock().await;
    if handles
        .get(&id)
        .is_some_and(|h| h.generation == generation)
    {
        handles.remove(&id);
    }
}

/// 분석 스트림 관리자.
pub struct StreamManager {
    shared: Arc<Shared>,
    /// start/cancel 직렬화
    start_lock: Mutex<()>,
    generation: AtomicU64,
}

impl StreamManager {
    /// 새 관리자 생성.
    pub fn new(api: Arc<dyn WatchApi>, store: Arc<EntityStore>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                api,
                store,
                viewing: RwLock::new(None),
                states: RwLock::new(HashMap::new()),
                handles: Mutex::new(HashMap::new()),
                notices,
            }),
            start_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// 상세 화면 열기. 다른 엔티티를 보고 있었다면 그 스트림을 취소합니다.
    pub async fn open_view(&self, id: &str) {
        let previous = self.shared.viewing.write().await.replace(id.to_string());
        if let Some(prev) = previous.filter(|p| p != id) {
            self.cancel(&prev).await;
        }
        debug!(entity_id = %id, "View opened");
    }

    /// 상세 화면 닫기. 보고 있던 엔티티의 스트림을 취소합니다.
    pub async fn close_view(&self) {
        let previous = self.shared.viewing.write().await.take();
        if let Some(prev) = previous {
            self.cancel(&prev).await;
            debug!(entity_id = %prev, "View closed");
        }
    }

    /// 현재 보고 있는 엔티티.
    pub async fn viewing(&self) -> Option<String> {
        self.shared.viewing.read().await.clone()
    }

    /// 분석 스트림 시작.
    ///
    /// 기존 스트림이 있으면 먼저 취소하고 완전히 멈춘 뒤에 새 연결을 엽니다.
    pub async fn start(&self, id: &str) -> ClientResult<()> {
        let _guard = self.start_lock.lock().await;
        self.stop(id).await;

        let events = match self.shared.api.open_analysis_stream(id).await {
            Ok(events) => events,
            Err(e) => {
                error!(entity_id = %id, error = %e, "Failed to open analysis stream");
                self.shared
                    .signal(id, &StreamSignal::OpenFailed(e.to_string()))
                    .await;
                return Err(e);
            }
        };
        self.shared.signal(id, &StreamSignal::Opened).await;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        // 태스크가 핸들 등록 전에 끝나지 않도록 잠금 상태에서 spawn
        let mut handles = self.shared.handles.lock().await;
        let task = tokio::spawn(
            run(
                Arc::clone(&self.shared),
                id.to_string(),
                generation,
                token.clone(),
                events,
            )
            .instrument(entity_span!("analysis_stream", id)),
        );
        handles.insert(
            id.to_string(),
            StreamHandle {
                generation,
                token,
                task,
            },
        );

        info!(entity_id = %id, generation, "Analysis stream started");
        Ok(())
    }

    /// 스트림 취소. 여러 번 호출해도 안전합니다.
    ///
    /// 실제로 취소한 스트림이 있으면 `true`.
    pub async fn cancel(&self, id: &str) -> bool {
        let _guard = self.start_lock.lock().await;
        self.stop(id).await
    }

    async fn stop(&self, id: &str) -> bool {
        let handle = self.shared.handles.lock().await.remove(id);
        let Some(handle) = handle else {
            return false;
        };

        handle.token.cancel();
        if let Err(e) = handle.task.await {
            warn!(entity_id = %id, error = %e, "Stream task ended abnormally");
        }
        debug!(entity_id = %id, generation = handle.generation, "Analysis stream stopped");
        true
    }

    /// 모든 스트림 취소.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.shared.handles.lock().await.keys().cloned().collect();
        for id in ids {
            self.cancel(&id).await;
        }
    }

    /// 엔티티의 스트림 상태.
    pub async fn state(&self, id: &str) -> StreamState {
        self.shared
            .states
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// 살아 있는 스트림이 있는지.
    pub async fn is_active(&self, id: &str) -> bool {
        self.shared.handles.lock().await.contains_key(id)
    }

    /// 진행 알림 구독.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamNotice> {
        self.shared.notices.subscribe()
    }
}
