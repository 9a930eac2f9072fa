//! 스냅샷 갱신 스로틀.
//!
//! 엔티티별로 동시에 하나의 갱신만 허용하고, 마지막 완료 시점부터
//! 쿨다운이 지나기 전에는 다시 호출하지 않습니다. 완료 시각은 실패한 경우에도
//! 기록되므로 실패하는 백엔드를 연달아 두드리지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};
use watchdesk_core::{entity_span, ErrorKind};

use crate::store::{EntityPatch, EntityStore};
use crate::traits::WatchApi;

/// 갱신 시도 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 스냅샷을 받아 저장소에 반영함
    Refreshed,
    /// 같은 엔티티의 갱신이 진행 중
    InFlight,
    /// 쿨다운 중
    CoolingDown,
    /// 응답은 받았지만 엔티티가 이미 삭제됨
    Gone,
    /// 호출 실패 (재시도 없음)
    Failed(ErrorKind),
}

impl RefreshOutcome {
    /// 실제로 네트워크 호출을 했는지.
    pub fn issued_call(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Refreshed | RefreshOutcome::Gone | RefreshOutcome::Failed(_)
        )
    }
}

#[derive(Debug, Default)]
struct ThrottleState {
    in_flight: HashSet<String>,
    last_done: HashMap<String, Instant>,
}

fn lock_state(state: &Mutex<ThrottleState>) -> MutexGuard<'_, ThrottleState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 진행 중 표시. 호출이 끝나거나 future가 버려지면 해제되고 완료 시각을 남깁니다.
struct InFlightGuard<'a> {
    state: &'a Mutex<ThrottleState>,
    id: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock_state(self.state);
        state.in_flight.remove(self.id);
        state.last_done.insert(self.id.to_string(), Instant::now());
    }
}

/// 스냅샷 갱신 스로틀.
pub struct RefreshThrottler {
    api: Arc<dyn WatchApi>,
    store: Arc<EntityStore>,
    cooldown: Duration,
    state: Mutex<ThrottleState>,
}

impl RefreshThrottler {
    /// 새 스로틀 생성.
    pub fn new(api: Arc<dyn WatchApi>, store: Arc<EntityStore>, cooldown: Duration) -> Self {
        Self {
            api,
            store,
            cooldown,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// 쿨다운 길이.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 엔티티 스냅샷 갱신.
    pub async fn refresh(&self, id: &str) -> RefreshOutcome {
        let guard = {
            let mut state = lock_state(&self.state);
            if state.in_flight.contains(id) {
                debug!(entity_id = %id, "Refresh already in flight");
                return RefreshOutcome::InFlight;
            }
            if let Some(done) = state.last_done.get(id) {
                if done.elapsed() < self.cooldown {
                    debug!(entity_id = %id, "Refresh cooling down");
                    return RefreshOutcome::CoolingDown;
                }
            }
            state.in_flight.insert(id.to_string());
            InFlightGuard {
                state: &self.state,
                id,
            }
        };

        let ticket = self.store.begin_reload().await;
        let result = self
            .api
            .refresh_snapshot(id)
            .instrument(entity_span!("refresh_snapshot", id))
            .await;

        drop(guard);

        match result {
            Ok(refresh) => {
                if !self.store.contains(id).await {
                    debug!(entity_id = %id, "Refreshed entity no longer exists");
                    return RefreshOutcome::Gone;
                }
                let mut patch = EntityPatch::new();
                patch.snapshot = refresh.snapshot;
                patch.updated_at = refresh.updated_at;
                self.store.patch_issued(ticket, id, patch).await;
                debug!(entity_id = %id, "Snapshot refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!(entity_id = %id, error = %e, "Snapshot refresh failed");
                if e.is_not_found() {
                    RefreshOutcome::Gone
                } else {
                    RefreshOutcome::Failed(e.kind())
                }
            }
        }
    }

    /// 여러 엔티티를 시차를 두고 갱신합니다.
    ///
    /// 중복 ID를 제거한 뒤 최대 `limit`개만, `index * stagger`만큼 지연해 실행합니다.
    pub fn refresh_staggered(
        self: &Arc<Self>,
        ids: &[String],
        limit: usize,
        stagger: Duration,
    ) -> Vec<(String, JoinHandle<RefreshOutcome>)> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert((*id).clone()))
            .take(limit)
            .enumerate()
            .map(|(index, id)| {
                let throttler = Arc::clone(self);
                let delay = stagger * index as u32;
                let task_id = id.clone();
                let handle = tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    throttler.refresh(&task_id).await
                });
                (id.clone(), handle)
            })
            .collect()
    }

    /// 남아 있는 엔티티 외의 기록을 정리합니다 (전체 재로딩 후).
    pub async fn retain(&self, ids: &[String]) {
        let keep: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut state = lock_state(&self.state);
        let before = state.last_done.len();
        state.last_done.retain(|id, _| keep.contains(id.as_str()));
        debug!(
            pruned = before - state.last_done.len(),
            "Throttle bookkeeping pruned"
        );
    }

    /// 진행 중인 갱신 여부.
    pub async fn is_in_flight(&self, id: &str) -> bool {
        lock_state(&self.state).in_flight.contains(id)
    }
}
