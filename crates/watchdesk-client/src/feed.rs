//! 엔티티 목록 화면.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use watchdesk_core::{Entity, FeedConfig, Suggestion};

use crate::error::ClientResult;
use crate::store::EntityStore;
use crate::throttle::{RefreshOutcome, RefreshThrottler};
use crate::traits::{BatchAnalysis, WatchApi};

/// 목록 한 줄.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedRow {
    pub id: String,
    pub title: String,
    /// 대표 종목
    pub ticker: Option<String>,
    pub current: Option<f64>,
    /// 매입가 대비 변동률 (%)
    pub pct: Option<f64>,
    pub suggestion: Suggestion,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeedRow {
    /// 엔티티에서 행 생성.
    pub fn from_entity(entity: &Entity) -> Self {
        let ticker = entity.primary_ticker().map(str::to_string);
        let (current, pct) = match ticker.as_deref() {
            Some(t) => (entity.current_price(t), entity.pct_change(t)),
            None => (None, None),
        };
        Self {
            id: entity.id.clone(),
            title: entity.title.clone(),
            ticker,
            current,
            pct,
            suggestion: entity.row_suggestion(),
            updated_at: entity.updated_at,
        }
    }
}

/// 목록 화면 상태.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedView {
    /// 엔티티 없음
    Empty,
    /// 전체 로딩 실패
    Failed(String),
    Rows(Vec<FeedRow>),
}

/// 배치 갱신 한 회차.
pub struct RefreshPass {
    tasks: Vec<(String, tokio::task::JoinHandle<RefreshOutcome>)>,
}

impl RefreshPass {
    /// 예약된 엔티티 ID.
    pub fn scheduled(&self) -> Vec<&str> {
        self.tasks.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// 모든 갱신이 끝날 때까지 대기.
    pub async fn join(self) -> Vec<(String, RefreshOutcome)> {
        let mut out = Vec::with_capacity(self.tasks.len());
        for (id, task) in self.tasks {
            match task.await {
                Ok(outcome) => out.push((id, outcome)),
                Err(e) => warn!(entity_id = %id, error = %e, "Refresh task aborted"),
            }
        }
        out
    }
}

/// 목록 화면 프레젠터.
pub struct FeedPresenter {
    api: Arc<dyn WatchApi>,
    store: Arc<EntityStore>,
    throttler: Arc<RefreshThrottler>,
    config: FeedConfig,
}

impl FeedPresenter {
    pub fn new(
        api: Arc<dyn WatchApi>,
        store: Arc<EntityStore>,
        throttler: Arc<RefreshThrottler>,
        config: FeedConfig,
    ) -> Self {
        Self {
            api,
            store,
            throttler,
            config,
        }
    }

    /// 전체 목록을 다시 불러옵니다.
    pub async fn load(&self) -> FeedView {
        let ticket = self.store.begin_reload().await;
        match self.api.list_entities().await {
            Ok(entities) => {
                self.store.apply_reload(ticket, entities).await;
                let ids = self.store.ids().await;
                self.throttler.retain(&ids).await;
                info!(count = ids.len(), "Entity list loaded");
                self.view().await
            }
            Err(e) => {
                warn!(error = %e, "Entity list load failed");
                FeedView::Failed(e.to_string())
            }
        }
    }

    /// 저장소의 현재 상태로 화면 구성.
    pub async fn view(&self) -> FeedView {
        let rows = self.rows().await;
        if rows.is_empty() {
            FeedView::Empty
        } else {
            FeedView::Rows(rows)
        }
    }

    /// 목록 행.
    pub async fn rows(&self) -> Vec<FeedRow> {
        self.store
            .list()
            .await
            .iter()
            .map(FeedRow::from_entity)
            .collect()
    }

    /// 전체 재분석 후 결과를 저장소에 반영합니다.
    ///
    /// 분석된 엔티티는 호출 전에 받은 티켓으로 적용되므로, 그 사이 스트림이나
    /// 편집으로 바뀐 필드는 유지됩니다. 실패한 엔티티는 그대로 둡니다.
    pub async fn analyze_all(&self) -> ClientResult<Vec<BatchAnalysis>> {
        let ticket = self.store.begin_reload().await;
        let results = self.api.analyze_all().await?;

        let mut applied = 0usize;
        for result in &results {
            match result {
                BatchAnalysis::Analyzed(entity) => {
                    if self.store.apply_entity(ticket, entity.clone()).await {
                        applied += 1;
                    }
                }
                BatchAnalysis::Failed { id, error } => {
                    warn!(entity_id = ?id, error = %error, "Batch analysis failed for entity");
                }
            }
        }
        info!(total = results.len(), applied, "Batch analysis applied");
        Ok(results)
    }

    /// 화면에 보이는 엔티티 갱신 예약.
    ///
    /// 최대 `max_per_pass`개, `index * stagger` 간격으로 실행됩니다.
    pub fn refresh_visible(&self, ids: &[String]) -> RefreshPass {
        RefreshPass {
            tasks: self.throttler.refresh_staggered(
                ids,
                self.config.max_per_pass,
                self.config.stagger(),
            ),
        }
    }
}
