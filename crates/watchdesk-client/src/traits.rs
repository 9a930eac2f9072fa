//! 원격 API trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Deserialize;
use std::collections::BTreeMap;
use watchdesk_core::{
    AnalysisEvent, Entity, EntityDraft, EntityUpdate, Series, SeriesKey, SnapshotEntry,
};

use crate::error::ClientResult;

/// 분석 이벤트 스트림.
pub type AnalysisStream = BoxStream<'static, ClientResult<AnalysisEvent>>;

/// 스냅샷 갱신 결과.
///
/// 서버는 엔티티 전체를 돌려주지만 클라이언트는 휘발성 필드만 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SnapshotRefresh {
    /// 종목별 시세
    #[serde(default)]
    pub snapshot: BTreeMap<String, SnapshotEntry>,
    /// 갱신 시각
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 일괄 분석의 엔티티별 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchAnalysis {
    /// 분석을 마친 엔티티
    Analyzed(Entity),
    /// 서버가 `{id, error}`로 보고한 실패
    Failed { id: Option<String>, error: String },
}

impl BatchAnalysis {
    pub fn id(&self) -> Option<&str> {
        match self {
            BatchAnalysis::Analyzed(entity) => Some(&entity.id),
            BatchAnalysis::Failed { id, .. } => id.as_deref(),
        }
    }
}

/// 관심종목 서버 인터페이스.
///
/// 모든 작업은 실패할 수 있으며, 호출 지점에서 에러를 처리하고
/// 화면을 막지 않는 상태로 강등해야 합니다.
#[async_trait]
pub trait WatchApi: Send + Sync {
    // === 엔티티 CRUD ===

    /// 전체 엔티티 목록 조회.
    async fn list_entities(&self) -> ClientResult<Vec<Entity>>;

    /// 엔티티 생성.
    async fn create_entity(&self, draft: &EntityDraft) -> ClientResult<Entity>;

    /// 엔티티 수정.
    async fn update_entity(&self, id: &str, update: &EntityUpdate) -> ClientResult<Entity>;

    /// 엔티티 삭제.
    async fn delete_entity(&self, id: &str) -> ClientResult<()>;

    /// 엔티티 순서 변경.
    async fn reorder_entities(&self, ids: &[String]) -> ClientResult<()>;

    // === 시세/분석 ===

    /// 스냅샷(현재가) 갱신.
    async fn refresh_snapshot(&self, id: &str) -> ClientResult<SnapshotRefresh>;

    /// 기존 종목별 결과로 요약 재계산.
    async fn summarize(&self, id: &str) -> ClientResult<Entity>;

    /// 동기식 전체 분석.
    async fn run_analysis(&self, id: &str) -> ClientResult<Entity>;

    /// 모든 엔티티를 순서대로 다시 분석합니다.
    async fn analyze_all(&self) -> ClientResult<Vec<BatchAnalysis>>;

    /// 분석 이벤트 스트림 열기.
    async fn open_analysis_stream(&self, id: &str) -> ClientResult<AnalysisStream>;

    // === 차트 ===

    /// 차트 시계열 조회.
    async fn fetch_chart(&self, key: &SeriesKey) -> ClientResult<Series>;
}
