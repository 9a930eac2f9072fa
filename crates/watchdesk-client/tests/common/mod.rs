//! 통합 테스트용 mock API.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use watchdesk_client::{
    AnalysisStream, BatchAnalysis, ClientError, ClientResult, SnapshotRefresh, WatchApi,
};
use watchdesk_core::{
    AnalysisEvent, Entity, EntityDraft, EntityUpdate, Series, SeriesKey, SnapshotEntry,
};

pub type EventSender = mpsc::UnboundedSender<ClientResult<AnalysisEvent>>;

/// 호출 횟수를 세는 mock API.
#[derive(Default)]
pub struct MockApi {
    pub entities: Mutex<Vec<Entity>>,
    pub streams: Mutex<VecDeque<AnalysisStream>>,
    pub refresh_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
    pub fail_list: AtomicBool,
    /// 일괄 분석에서 실패로 보고할 ID
    pub analyze_failures: Mutex<Vec<String>>,
    pub refresh_delay: Option<Duration>,
    pub refresh_price: f64,
}

impl MockApi {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities: Mutex::new(entities),
            refresh_price: 42.0,
            ..Default::default()
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// 다음 `open_analysis_stream` 호출이 반환할 스트림을 등록합니다.
    pub fn push_stream(&self) -> EventSender {
        let (tx, rx) = mpsc::unbounded();
        self.streams.lock().unwrap().push_back(rx.boxed());
        tx
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    fn find(&self, id: &str) -> ClientResult<Entity> {
        self.entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl WatchApi for MockApi {
    async fn list_entities(&self) -> ClientResult<Vec<Entity>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::ApiError {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn create_entity(&self, _draft: &EntityDraft) -> ClientResult<Entity> {
        Err(ClientError::Internal("unsupported".into()))
    }

    async fn update_entity(&self, _id: &str, _update: &EntityUpdate) -> ClientResult<Entity> {
        Err(ClientError::Internal("unsupported".into()))
    }

    async fn delete_entity(&self, _id: &str) -> ClientResult<()> {
        Err(ClientError::Internal("unsupported".into()))
    }

    async fn reorder_entities(&self, _ids: &[String]) -> ClientResult<()> {
        Err(ClientError::Internal("unsupported".into()))
    }

    async fn refresh_snapshot(&self, id: &str) -> ClientResult<SnapshotRefresh> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(ClientError::NetworkError("connection refused".into()));
        }

        let entity = self.find(id)?;
        let snapshot: BTreeMap<String, SnapshotEntry> = entity
            .tickers
            .iter()
            .map(|t| (t.clone(), SnapshotEntry::new(Some(self.refresh_price), None)))
            .collect();
        Ok(SnapshotRefresh {
            snapshot,
            updated_at: Some(Utc::now()),
        })
    }

    async fn summarize(&self, id: &str) -> ClientResult<Entity> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        let mut entity = self.find(id)?;
        let analysis = entity.analysis.get_or_insert_with(Default::default);
        analysis.summary = "summarized".to_string();
        Ok(entity)
    }

    async fn run_analysis(&self, id: &str) -> ClientResult<Entity> {
        self.find(id)
    }

    async fn analyze_all(&self) -> ClientResult<Vec<BatchAnalysis>> {
        let failures = self.analyze_failures.lock().unwrap().clone();
        let entities = self.entities.lock().unwrap().clone();
        Ok(entities
            .into_iter()
            .map(|mut entity| {
                if failures.contains(&entity.id) {
                    return BatchAnalysis::Failed {
                        id: Some(entity.id),
                        error: "quote provider timeout".into(),
                    };
                }
                let analysis = entity.analysis.get_or_insert_with(Default::default);
                analysis.summary = "analyzed".to_string();
                BatchAnalysis::Analyzed(entity)
            })
            .collect())
    }

    async fn open_analysis_stream(&self, _id: &str) -> ClientResult<AnalysisStream> {
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ClientError::NetworkError("no stream registered".into()))
    }

    async fn fetch_chart(&self, _key: &SeriesKey) -> ClientResult<Series> {
        Ok(Series::empty())
    }
}

/// 테스트용 엔티티.
pub fn entity(id: &str, tickers: &[&str]) -> Entity {
    Entity::new(
        id,
        format!("Entity {}", id),
        tickers.iter().map(|t| t.to_string()).collect(),
    )
}
