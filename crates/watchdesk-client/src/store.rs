//! 엔티티 저장소.
//!
//! 클라이언트가 보는 엔티티의 유일한 원본입니다. 스냅샷 갱신, 분석 스트림,
//! 전체 재로딩이 비동기로 섞여 들어오므로 모든 변경에 단조 증가하는 순번을
//! 매기고, 레코드마다 필드별 리비전을 기록합니다.
//!
//! # 병합 규칙
//!
//! - [`EntityStore::patch`]: 얕은 병합, 필드별로 마지막에 적용된 값이 이김.
//!   `updatedAt`은 `max(저장값, 패치값)`이며 같으면 저장값 유지.
//! - [`EntityStore::begin_reload`]로 받은 티켓 이후에 바뀐 필드는
//!   [`EntityStore::apply_reload`] / [`EntityStore::apply_entity`]가 덮어쓰지 않음.
//! - 티켓 이후에 추가된 레코드는 재로딩 결과에 없어도 유지되고,
//!   티켓 이후에 삭제된 레코드는 재로딩 결과에 있어도 되살리지 않음.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;
use watchdesk_core::{Analysis, Entity, SnapshotEntry, TickerVerdict};

/// 재로딩 요청 시점의 저장소 순번.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReloadTicket(u64);

impl ReloadTicket {
    /// 티켓 순번.
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// 리비전을 추적하는 필드.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FieldKey {
    Title,
    Description,
    Snapshot(String),
    Verdict(String),
    Summary,
    Report,
    UpdatedAt,
}

/// 부분 갱신.
///
/// 지정한 필드만 병합됩니다. 스냅샷과 종목별 분석 결과는 종목 단위로 병합됩니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub snapshot: BTreeMap<String, SnapshotEntry>,
    pub verdicts: BTreeMap<String, TickerVerdict>,
    pub summary: Option<String>,
    pub report: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn snapshot(mut self, ticker: impl Into<String>, entry: SnapshotEntry) -> Self {
        self.snapshot.insert(ticker.into(), entry);
        self
    }

    pub fn verdict(mut self, ticker: impl Into<String>, verdict: TickerVerdict) -> Self {
        self.verdicts.insert(ticker.into(), verdict);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// 변경할 필드가 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.snapshot.is_empty()
            && self.verdicts.is_empty()
            && self.summary.is_none()
            && self.report.is_none()
            && self.updated_at.is_none()
    }
}

#[derive(Debug, Clone)]
struct EntityRecord {
    entity: Entity,
    /// 마지막 변경 순번
    revision: u64,
    /// 저장소에 처음 들어온 순번
    created_rev: u64,
    /// 필드별 마지막 변경 순번 (없으면 `created_rev` 이하로 간주)
    fields: HashMap<FieldKey, u64>,
}

impl EntityRecord {
    fn new(entity: Entity, seq: u64) -> Self {
        Self {
            entity,
            revision: seq,
            created_rev: seq,
            fields: HashMap::new(),
        }
    }

    /// 패치를 적용하고 실제로 바뀐 필드가 있으면 `true`.
    ///
    /// `since`가 있으면 그 이후에 바뀐 필드는 건너뜁니다.
    fn apply(&mut self, patch: EntityPatch, seq: u64, since: Option<u64>) -> bool {
        let allowed = |fields: &HashMap<FieldKey, u64>, key: &FieldKey| match since {
            Some(ticket) => fields.get(key).copied().unwrap_or(0) <= ticket,
            None => true,
        };
        let mut touched = Vec::new();

        if let Some(title) = patch.title {
            if allowed(&self.fields, &FieldKey::Title) {
                self.entity.title = title;
                touched.push(FieldKey::Title);
            }
        }
        if let Some(description) = patch.description {
            if allowed(&self.fields, &FieldKey::Description) {
                self.entity.description = description;
                touched.push(FieldKey::Description);
            }
        }
        for (ticker, entry) in patch.snapshot {
            let key = FieldKey::Snapshot(ticker.clone());
            if allowed(&self.fields, &key) {
                self.entity.snapshot.insert(ticker, entry);
                touched.push(key);
            }
        }
        for (ticker, verdict) in patch.verdicts {
            let key = FieldKey::Verdict(ticker.clone());
            if allowed(&self.fields, &key) {
                self.analysis_mut().per_ticker.insert(ticker, verdict);
                touched.push(key);
            }
        }
        if let Some(summary) = patch.summary {
            if allowed(&self.fields, &FieldKey::Summary) {
                self.analysis_mut().summary = summary;
                touched.push(FieldKey::Summary);
            }
        }
        if let Some(report) = patch.report {
            if allowed(&self.fields, &FieldKey::Report) {
                self.analysis_mut().report = report;
                touched.push(FieldKey::Report);
            }
        }
        // updatedAt은 절대 뒤로 가지 않음
        if let Some(at) = patch.updated_at {
            if self.entity.updated_at.map_or(true, |stored| at > stored) {
                self.entity.updated_at = Some(at);
                touched.push(FieldKey::UpdatedAt);
            }
        }

        if touched.is_empty() {
            return false;
        }
        for key in touched {
            self.fields.insert(key, seq);
        }
        self.revision = seq;
        true
    }

    /// 권위 있는 새 레코드로 교체하되 티켓 이후 바뀐 필드는 유지합니다.
    fn replaced_by(self, entity: Entity, seq: u64, ticket: u64) -> Self {
        let mut next = EntityRecord {
            entity,
            revision: seq,
            created_rev: self.created_rev,
            fields: HashMap::new(),
        };

        for (key, rev) in self.fields.iter().filter(|(_, rev)| **rev > ticket) {
            let old = &self.entity;
            match key {
                FieldKey::Title => next.entity.title = old.title.clone(),
                FieldKey::Description => next.entity.description = old.description.clone(),
                FieldKey::Snapshot(ticker) => {
                    if let Some(entry) = old.snapshot.get(ticker) {
                        next.entity.snapshot.insert(ticker.clone(), *entry);
                    }
                }
                FieldKey::Verdict(ticker) => {
                    if let Some(verdict) = old
                        .analysis
                        .as_ref()
                        .and_then(|a| a.per_ticker.get(ticker))
                    {
                        next.analysis_mut()
                            .per_ticker
                            .insert(ticker.clone(), verdict.clone());
                    }
                }
                FieldKey::Summary => {
                    if let Some(a) = old.analysis.as_ref() {
                        next.analysis_mut().summary = a.summary.clone();
                    }
                }
                FieldKey::Report => {
                    if let Some(a) = old.analysis.as_ref() {
                        next.analysis_mut().report = a.report.clone();
                    }
                }
                FieldKey::UpdatedAt => {
                    next.entity.updated_at = next.entity.updated_at.max(old.updated_at);
                }
            }
            next.fields.insert(key.clone(), *rev);
        }

        next
    }

    fn analysis_mut(&mut self) -> &mut Analysis {
        self.entity.analysis.get_or_insert_with(Analysis::default)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<String, EntityRecord>,
    order: Vec<String>,
    /// 삭제된 ID와 삭제 순번
    removed: HashMap<String, u64>,
    /// 마지막으로 적용한 전체 목록의 티켓
    reloaded: u64,
    seq: u64,
}

impl StoreInner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// 엔티티 저장소.
#[derive(Debug, Default)]
pub struct EntityStore {
    inner: RwLock<StoreInner>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전체 교체 (병합 없음).
    pub async fn replace_all(&self, entities: Vec<Entity>) {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq();

        inner.records.clear();
        inner.order.clear();
        inner.removed.clear();
        inner.reloaded = seq;
        for entity in entities {
            if inner.records.contains_key(&entity.id) {
                continue;
            }
            inner.order.push(entity.id.clone());
            inner
                .records
                .insert(entity.id.clone(), EntityRecord::new(entity, seq));
        }
        debug!(count = inner.order.len(), seq, "Store replaced");
    }

    /// 재로딩 요청 직전에 호출해 티켓을 받습니다.
    pub async fn begin_reload(&self) -> ReloadTicket {
        ReloadTicket(self.inner.read().await.seq)
    }

    /// 티켓 시점에 요청한 전체 목록을 적용합니다.
    ///
    /// 이미 적용된 목록보다 먼저 요청된 목록은 버립니다.
    pub async fn apply_reload(&self, ticket: ReloadTicket, entities: Vec<Entity>) {
        let mut inner = self.inner.write().await;
        if ticket.0 < inner.reloaded {
            debug!(
                ticket = ticket.0,
                applied = inner.reloaded,
                "Discarding reload older than the applied one"
            );
            return;
        }
        let seq = inner.next_seq();

        let mut old = std::mem::take(&mut inner.records);
        let old_order = std::mem::take(&mut inner.order);
        let mut records = HashMap::with_capacity(entities.len());
        let mut order = Vec::with_capacity(entities.len());
        let mut carried = 0usize;

        for entity in entities {
            let id = entity.id.clone();
            if records.contains_key(&id) {
                continue;
            }
            if inner.removed.get(&id).is_some_and(|rev| *rev > ticket.0) {
                debug!(entity_id = %id, "Skipping entity removed after reload was issued");
                continue;
            }
            let record = match old.remove(&id) {
                Some(prev) => prev.replaced_by(entity, seq, ticket.0),
                None => EntityRecord::new(entity, seq),
            };
            carried += record.fields.len();
            order.push(id.clone());
            records.insert(id, record);
        }

        // 티켓 이후 추가된 레코드 유지
        for id in old_order {
            if let Some(prev) = old.remove(&id) {
                if prev.created_rev > ticket.0 {
                    order.push(id.clone());
                    records.insert(id, prev);
                }
            }
        }

        inner.records = records;
        inner.order = order;
        inner.reloaded = ticket.0;
        // 티켓 이전 삭제는 이후 목록에 반영되어 있음
        inner.removed.retain(|_, rev| *rev > ticket.0);
        debug!(
            count = inner.order.len(),
            carried_fields = carried,
            ticket = ticket.0,
            seq,
            "Reload applied"
        );
    }

    /// 티켓 시점에 요청한 단일 엔티티를 적용합니다.
    ///
    /// 저장소에 없는 엔티티(이미 삭제됨)는 무시하고 `false`를 반환합니다.
    pub async fn apply_entity(&self, ticket: ReloadTicket, entity: Entity) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.records.contains_key(&entity.id) {
            debug!(entity_id = %entity.id, "Ignoring reload of unknown entity");
            return false;
        }
        let seq = inner.next_seq();
        let id = entity.id.clone();
        if let Some(prev) = inner.records.remove(&id) {
            let record = prev.replaced_by(entity, seq, ticket.0);
            inner.records.insert(id, record);
        }
        true
    }

    /// 얕은 병합. 엔티티가 없으면 아무것도 하지 않습니다.
    ///
    /// 레코드가 실제로 바뀌면 `true`.
    pub async fn patch(&self, id: &str, patch: EntityPatch) -> bool {
        self.patch_inner(id, patch, None).await
    }

    /// 티켓 시점에 요청한 결과로 만든 패치를 적용합니다.
    ///
    /// 티켓 이후에 바뀐 필드는 건너뜁니다.
    pub async fn patch_issued(&self, ticket: ReloadTicket, id: &str, patch: EntityPatch) -> bool {
        self.patch_inner(id, patch, Some(ticket.0)).await
    }

    async fn patch_inner(&self, id: &str, patch: EntityPatch, since: Option<u64>) -> bool {
        if patch.is_empty() {
            return false;
        }
        let mut inner = self.inner.write().await;
        if !inner.records.contains_key(id) {
            debug!(entity_id = %id, "Patch target not found");
            return false;
        }
        let seq = inner.next_seq();
        match inner.records.get_mut(id) {
            Some(record) => record.apply(patch, seq, since),
            None => false,
        }
    }

    /// 엔티티 조회.
    pub async fn get(&self, id: &str) -> Option<Entity> {
        self.inner
            .read()
            .await
            .records
            .get(id)
            .map(|r| r.entity.clone())
    }

    /// 엔티티 존재 여부.
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.records.contains_key(id)
    }

    /// 순서대로 전체 엔티티.
    pub async fn list(&self) -> Vec<Entity> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).map(|r| r.entity.clone()))
            .collect()
    }

    /// 순서대로 전체 ID.
    pub async fn ids(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    /// 레코드의 마지막 변경 순번.
    pub async fn revision(&self, id: &str) -> Option<u64> {
        self.inner.read().await.records.get(id).map(|r| r.revision)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// 새로 생성된 엔티티 추가. 같은 ID가 있으면 교체합니다.
    pub async fn insert(&self, entity: Entity) {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq();
        let id = entity.id.clone();

        inner.removed.remove(&id);
        if !inner.records.contains_key(&id) {
            inner.order.push(id.clone());
        }
        inner.records.insert(id, EntityRecord::new(entity, seq));
    }

    /// 엔티티 삭제.
    pub async fn remove(&self, id: &str) -> Option<Entity> {
        let mut inner = self.inner.write().await;
        let record = inner.records.remove(id)?;
        let seq = inner.next_seq();
        inner.order.retain(|x| x != id);
        inner.removed.insert(id.to_string(), seq);
        Some(record.entity)
    }

    /// 순서 변경.
    ///
    /// 지정한 ID가 먼저 오고, 지정하지 않은 ID는 기존 상대 순서대로 뒤에 붙습니다.
    /// 알 수 없는 ID는 무시합니다.
    pub async fn reorder(&self, ids: &[String]) {
        let mut inner = self.inner.write().await;
        let mut seen = HashSet::new();
        let mut order: Vec<String> = ids
            .iter()
            .filter(|id| inner.records.contains_key(*id) && seen.insert((*id).clone()))
            .cloned()
            .collect();
        for id in &inner.order {
            if !seen.contains(id) {
                order.push(id.clone());
            }
        }
        inner.order = order;
        inner.next_seq();
    }

    /// 남아 있는 삭제 기록 수.
    pub async fn tombstones(&self) -> usize {
        self.inner.read().await.removed.len()
    }

    /// 전체 삭제.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        let seq = inner.seq;
        *inner = StoreInner {
            seq,
            reloaded: seq,
            ..Default::default()
        };
        inner.next_seq();
    }
}
