//! 뷰포트 창(window) 저장소.
//!
//! (ticker, period, interval) 단위로 `{start, end}`만 저장합니다. 호버 위치는
//! 저장하지 않습니다. 저장된 레코드가 손상되었거나 구조적으로 잘못되면 해당
//! 레코드만 버리고 기본 창(전체 시리즈)을 사용합니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use watchdesk_core::SeriesKey;

use crate::error::{ChartError, ChartResult};
use crate::viewport::ViewportState;

/// 저장 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportRecord {
    pub ticker: String,
    pub period: String,
    pub interval: String,
    pub start: usize,
    pub end: usize,
}

impl ViewportRecord {
    fn from_state(state: &ViewportState) -> Self {
        Self {
            ticker: state.key.ticker.clone(),
            period: state.key.period.clone(),
            interval: state.key.interval.clone(),
            start: state.start(),
            end: state.end(),
        }
    }

    fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.ticker, &self.period, &self.interval)
    }
}

// =============================================================================
// 저장 백엔드
// =============================================================================

/// 뷰포트 레코드 저장 백엔드.
pub trait ViewportPersistence: Send + Sync {
    /// 저장된 모든 레코드를 읽습니다. 손상된 레코드는 건너뜁니다.
    fn read_all(&self) -> ChartResult<Vec<ViewportRecord>>;

    /// 전체 레코드를 기록합니다.
    fn write_all(&self, records: &[ViewportRecord]) -> ChartResult<()>;
}

/// JSON 파일 백엔드.
///
/// 임시 파일에 쓴 뒤 rename 하므로 기록 도중 중단되어도 기존 파일이 깨지지
/// 않습니다.
#[derive(Debug, Clone)]
pub struct FileViewportBackend {
    path: PathBuf,
}

impl FileViewportBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "viewports.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ViewportPersistence for FileViewportBackend {
    fn read_all(&self) -> ChartResult<Vec<ViewportRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // 파일 전체가 깨졌으면 빈 저장소로 취급
        let raw: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), "Unreadable viewport file: {}", e);
                return Ok(Vec::new());
            }
        };

        Ok(raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Discarding malformed viewport record: {}", e);
                    None
                }
            })
            .collect())
    }

    fn write_all(&self, records: &[ViewportRecord]) -> ChartResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(records)?;
        let temp = self.temp_path();
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// 메모리 백엔드. 테스트와 임시 세션용.
#[derive(Debug, Default)]
pub struct MemoryViewportBackend {
    records: Mutex<Vec<ViewportRecord>>,
}

impl MemoryViewportBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewportPersistence for MemoryViewportBackend {
    fn read_all(&self) -> ChartResult<Vec<ViewportRecord>> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|e| ChartError::Internal(e.to_string()))
    }

    fn write_all(&self, records: &[ViewportRecord]) -> ChartResult<()> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| ChartError::Internal(e.to_string()))?;
        *guard = records.to_vec();
        Ok(())
    }
}

// =============================================================================
// ViewportStore
// =============================================================================

/// 시리즈별 뷰포트 창 저장소.
pub struct ViewportStore {
    backend: Box<dyn ViewportPersistence>,
}

impl ViewportStore {
    pub fn new(backend: impl ViewportPersistence + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// 메모리 백엔드 저장소.
    pub fn in_memory() -> Self {
        Self::new(MemoryViewportBackend::new())
    }

    /// JSON 파일 백엔드 저장소.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileViewportBackend::new(path))
    }

    /// 저장된 창을 길이 `len`인 시리즈에 맞춰 복원합니다.
    ///
    /// 저장 상태가 없거나, 읽을 수 없거나, 구조적으로 잘못되면 `None`.
    pub fn load(&self, key: &SeriesKey, len: usize) -> Option<ViewportState> {
        let records = match self.backend.read_all() {
            Ok(records) => records,
            Err(e) => {
                warn!(series = %key, "Failed to read viewport state: {}", e);
                return None;
            }
        };

        let record = records.into_iter().find(|r| &r.key() == key)?;
        let state = ViewportState::clamped(key.clone(), record.start, record.end, len);
        if state.is_none() {
            debug!(series = %key, start = record.start, end = record.end, "Discarding invalid viewport");
        }
        state
    }

    /// 저장된 창이 있으면 복원하고, 없으면 전체 시리즈 창.
    pub fn load_or_default(&self, key: &SeriesKey, len: usize) -> ViewportState {
        self.load(key, len)
            .unwrap_or_else(|| ViewportState::full(key.clone(), len))
    }

    /// `{start, end}`를 저장합니다. 같은 키의 기존 레코드는 교체됩니다.
    pub fn save(&self, state: &ViewportState) -> ChartResult<()> {
        let mut records = self.backend.read_all()?;
        let record = ViewportRecord::from_state(state);

        match records.iter_mut().find(|r| r.key() == state.key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.backend.write_all(&records)?;

        debug!(series = %state.key, start = state.start(), end = state.end(), "Viewport saved");
        Ok(())
    }

    /// 키에 해당하는 저장 레코드를 삭제합니다.
    pub fn forget(&self, key: &SeriesKey) -> ChartResult<bool> {
        let mut records = self.backend.read_all()?;
        let before = records.len();
        records.retain(|r| &r.key() != key);
        if records.len() == before {
            return Ok(false);
        }
        self.backend.write_all(&records)?;
        Ok(true)
    }
}
