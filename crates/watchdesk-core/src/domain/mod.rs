//! 도메인 모델.
//!
//! - `entity`: 관심 그룹 엔티티, 스냅샷, 분석 결과
//! - `series`: 차트 시계열과 시리즈 키
//! - `event`: 분석 스트림 이벤트
//! - `draft`: 생성/수정 요청 검증

pub mod draft;
pub mod entity;
pub mod event;
pub mod series;

pub use draft::{EntityDraft, EntityUpdate};
pub use entity::{
    percent_change, row_suggestion, Analysis, Entity, Purchases, SnapshotEntry, Suggestion,
    TickerVerdict,
};
pub use event::AnalysisEvent;
pub use series::{Series, SeriesKey, DEFAULT_INTERVAL, DEFAULT_PERIOD};

use serde::{Deserialize, Deserializer};

/// `null`을 기본값으로 취급하는 역직렬화 헬퍼.
///
/// 서버 데이터 파일은 수동 편집되기도 하므로 컬렉션/문자열 필드에
/// `null`이 들어올 수 있습니다.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
