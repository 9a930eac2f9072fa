//! 차트 뷰포트 엔진.
//!
//! - `viewport`: 보이는 구간과 호버 상태 전이
//! - `persist`: 시리즈별 창 저장/복원
//! - `render`: 순수 렌더링 함수
//! - `interaction`: 입력 → 전이 → 렌더

pub mod error;
pub mod format;
pub mod interaction;
pub mod persist;
pub mod render;
pub mod viewport;

pub use error::{ChartError, ChartResult};
pub use interaction::{ChartSession, InputEvent, KeyCommand};
pub use persist::{
    FileViewportBackend, MemoryViewportBackend, ViewportPersistence, ViewportRecord, ViewportStore,
};
pub use render::{render, ChartLayout, DrawCommand, Frame, Paint, PriceAnnotation, NO_DATA};
pub use viewport::{min_window, ViewportState, MIN_WINDOW};
