//! 관심종목 동기화 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - WatchApi trait: 원격 서버 인터페이스와 HTTP/SSE 구현
//! - EntityStore: 순번 기반 병합을 하는 엔티티 저장소
//! - RefreshThrottler: 엔티티별 쿨다운과 중복 호출 방지
//! - StreamManager: 엔티티당 하나의 분석 스트림
//! - FeedPresenter: 목록 화면과 시차 갱신

pub mod context;
pub mod error;
pub mod feed;
pub mod http;
pub mod sse;
pub mod store;
pub mod stream;
pub mod throttle;
pub mod traits;

pub use context::ClientContext;
pub use error::*;
pub use feed::{FeedPresenter, FeedRow, FeedView, RefreshPass};
pub use http::HttpWatchApi;
pub use store::{EntityPatch, EntityStore, ReloadTicket};
pub use stream::{transition, StreamManager, StreamNotice, StreamSignal, StreamState};
pub use throttle::{RefreshOutcome, RefreshThrottler};
pub use traits::*;
