//! 관심종목 CLI 도구.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 엔티티 조회/생성/수정/삭제/정렬
//! - 스냅샷 갱신과 요약
//! - 분석 실행 및 스트림 추적
//! - 차트 뷰포트 조작과 렌더링

pub mod commands;

pub use commands::*;
