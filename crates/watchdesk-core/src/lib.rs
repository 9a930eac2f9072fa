//! # Watchdesk Core
//!
//! 관심종목(watch) 클라이언트의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 클라이언트 전반에서 사용되는 기본 타입을 제공합니다:
//! - 엔티티(관심 그룹) 및 스냅샷/분석 결과
//! - 차트 시계열과 시리즈 키
//! - 분석 스트림 이벤트
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
