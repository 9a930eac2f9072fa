//! CLI 명령어 구현 모듈.

pub mod analyze;
pub mod chart;
pub mod entities;
pub mod output;
pub mod refresh;
