//! 차트 계층 에러 타입.

use thiserror::Error;
use watchdesk_core::ErrorKind;

/// 뷰포트 저장/렌더링 에러.
#[derive(Debug, Error)]
pub enum ChartError {
    /// 파일 입출력 에러
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 손상된 저장 상태
    #[error("Malformed viewport state: {0}")]
    Malformed(String),

    /// 내부 에러 (잠금 오염 등)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 차트 작업 Result 타입.
pub type ChartResult<T> = Result<T, ChartError>;

impl ChartError {
    /// 에러 분류 반환.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChartError::Io(_) | ChartError::Internal(_) => ErrorKind::Internal,
            ChartError::Malformed(_) => ErrorKind::MalformedData,
        }
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Malformed(err.to_string())
    }
}
