//! 클라이언트 에러 타입.

use thiserror::Error;
use watchdesk_core::{ErrorKind, WatchError};

/// 원격 API 및 동기화 계층 에러.
#[derive(Debug, Error)]
pub enum ClientError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 서버가 실패 상태 코드를 반환
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// 엔티티를 찾을 수 없음 (동시에 삭제됨)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 스트림이 종료 이벤트 없이 닫힘
    #[error("Stream closed: {0}")]
    StreamClosed(String),

    /// 입력 검증 실패
    #[error("Validation error: {0}")]
    Validation(String),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 클라이언트 작업을 위한 Result 타입.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// 에러 분류 반환.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::NetworkError(_)
            | ClientError::Timeout(_)
            | ClientError::ApiError { .. }
            | ClientError::StreamClosed(_) => ErrorKind::Transport,
            ClientError::NotFound(_) => ErrorKind::NotFound,
            ClientError::ParseError(_) => ErrorKind::MalformedData,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 전송 계층 에러인지 확인.
    ///
    /// 전송 에러는 자동 재시도하지 않습니다. 스트림은 실패로 끝나고
    /// 스로틀된 갱신은 조용히 건너뜁니다.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// 엔티티가 이미 삭제된 경우인지 확인.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::ParseError(err.to_string())
        } else {
            ClientError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::ParseError(err.to_string())
    }
}

impl From<WatchError> for ClientError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::MalformedData(msg) | WatchError::Serialization(msg) => {
                ClientError::ParseError(msg)
            }
            WatchError::NotFound(msg) => ClientError::NotFound(msg),
            WatchError::Validation(msg) => ClientError::Validation(msg),
            WatchError::Config(msg) | WatchError::Internal(msg) => ClientError::Internal(msg),
        }
    }
}
