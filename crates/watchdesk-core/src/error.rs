//! 관심종목 클라이언트의 에러 타입.
//!
//! 도메인 계층에서 발생하는 에러를 정의합니다. 네트워크 계층 에러는
//! `watchdesk-client`의 `ClientError`가 담당하며, 두 타입 모두 같은
//! [`ErrorKind`] 분류를 공유합니다.

use thiserror::Error;

/// 에러 분류.
///
/// 호출 지점에서 어떻게 강등(degrade)할지 결정하는 기준입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 네트워크/스트림 실패 (자동 재시도 없음)
    Transport,
    /// 파싱할 수 없는 페이로드 또는 손상된 저장 상태 (해당 레코드만 폐기)
    MalformedData,
    /// 이미 삭제된 엔티티를 대상으로 한 작업
    NotFound,
    /// 사용자 입력 검증 실패
    Validation,
    /// 그 외 내부 에러
    Internal,
}

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum WatchError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 데이터 (파싱 실패, 길이 불일치 등)
    #[error("잘못된 데이터: {0}")]
    MalformedData(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 입력 검증 실패
    #[error("입력 검증 실패: {0}")]
    Validation(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type WatchResult<T> = Result<T, WatchError>;

impl WatchError {
    /// 에러 분류 반환.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::MalformedData(_) | WatchError::Serialization(_) => {
                ErrorKind::MalformedData
            }
            WatchError::NotFound(_) => ErrorKind::NotFound,
            WatchError::Validation(_) => ErrorKind::Validation,
            WatchError::Config(_) | WatchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 해당 레코드만 버리고 처리를 계속해도 되는 에러인지 확인합니다.
    pub fn is_discardable(&self) -> bool {
        matches!(self.kind(), ErrorKind::MalformedData | ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        WatchError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for WatchError {
    fn from(err: validator::ValidationErrors) -> Self {
        WatchError::Validation(err.to_string())
    }
}
