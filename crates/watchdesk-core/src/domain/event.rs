//! 분석 스트림 이벤트.
//!
//! `/api/analyze-stream/{id}`는 SSE 프레임마다 `type` 필드로 구분되는
//! JSON 객체 하나를 보냅니다.

use serde::{Deserialize, Serialize};

use super::entity::Suggestion;
use crate::error::{WatchError, WatchResult};

/// 분석 진행 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnalysisEvent {
    /// 분석 시작
    Start {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        tickers: Vec<String>,
    },
    /// 종목 분석 시작
    TickerStart { ticker: String },
    /// 진행 로그 한 줄
    Log {
        #[serde(default)]
        ticker: Option<String>,
        #[serde(default)]
        message: String,
    },
    /// 종목 분석 완료
    TickerDone {
        ticker: String,
        #[serde(default)]
        suggestion: Suggestion,
        #[serde(default)]
        current: Option<f64>,
        #[serde(default)]
        pct: Option<f64>,
    },
    /// 종목 분석 실패 (스트림은 계속됨)
    TickerError {
        ticker: String,
        #[serde(default)]
        error: String,
    },
    /// 전체 분석 완료
    Done {
        #[serde(default)]
        id: Option<String>,
    },
    /// 치명적 실패 (스트림 종료)
    Error {
        #[serde(default)]
        message: String,
    },
}

impl AnalysisEvent {
    /// SSE `data:` 페이로드를 이벤트로 파싱합니다.
    pub fn parse(data: &str) -> WatchResult<Self> {
        serde_json::from_str(data)
            .map_err(|e| WatchError::MalformedData(format!("분석 이벤트 파싱 실패: {}", e)))
    }

    /// 스트림을 끝내는 이벤트인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisEvent::Done { .. } | AnalysisEvent::Error { .. })
    }

    /// 이벤트 타입 이름 (로그용).
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisEvent::Start { .. } => "start",
            AnalysisEvent::TickerStart { .. } => "ticker-start",
            AnalysisEvent::Log { .. } => "log",
            AnalysisEvent::TickerDone { .. } => "ticker-done",
            AnalysisEvent::TickerError { .. } => "ticker-error",
            AnalysisEvent::Done { .. } => "done",
            AnalysisEvent::Error { .. } => "error",
        }
    }

    /// 이벤트가 가리키는 종목.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            AnalysisEvent::TickerStart { ticker }
            | AnalysisEvent::TickerDone { ticker, .. }
            | AnalysisEvent::TickerError { ticker, .. } => Some(ticker),
            AnalysisEvent::Log { ticker, .. } => ticker.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_done() {
        let event = AnalysisEvent::parse(
            r#"{"type":"ticker-done","ticker":"AAPL","suggestion":"BUY now","current":190.5,"pct":null}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            AnalysisEvent::TickerDone {
                ticker: "AAPL".to_string(),
                suggestion: Suggestion::Buy,
                current: Some(190.5),
                pct: None,
            }
        );
        assert!(!event.is_terminal());
        assert_eq!(event.ticker(), Some("AAPL"));
    }

    #[test]
    fn test_parse_log_and_terminals() {
        let log = AnalysisEvent::parse(r#"{"type":"log","ticker":"MSFT","message":"fetching"}"#)
            .unwrap();
        assert_eq!(log.name(), "log");

        let done = AnalysisEvent::parse(r#"{"type":"done","id":"p-1"}"#).unwrap();
        assert!(done.is_terminal());

        let error = AnalysisEvent::parse(r#"{"type":"error","message":"Not found"}"#).unwrap();
        assert!(error.is_terminal());
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err = AnalysisEvent::parse(r#"{"type":"heartbeat"}"#).unwrap_err();
        assert!(err.is_discardable());
        assert!(AnalysisEvent::parse("not json").is_err());
    }
}
