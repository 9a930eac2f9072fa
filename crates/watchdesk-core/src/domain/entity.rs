//! 관심 그룹 엔티티.
//!
//! 서버(`/api/stocks`)가 반환하는 JSON 형태를 그대로 따릅니다.
//!
//! ```json
//! {
//!   "id": "7c1f...",
//!   "title": "Big Tech",
//!   "tickers": ["AAPL", "MSFT"],
//!   "purchases": {"AAPL": 150.0},
//!   "snapshot": {"AAPL": {"current": 190.1, "pct": 26.7}},
//!   "analysis": {"per_ticker": {"AAPL": {"suggestion": "Buy", "signals": {}}}, "summary": "..."},
//!   "createdAt": "2024-05-01T12:00:00.000000Z",
//!   "updatedAt": "2024-05-02T08:30:00.000000Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::null_as_default;

/// 종목별 매매 의견.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Suggestion {
    /// 매수
    Buy,
    /// 매도
    Sell,
    /// 보유 (의견 없음 포함)
    #[default]
    Hold,
}

impl Suggestion {
    /// 자유 형식 텍스트를 의견으로 정규화합니다.
    ///
    /// "buy"가 포함되면 매수, "sell"이 포함되면 매도, 그 외는 보유입니다.
    pub fn normalize(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.contains("buy") {
            Suggestion::Buy
        } else if lower.contains("sell") {
            Suggestion::Sell
        } else {
            Suggestion::Hold
        }
    }

    /// 표시용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Suggestion::Buy => "Buy",
            Suggestion::Sell => "Sell",
            Suggestion::Hold => "Hold",
        }
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Suggestion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Suggestion::normalize(&s)).unwrap_or_default())
    }
}

/// 종목별 최신 시세 스냅샷.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// 현재가
    #[serde(default)]
    pub current: Option<f64>,
    /// 매입가 대비 변동률 (%)
    #[serde(default)]
    pub pct: Option<f64>,
}

impl SnapshotEntry {
    /// 새 스냅샷 항목 생성.
    pub fn new(current: Option<f64>, pct: Option<f64>) -> Self {
        Self { current, pct }
    }
}

/// 종목별 분석 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerVerdict {
    /// 매매 의견
    #[serde(default)]
    pub suggestion: Suggestion,
    /// 분석 근거 (서버가 정의하는 임의 구조)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub signals: serde_json::Value,
}

impl TickerVerdict {
    /// 근거 없이 의견만 담은 결과 생성.
    pub fn new(suggestion: Suggestion) -> Self {
        Self {
            suggestion,
            signals: serde_json::Value::Null,
        }
    }
}

/// 엔티티 분석 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// 종목별 결과
    #[serde(
        default,
        rename = "per_ticker",
        alias = "perTicker",
        deserialize_with = "null_as_default"
    )]
    pub per_ticker: BTreeMap<String, TickerVerdict>,
    /// 요약 (종목당 한 줄)
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    /// 스트리밍 분석 로그 누적본
    #[serde(default, deserialize_with = "null_as_default")]
    pub report: String,
    /// 분석 갱신 시각
    #[serde(
        default,
        rename = "updatedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Analysis {
    /// 종목의 매매 의견 조회.
    pub fn suggestion_for(&self, ticker: &str) -> Option<Suggestion> {
        self.per_ticker.get(ticker).map(|v| v.suggestion)
    }
}

/// 매입가 정보.
///
/// 종목별 매입가 맵이 일반적이지만, 오래된 데이터에는 모든 종목에
/// 공통으로 적용되는 단일 숫자가 들어 있기도 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Purchases {
    /// 종목별 매입가
    PerTicker(BTreeMap<String, f64>),
    /// 모든 종목 공통 매입가
    Uniform(f64),
}

impl Default for Purchases {
    fn default() -> Self {
        Purchases::PerTicker(BTreeMap::new())
    }
}

impl Purchases {
    /// 종목의 매입가 조회.
    pub fn basis_for(&self, ticker: &str) -> Option<f64> {
        match self {
            Purchases::PerTicker(map) => map.get(ticker).copied(),
            Purchases::Uniform(price) => Some(*price),
        }
    }
}

/// 관심 그룹 엔티티.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// 불투명 ID
    pub id: String,
    /// 제목
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// 설명
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
    /// 추적 종목 (순서 유지, 첫 번째가 대표 종목)
    #[serde(default, deserialize_with = "null_as_default")]
    pub tickers: Vec<String>,
    /// 매입가
    #[serde(default, deserialize_with = "null_as_default")]
    pub purchases: Purchases,
    /// 분석 옵션 (서버 전용, 클라이언트는 그대로 보존)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
    /// 종목별 시세 스냅샷
    #[serde(default, deserialize_with = "null_as_default")]
    pub snapshot: BTreeMap<String, SnapshotEntry>,
    /// 마지막 분석 결과
    #[serde(default)]
    pub analysis: Option<Analysis>,
    /// 생성 시각
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    /// 갱신 시각
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// 최소 필드로 엔티티 생성.
    pub fn new(id: impl Into<String>, title: impl Into<String>, tickers: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            tickers,
            purchases: Purchases::default(),
            options: serde_json::Value::Null,
            snapshot: BTreeMap::new(),
            analysis: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// 대표 종목 (첫 번째 종목).
    pub fn primary_ticker(&self) -> Option<&str> {
        self.tickers.first().map(String::as_str)
    }

    /// 추적 중인 종목을 대소문자 구분 없이 찾아 저장된 표기로 반환.
    pub fn tracked_ticker(&self, ticker: &str) -> Option<&str> {
        self.tickers
            .iter()
            .find(|t| t.eq_ignore_ascii_case(ticker))
            .map(String::as_str)
    }

    /// 종목의 현재가.
    pub fn current_price(&self, ticker: &str) -> Option<f64> {
        self.snapshot.get(ticker).and_then(|s| s.current)
    }

    /// 종목의 매입가 대비 변동률.
    ///
    /// 스냅샷에 저장된 값이 있으면 그것을, 없으면 현재가와 매입가로 계산합니다.
    pub fn pct_change(&self, ticker: &str) -> Option<f64> {
        let entry = self.snapshot.get(ticker)?;
        entry
            .pct
            .or_else(|| percent_change(self.purchases.basis_for(ticker), entry.current))
    }

    /// 목록 행에 표시할 매매 의견.
    pub fn row_suggestion(&self) -> Suggestion {
        match self.primary_ticker() {
            Some(primary) => row_suggestion(self.analysis.as_ref(), primary),
            None => Suggestion::Hold,
        }
    }
}

/// 매입가 대비 변동률 (%) 계산.
///
/// 매입가가 없거나 0이면 계산하지 않습니다.
pub fn percent_change(purchase: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (purchase, current) {
        (Some(buy), Some(cur)) if buy != 0.0 => Some((cur - buy) / buy * 100.0),
        _ => None,
    }
}

/// 대표 종목의 매매 의견. 분석 결과가 없으면 보유(Hold).
pub fn row_suggestion(analysis: Option<&Analysis>, primary: &str) -> Suggestion {
    analysis
        .and_then(|a| a.suggestion_for(primary))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> serde_json::Value {
        json!({
            "id": "p-1",
            "title": "Big Tech",
            "description": "",
            "tickers": ["AAPL", "MSFT"],
            "options": {},
            "purchases": {"AAPL": 100.0},
            "analysis": {
                "per_ticker": {
                    "AAPL": {"suggestion": "Strong BUY", "signals": {"note": "stub"}},
                    "MSFT": {"suggestion": null}
                },
                "summary": null,
                "updatedAt": "2024-05-02T08:30:00.123456Z"
            },
            "snapshot": {"AAPL": {"current": 120.0, "pct": null}},
            "createdAt": "2024-05-01T12:00:00.000000Z",
            "updatedAt": "2024-05-02T08:30:00.123456Z"
        })
    }

    #[test]
    fn test_deserialize_server_shape() {
        let entity: Entity = serde_json::from_value(sample_json()).unwrap();

        assert_eq!(entity.id, "p-1");
        assert_eq!(entity.primary_ticker(), Some("AAPL"));
        let analysis = entity.analysis.as_ref().unwrap();
        assert_eq!(analysis.suggestion_for("AAPL"), Some(Suggestion::Buy));
        assert_eq!(analysis.suggestion_for("MSFT"), Some(Suggestion::Hold));
        assert_eq!(analysis.summary, "");
        assert!(entity.updated_at.is_some());
    }

    #[test]
    fn test_per_ticker_camel_case_alias() {
        let analysis: Analysis =
            serde_json::from_value(json!({"perTicker": {"TSLA": {"suggestion": "Sell"}}}))
                .unwrap();
        assert_eq!(analysis.suggestion_for("TSLA"), Some(Suggestion::Sell));
    }

    #[test]
    fn test_uniform_purchase_price() {
        let entity: Entity = serde_json::from_value(json!({
            "id": "p-2",
            "tickers": ["SPY", "QQQ"],
            "purchases": 50.0,
            "snapshot": {"QQQ": {"current": 75.0}}
        }))
        .unwrap();

        assert_eq!(entity.purchases.basis_for("SPY"), Some(50.0));
        assert_eq!(entity.pct_change("QQQ"), Some(50.0));
        assert_eq!(entity.pct_change("SPY"), None);
    }

    #[test]
    fn test_tracked_ticker_ignores_case() {
        let entity: Entity = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(entity.tracked_ticker("msft"), Some("MSFT"));
        assert_eq!(entity.tracked_ticker("TSLA"), None);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(Some(100.0), Some(110.0)), Some(10.0));
        assert_eq!(percent_change(Some(0.0), Some(110.0)), None);
        assert_eq!(percent_change(None, Some(110.0)), None);
        assert_eq!(percent_change(Some(100.0), None), None);
    }

    #[test]
    fn test_row_suggestion_without_analysis_is_hold() {
        let entity = Entity::new("p-3", "No analysis", vec!["NVDA".to_string()]);
        assert!(entity.analysis.is_none());
        assert_eq!(entity.row_suggestion(), Suggestion::Hold);
        assert_eq!(row_suggestion(None, "NVDA").as_str(), "Hold");
    }

    #[test]
    fn test_row_suggestion_uses_primary_ticker() {
        let entity: Entity = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(entity.row_suggestion(), Suggestion::Buy);
    }

    #[test]
    fn test_suggestion_normalize() {
        assert_eq!(Suggestion::normalize("FINAL DECISION: SELL"), Suggestion::Sell);
        assert_eq!(Suggestion::normalize("buy"), Suggestion::Buy);
        assert_eq!(Suggestion::normalize(""), Suggestion::Hold);
        assert_eq!(Suggestion::normalize("wait and see"), Suggestion::Hold);
    }
}
