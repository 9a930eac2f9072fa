//! 엔티티 생성/수정 요청.
//!
//! 서버로 보내기 전에 입력을 정규화하고 `validator`로 검증합니다.

use serde::Serialize;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use crate::error::WatchResult;

/// 제목이 비어 있을 때 사용하는 기본 제목.
pub const DEFAULT_TITLE: &str = "Untitled";

// ==================== 커스텀 검증 함수 ====================

/// 종목 심볼 검증 (영문 대문자/숫자와 `.`, `-`, `^`, `=`만 허용, 1-15자)
fn validate_tickers(tickers: &[String]) -> Result<(), ValidationError> {
    for ticker in tickers {
        let valid_len = (1..=15).contains(&ticker.len());
        let valid_chars = ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || ".-^=".contains(c));
        if !valid_len || !valid_chars {
            return Err(ValidationError::new("invalid_ticker")
                .with_message(format!("잘못된 종목 심볼입니다: {}", ticker).into()));
        }
    }
    Ok(())
}

/// 매입가 검증 (유한한 0 이상의 값)
fn validate_purchases(purchases: &BTreeMap<String, f64>) -> Result<(), ValidationError> {
    for (ticker, price) in purchases {
        if !price.is_finite() || *price < 0.0 {
            return Err(ValidationError::new("invalid_purchase_price")
                .with_message(format!("{} 매입가는 0 이상의 숫자여야 합니다", ticker).into()));
        }
    }
    Ok(())
}

fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_tickers(tickers: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let t = ticker.trim().to_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn normalize_purchases(purchases: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    purchases
        .iter()
        .map(|(k, v)| (k.trim().to_uppercase(), *v))
        .collect()
}

// ==================== 요청 타입 ====================

/// 엔티티 생성 요청 (`POST /api/stocks`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
pub struct EntityDraft {
    /// 제목
    #[validate(length(min = 1, max = 120, message = "제목은 1-120자여야 합니다"))]
    pub title: String,
    /// 설명
    #[serde(skip_serializing_if = "String::is_empty")]
    #[validate(length(max = 2000, message = "설명은 2000자를 넘을 수 없습니다"))]
    pub description: String,
    /// 추적 종목
    #[validate(
        length(min = 1, max = 50, message = "종목은 1-50개 사이여야 합니다"),
        custom(function = "validate_tickers")
    )]
    pub tickers: Vec<String>,
    /// 종목별 매입가
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[validate(custom(function = "validate_purchases"))]
    pub purchases: BTreeMap<String, f64>,
    /// 분석 옵션 (서버 전달용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl EntityDraft {
    /// 제목과 종목으로 요청 생성.
    pub fn new(title: impl Into<String>, tickers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            tickers,
            ..Default::default()
        }
    }

    /// 설명 설정.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 매입가 추가.
    pub fn with_purchase(mut self, ticker: impl Into<String>, price: f64) -> Self {
        self.purchases.insert(ticker.into(), price);
        self
    }

    /// 정규화 후 검증합니다.
    ///
    /// 제목은 공백 제거 후 비어 있으면 `Untitled`, 종목은 대문자로 바꾸고
    /// 중복을 제거합니다.
    pub fn prepare(self) -> WatchResult<Self> {
        let draft = Self {
            title: normalize_title(&self.title),
            description: self.description.trim().to_string(),
            tickers: normalize_tickers(&self.tickers),
            purchases: normalize_purchases(&self.purchases),
            options: self.options,
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// 엔티티 수정 요청 (`PUT /api/stocks/{id}`). 지정한 필드만 전송됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
pub struct EntityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120, message = "제목은 1-120자여야 합니다"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000, message = "설명은 2000자를 넘을 수 없습니다"))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, max = 50, message = "종목은 1-50개 사이여야 합니다"),
        custom(function = "validate_tickers")
    )]
    pub tickers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_purchases"))]
    pub purchases: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl EntityUpdate {
    /// 변경할 필드가 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tickers.is_none()
            && self.purchases.is_none()
            && self.options.is_none()
    }

    /// 정규화 후 검증합니다.
    pub fn prepare(self) -> WatchResult<Self> {
        let update = Self {
            title: self.title.as_deref().map(normalize_title),
            description: self.description.map(|d| d.trim().to_string()),
            tickers: self.tickers.as_deref().map(normalize_tickers),
            purchases: self.purchases.as_ref().map(normalize_purchases),
            options: self.options,
        };
        update.validate()?;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_prepare_normalizes() {
        let draft = EntityDraft::new(
            "  ",
            vec![" aapl".to_string(), "MSFT".to_string(), "aapl".to_string()],
        )
        .with_purchase("aapl", 150.0)
        .prepare()
        .unwrap();

        assert_eq!(draft.title, DEFAULT_TITLE);
        assert_eq!(draft.tickers, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(draft.purchases.get("AAPL"), Some(&150.0));
    }

    #[test]
    fn test_prepare_requires_ticker() {
        let err = EntityDraft::new("Empty", vec![" ".to_string()])
            .prepare()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_invalid_symbol_and_price() {
        assert!(EntityDraft::new("x", vec!["AA PL".to_string()])
            .prepare()
            .is_err());
        assert!(EntityDraft::new("x", vec!["BRK.B".to_string()])
            .prepare()
            .is_ok());
        assert!(EntityDraft::new("x", vec!["SPY".to_string()])
            .with_purchase("SPY", -1.0)
            .prepare()
            .is_err());
        assert!(EntityDraft::new("x", vec!["SPY".to_string()])
            .with_purchase("SPY", f64::NAN)
            .prepare()
            .is_err());
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = EntityUpdate {
            title: Some("Renamed".to_string()),
            ..Default::default()
        }
        .prepare()
        .unwrap();

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"title": "Renamed"}));
        assert!(!update.is_empty());
        assert!(EntityUpdate::default().is_empty());
    }
}
