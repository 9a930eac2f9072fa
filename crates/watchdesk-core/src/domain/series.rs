//! 차트 시계열.
//!
//! `/api/chart` 응답은 타임스탬프와 종가 배열 한 쌍입니다. 타임스탬프는
//! 밀리초 정수가 일반적이지만 초 단위 실수나 날짜 문자열이 섞여 올 수 있어
//! 역직렬화 단계에서 모두 UTC 밀리초로 정규화합니다.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{WatchError, WatchResult};

/// 기본 조회 기간.
pub const DEFAULT_PERIOD: &str = "6mo";
/// 기본 봉 간격.
pub const DEFAULT_INTERVAL: &str = "1d";

/// 시리즈 식별자 (종목, 기간, 간격).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// 종목 (대문자)
    pub ticker: String,
    /// 조회 기간 (예: "6mo")
    pub period: String,
    /// 봉 간격 (예: "1d")
    pub interval: String,
}

impl SeriesKey {
    /// 새 시리즈 키 생성. 종목은 대문자로 정규화합니다.
    pub fn new(
        ticker: impl AsRef<str>,
        period: impl Into<String>,
        interval: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.as_ref().trim().to_uppercase(),
            period: period.into(),
            interval: interval.into(),
        }
    }

    /// 기본 기간/간격으로 시리즈 키 생성.
    pub fn daily(ticker: impl AsRef<str>) -> Self {
        Self::new(ticker, DEFAULT_PERIOD, DEFAULT_INTERVAL)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.ticker, self.period, self.interval)
    }
}

/// 서버가 보내는 타임스탬프 원본 형태.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

// 이 값 미만의 숫자는 초 단위로 간주 (2001-09-09 이후의 밀리초는 항상 이보다 큼)
const SECONDS_THRESHOLD: f64 = 1.0e11;

impl RawTimestamp {
    fn to_millis(&self) -> WatchResult<i64> {
        match self {
            RawTimestamp::Int(v) => Ok(numeric_millis(*v as f64)),
            RawTimestamp::Float(v) if v.is_finite() => Ok(numeric_millis(*v)),
            RawTimestamp::Float(v) => Err(WatchError::MalformedData(format!(
                "유한하지 않은 타임스탬프: {}",
                v
            ))),
            RawTimestamp::Text(s) => parse_text_timestamp(s),
        }
    }
}

fn numeric_millis(value: f64) -> i64 {
    if value.abs() < SECONDS_THRESHOLD {
        (value * 1000.0).round() as i64
    } else {
        value.round() as i64
    }
}

fn parse_text_timestamp(text: &str) -> WatchResult<i64> {
    let s = text.trim();

    if let Ok(v) = s.parse::<f64>() {
        if v.is_finite() {
            return Ok(numeric_millis(v));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }

    Err(WatchError::MalformedData(format!(
        "해석할 수 없는 타임스탬프: {}",
        text
    )))
}

/// `/api/chart` 응답 원본.
#[derive(Debug, Clone, Deserialize)]
struct RawSeries {
    #[serde(default)]
    timestamps: Vec<RawTimestamp>,
    #[serde(default)]
    closes: Vec<f64>,
}

/// 시간순 종가 시계열.
///
/// 타임스탬프와 종가의 길이는 항상 같습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct Series {
    timestamps: Vec<i64>,
    closes: Vec<f64>,
}

impl TryFrom<RawSeries> for Series {
    type Error = WatchError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        let timestamps = raw
            .timestamps
            .iter()
            .map(RawTimestamp::to_millis)
            .collect::<WatchResult<Vec<_>>>()?;
        Series::new(timestamps, raw.closes)
    }
}

impl Series {
    /// 밀리초 타임스탬프와 종가로 시리즈 생성.
    pub fn new(timestamps: Vec<i64>, closes: Vec<f64>) -> WatchResult<Self> {
        if timestamps.len() != closes.len() {
            return Err(WatchError::MalformedData(format!(
                "시계열 길이 불일치: timestamps={}, closes={}",
                timestamps.len(),
                closes.len()
            )));
        }
        if let Some(bad) = closes.iter().find(|c| !c.is_finite()) {
            return Err(WatchError::MalformedData(format!(
                "유한하지 않은 종가: {}",
                bad
            )));
        }
        Ok(Self { timestamps, closes })
    }

    /// 빈 시리즈.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// `[start, end)` 구간 슬라이스. 범위를 벗어나면 잘라냅니다.
    pub fn window(&self, start: usize, end: usize) -> (&[i64], &[f64]) {
        let end = end.min(self.len());
        let start = start.min(end);
        (&self.timestamps[start..end], &self.closes[start..end])
    }

    /// 마지막 종가.
    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// 인덱스의 (타임스탬프, 종가).
    pub fn point(&self, index: usize) -> Option<(i64, f64)> {
        Some((*self.timestamps.get(index)?, *self.closes.get(index)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_series_key_normalizes_ticker() {
        let key = SeriesKey::daily(" aapl ");
        assert_eq!(key.ticker, "AAPL");
        assert_eq!(key.period, "6mo");
        assert_eq!(key.interval, "1d");
        assert_eq!(key.to_string(), "AAPL/6mo/1d");
    }

    #[test]
    fn test_millisecond_timestamps() {
        let series: Series = serde_json::from_value(json!({
            "timestamps": [1_700_000_000_000i64, 1_700_086_400_000i64],
            "closes": [10.0, 11.5]
        }))
        .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.timestamps()[0], 1_700_000_000_000);
        assert_eq!(series.last_close(), Some(11.5));
    }

    #[test]
    fn test_mixed_timestamp_forms() {
        let series: Series = serde_json::from_value(json!({
            "timestamps": [1_700_000_000, 1_700_000_060.5, "2024-01-02", "2024-01-02T10:00:00Z"],
            "closes": [1.0, 2.0, 3.0, 4.0]
        }))
        .unwrap();

        let ts = series.timestamps();
        assert_eq!(ts[0], 1_700_000_000_000);
        assert_eq!(ts[1], 1_700_000_060_500);
        assert_eq!(ts[2], 1_704_153_600_000);
        assert_eq!(ts[3], 1_704_189_600_000);
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let err = Series::new(vec![1, 2, 3], vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedData);

        let parsed = serde_json::from_value::<Series>(json!({
            "timestamps": [1, 2],
            "closes": [1.0]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unparseable_timestamp_is_rejected() {
        let parsed = serde_json::from_value::<Series>(json!({
            "timestamps": ["yesterday"],
            "closes": [1.0]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_window_clamps() {
        let series = Series::new(vec![1, 2, 3, 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let (ts, closes) = series.window(1, 10);
        assert_eq!(ts, &[2, 3, 4]);
        assert_eq!(closes, &[2.0, 3.0, 4.0]);

        let (ts, _) = series.window(5, 2);
        assert!(ts.is_empty());
    }
}
