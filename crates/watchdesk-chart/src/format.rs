//! 축 레이블 포맷.

use chrono::DateTime;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// 값 축 레이블. 1,000 이상은 K/M/B 접미사로 줄입니다.
pub fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}

/// 시간 축 레이블 단위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeGranularity {
    /// 시:분
    Time,
    /// 월-일
    Day,
    /// 연-월
    Month,
    /// 연도
    Year,
}

impl TimeGranularity {
    /// 보이는 구간 길이(밀리초)에 맞는 단위.
    pub fn for_span(span_ms: i64) -> Self {
        let span = span_ms.max(0);
        if span <= 2 * DAY_MS {
            TimeGranularity::Time
        } else if span <= 120 * DAY_MS {
            TimeGranularity::Day
        } else if span <= 3 * 365 * DAY_MS {
            TimeGranularity::Month
        } else {
            TimeGranularity::Year
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            TimeGranularity::Time => "%H:%M",
            TimeGranularity::Day => "%m-%d",
            TimeGranularity::Month => "%Y-%m",
            TimeGranularity::Year => "%Y",
        }
    }

    /// 밀리초 타임스탬프를 UTC 기준으로 포맷.
    pub fn format(&self, millis: i64) -> String {
        match DateTime::from_timestamp_millis(millis) {
            Some(dt) => dt.format(self.pattern()).to_string(),
            None => String::new(),
        }
    }
}

/// 호버 태그용 전체 날짜.
pub fn format_timestamp(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}

/// 변동률 표기 (`+1.23%`).
pub fn format_pct(pct: f64) -> String {
    format!("{:+.2}%", pct)
}
