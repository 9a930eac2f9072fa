//! tracing 기반 로깅 초기화.
//!
//! 레벨은 `RUST_LOG`가 있으면 그것을, 없으면 설정 파일의 `logging.level`을 씁니다.
//! 형식은 `LOG_FORMAT` 환경 변수가 설정 파일보다 우선합니다.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;
use crate::error::{WatchError, WatchResult};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 사람이 읽기 쉬운 여러 줄 형식
    #[default]
    Pretty,
    /// 로그 수집용 JSON
    Json,
    /// 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(WatchError::Config(format!("Unknown log format: {}", s))),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `RUST_LOG`가 없을 때 쓰는 필터 (예: "info,watchdesk_client=debug")
    pub level: String,
    pub format: LogFormat,
    /// 스트림/갱신 span의 시작과 종료도 기록
    pub span_events: bool,
}

impl LogConfig {
    /// 설정 파일의 logging 섹션에서 생성합니다. 알 수 없는 형식은 pretty.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            span_events: config.span_events,
        }
    }

    /// `LOG_FORMAT` 환경 변수로 형식을 덮어씁니다.
    pub fn with_env_overrides(self) -> Self {
        let format = std::env::var("LOG_FORMAT").ok();
        self.override_format(format.as_deref())
    }

    fn override_format(mut self, raw: Option<&str>) -> Self {
        if let Some(Ok(format)) = raw.map(str::parse::<LogFormat>) {
            self.format = format;
        }
        self
    }
}

/// 전역 subscriber를 설치합니다. 두 번째 호출은 에러입니다.
pub fn init_logging(config: &LogConfig) -> WatchResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| WatchError::Config(format!("Invalid log level '{}': {}", config.level, e)))?,
    };

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = fmt::layer().with_target(true).with_span_events(span_events);
    let fmt_layer = match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| WatchError::Config(format!("Logging already initialized: {}", e)))?;

    tracing::debug!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

/// `entity_id` 필드를 가진 span.
#[macro_export]
macro_rules! entity_span {
    ($name:expr, $entity_id:expr) => {
        tracing::info_span!($name, entity_id = %$entity_id)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: format.to_string(),
            span_events: false,
        }
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" COMPACT ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_from_config_section() {
        let config = LogConfig::from_config(&section("debug", "json"));
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.span_events);

        assert_eq!(
            LogConfig::from_config(&section("info", "fancy")).format,
            LogFormat::Pretty
        );
    }

    #[test]
    fn test_env_format_overrides_file() {
        let config = LogConfig::from_config(&section("info", "pretty"));
        assert_eq!(config.clone().override_format(Some("json")).format, LogFormat::Json);
        assert_eq!(config.clone().override_format(Some("xml")).format, LogFormat::Pretty);
        assert_eq!(config.override_format(None).format, LogFormat::Pretty);
    }
}
