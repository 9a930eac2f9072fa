//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 원격 API 설정
    pub api: ApiConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 스냅샷 갱신 스로틀 설정
    pub refresh: RefreshConfig,
    /// 목록 화면 배치 갱신 설정
    pub feed: FeedConfig,
    /// 뷰포트 상태 저장 설정
    pub viewport: ViewportConfig,
    /// 차트 렌더링 설정
    pub chart: ChartConfig,
}

/// 원격 API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 서버 기본 URL
    pub base_url: String,
    /// 일반 요청 타임아웃 (초). 분석 스트림에는 적용하지 않습니다.
    pub request_timeout_secs: u64,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5055".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

impl ApiConfig {
    /// 요청 타임아웃을 Duration으로 반환.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 연결 타임아웃을 Duration으로 반환.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// span 시작/종료 기록
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            span_events: false,
        }
    }
}

/// 스냅샷 갱신 스로틀 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// 엔티티별 최소 갱신 간격 (초)
    pub cooldown_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { cooldown_secs: 10 }
    }
}

impl RefreshConfig {
    /// 쿨다운을 Duration으로 반환.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// 목록 화면 배치 갱신 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// 배치 갱신 시 호출 간 지연 (밀리초)
    pub stagger_ms: u64,
    /// 렌더 1회당 갱신할 최대 엔티티 수
    pub max_per_pass: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            stagger_ms: 250,
            max_per_pass: 6,
        }
    }
}

impl FeedConfig {
    /// 배치 지연을 Duration으로 반환.
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// 뷰포트 상태 저장 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// 뷰포트 창(window) 저장 파일 경로
    pub state_path: String,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            state_path: "data/viewports.json".to_string(),
        }
    }
}

/// 차트 렌더링 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChartConfig {
    /// 출력 너비 (px)
    pub width: f64,
    /// 출력 높이 (px)
    pub height: f64,
    /// 수평 그리드 분할 수 (고정)
    pub horizontal_divisions: usize,
    /// 수직 그리드 한 칸의 목표 너비 (px)
    pub vertical_spacing_px: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 320.0,
            horizontal_divisions: 4,
            vertical_spacing_px: 120.0,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("api.base_url", "http://127.0.0.1:5055")?
            .set_default("refresh.cooldown_secs", 10)?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("WATCHDESK")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}
