//! tracing 기반 로깅 초기화.
//!
//! 출력 형식은 세 가지를 지원합니다:
//! - **pretty**: 개발용
//! - **json**: 로그 수집기 연동용
//! - **compact**: 한 줄 형식

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;
use crate::error::{DashboardError, DashboardResult};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => {
                let message = format!("unknown log format '{}'", other);
                Err(DashboardError::Config(message))
            }
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// 필터 지시자 (예: "info", "dashboard_realtime=debug")
    pub level: String,
    pub format: LogFormat,
    /// 연결 드라이버 span의 생성/종료도 기록
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Pretty,
            span_events: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// 설정 파일의 `[logging]` 섹션에서 생성합니다.
    ///
    /// 알 수 없는 형식 문자열은 pretty로 취급합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let format = settings.format.parse().unwrap_or_default();
        Self::new(settings.level.clone()).with_format(format)
    }

    /// `RUST_LOG`, `LOG_FORMAT` 환경 변수에서 생성합니다.
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        Self::new(level).with_format(format)
    }

    fn filter(&self) -> DashboardResult<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| DashboardError::Config(format!("invalid log filter: {}", e)))
    }
}

/// 주어진 설정으로 전역 subscriber를 설치합니다.
///
/// 필터가 잘못되었거나 subscriber가 이미 설치되어 있으면
/// [`DashboardError::Config`]를 반환합니다.
///
/// ```no_run
/// use dashboard_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(&LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: &LogConfig) -> DashboardResult<()> {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer().with_span_events(span_events);
    let registry = tracing_subscriber::registry().with(config.filter()?);

    let installed = match config.format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    };
    if let Err(e) = installed {
        let message = format!("logging already initialized: {}", e);
        return Err(DashboardError::Config(message));
    }

    tracing::info!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

/// 환경 변수 기반으로 로깅을 초기화합니다.
pub fn init_logging_from_env() -> DashboardResult<()> {
    init_logging(&LogConfig::from_env())
}

/// 실시간 채널 컨텍스트 필드를 가진 span을 생성합니다.
#[macro_export]
macro_rules! channel_span {
    ($name:expr, $channel:expr) => {
        tracing::info_span!($name, channel = %$channel)
    };
    ($name:expr, $channel:expr, $generation:expr) => {
        tracing::info_span!($name, channel = %$channel, generation = $generation)
    };
}
