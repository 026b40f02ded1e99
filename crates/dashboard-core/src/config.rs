//! 설정 관리.
//!
//! 기본값 → TOML 파일 → 환경 변수(`DASHBOARD__` 접두사) 순서로 덮어씁니다.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DashboardError, DashboardResult};

/// 환경 변수 접두사.
pub const ENV_PREFIX: &str = "DASHBOARD";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 실시간 연결 설정
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 실시간 WebSocket 연결 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
    /// WebSocket 기본 URL (채널 이름이 경로로 붙음)
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    /// 연결 객체 생성 시 즉시 연결할지 여부
    #[serde(default)]
    pub auto_connect: bool,
    /// 재연결 정책
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_ws_base_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_base_url: default_ws_base_url(),
            auto_connect: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl RealtimeConfig {
    /// 채널 이름에 해당하는 WebSocket URL.
    pub fn channel_url(&self, channel: &str) -> String {
        format!(
            "{}/{}",
            self.ws_base_url.trim_end_matches('/'),
            channel.trim_start_matches('/')
        )
    }
}

/// 재연결(지수 백오프) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectConfig {
    /// 첫 재시도 대기 시간 (밀리초)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// 최대 대기 시간 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// 시도마다 곱해지는 배수
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// 대기 시간에 더해지는 무작위 비율 (0.0 ~ 1.0)
    #[serde(default)]
    pub jitter_ratio: f64,
    /// 최대 재시도 횟수 (없으면 무제한)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_ratio: 0.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// 값 범위를 검증합니다.
    pub fn validate(&self) -> DashboardResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(DashboardError::Config(
                "reconnect.initial_delay_ms must be positive".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(DashboardError::Config(format!(
                "reconnect.max_delay_ms ({}) is smaller than initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(DashboardError::Config(format!(
                "reconnect.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(DashboardError::Config(format!(
                "reconnect.jitter_ratio must be within [0, 1], got {}",
                self.jitter_ratio
            )));
        }
        Ok(())
    }
}

impl DashboardConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> DashboardResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(environment_source());

        Self::finish(builder.build()?)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 덮어쓰기 포함).
    pub fn from_toml_str(toml: &str) -> DashboardResult<Self> {
        let built = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .add_source(environment_source())
            .build()?;

        Self::finish(built)
    }

    /// 기본 경로(`config/dashboard.toml`)에서 설정을 로드합니다.
    pub fn load_default() -> DashboardResult<Self> {
        Self::load("config/dashboard.toml")
    }

    fn finish(built: config::Config) -> DashboardResult<Self> {
        let config: Self = built.try_deserialize()?;
        config.realtime.reconnect.validate()?;
        Ok(config)
    }
}

fn environment_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
