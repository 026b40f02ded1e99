//! 재연결 지수 백오프.

use std::time::Duration;

use dashboard_core::ReconnectConfig;
use rand::Rng;

/// 재연결 대기 정책.
///
/// `attempt`번째 재시도(1부터)의 기본 대기 시간은
/// `initial * multiplier^(attempt - 1)`이며 `max_delay`에서 잘립니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_ratio: f64,
    max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            },
            jitter_ratio: 0.0,
            max_attempts: None,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
        )
        .with_jitter(config.jitter_ratio)
        .with_max_attempts(config.max_attempts)
    }

    /// 대기 시간에 최대 `ratio`만큼 무작위 시간을 더합니다 (상한은 유지).
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// 재시도 가능 여부.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// 지터 없는 대기 시간.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// 지터를 포함한 대기 시간.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_ratio <= 0.0 {
            return base;
        }

        let spread = base.as_millis() as f64 * self.jitter_ratio;
        let extra = rand::thread_rng().gen_range(0.0..=spread);
        (base + Duration::from_millis(extra as u64)).min(self.max_delay)
    }
}
