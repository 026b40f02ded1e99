//! 재연결을 관리하는 실시간 연결.
//!
//! # 상태 전이
//!
//! ```text
//! Idle ──connect()──> Connecting ──[열림]──> Open
//!                         ↑                   │ [예상치 못한 종료]
//!                         │                   ↓
//!                         └──[백오프 대기]── Closing → Closed
//!
//! disconnect(): 모든 상태 ──> Idle (대기 중인 재시도 취소)
//! ```
//!
//! 연결 시도 흐름마다 generation 번호가 붙습니다. `connect()`/`disconnect()`는
//! generation을 올리고 이전 드라이버 태스크를 취소하며, 드라이버는 상태를 바꾸기
//! 전에 자신의 generation이 최신인지 확인합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashboard_core::channel_span;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::backoff::ReconnectPolicy;
use crate::bus::{BusMetrics, EventBus, Subscription};
use crate::error::RealtimeError;
use crate::events::{event_type, ConnectionErrorData, ConnectionStatusData, RealtimeMessage};
use crate::transport::{Connector, Transport};

/// 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// 연결하지 않음 (재시도 없음)
    Idle,
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Open,
    /// 예상치 못한 종료 후 정리 중
    Closing,
    /// 종료됨, 재시도 대기 중
    Closed,
}

impl ConnectionState {
    /// "LIVE" 표시 여부.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// 연결 메트릭.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMetrics {
    pub channel: String,
    pub state: ConnectionState,
    /// 현재 연속 실패 횟수 (연결 성공 시 0)
    pub reconnect_attempt: u32,
    /// 성공한 연결 수
    pub connects: u64,
    /// 백오프 후 수행한 재연결 시도 수
    pub reconnect_attempts: u64,
    /// 수신한 텍스트 프레임 수
    pub frames_received: u64,
    pub bus: BusMetrics,
}

struct Control {
    generation: u64,
    /// 현재 드라이버 취소 토큰 (드라이버가 없으면 None)
    cancel: Option<CancellationToken>,
    attempt: u32,
}

struct ConnectionInner {
    channel: String,
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    bus: EventBus,
    control: Mutex<Control>,
    state_tx: watch::Sender<ConnectionState>,
    connects: AtomicU64,
    reconnect_attempts: AtomicU64,
    frames_received: AtomicU64,
}

enum ReadOutcome {
    Cancelled,
    Lost(RealtimeError),
}

impl ConnectionInner {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// generation이 최신일 때만 상태를 바꿉니다.
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let control = self.lock();
        if control.generation != generation {
            return false;
        }
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(
                channel = %self.channel,
                from = %previous,
                to = %state,
                "Connection state changed"
            );
        }
        true
    }

    /// 연결 성공 처리. 이전 실패 횟수를 반환합니다.
    fn mark_open(&self, generation: u64) -> Option<u32> {
        let mut control = self.lock();
        if control.generation != generation {
            return None;
        }
        let previous_attempts = control.attempt;
        control.attempt = 0;
        self.state_tx.send_replace(ConnectionState::Open);
        self.connects.fetch_add(1, Ordering::Relaxed);
        Some(previous_attempts)
    }

    /// 실패 횟수를 올리고 새 값을 반환합니다.
    fn next_attempt(&self, generation: u64) -> Option<u32> {
        let mut control = self.lock();
        if control.generation != generation {
            return None;
        }
        control.attempt = control.attempt.saturating_add(1);
        Some(control.attempt)
    }

    /// 재시도 포기: 드라이버를 정리하고 Idle로 전이.
    fn give_up(&self, generation: u64) -> bool {
        let mut control = self.lock();
        if control.generation != generation {
            return false;
        }
        control.cancel = None;
        self.state_tx.send_replace(ConnectionState::Idle);
        true
    }

    fn emit_status(&self, connected: bool, attempt: u32) {
        let message = RealtimeMessage::synthetic(
            event_type::CONNECTION_STATUS,
            &ConnectionStatusData {
                channel: self.channel.clone(),
                connected,
                attempt,
            },
        );
        self.bus.dispatch(&message);
    }

    fn emit_error(&self, error: &RealtimeError, attempt: u32, retry_in_ms: Option<u64>) {
        let message = RealtimeMessage::synthetic(
            event_type::CONNECTION_ERROR,
            &ConnectionErrorData {
                channel: self.channel.clone(),
                message: error.to_string(),
                attempt,
                retry_in_ms,
            },
        );
        self.bus.dispatch(&message);
    }
}

/// 채널 하나에 묶인 실시간 연결.
///
/// `connect()`/`disconnect()`는 즉시 반환하며 결과는 이벤트와
/// [`RealtimeConnection::watch_state`]로 관찰합니다. drop되면 연결을 끊고
/// 모든 핸들러를 제거합니다.
pub struct RealtimeConnection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("channel", &self.inner.channel)
            .field("url", &self.inner.url)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl RealtimeConnection {
    /// 새 연결을 생성합니다 (아직 연결하지 않음).
    pub fn new(
        channel: impl Into<String>,
        url: impl Into<String>,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(ConnectionInner {
                channel: channel.into(),
                url: url.into(),
                policy,
                connector,
                bus: EventBus::new(),
                control: Mutex::new(Control {
                    generation: 0,
                    cancel: None,
                    attempt: 0,
                }),
                state_tx,
                connects: AtomicU64::new(0),
                reconnect_attempts: AtomicU64::new(0),
                frames_received: AtomicU64::new(0),
            }),
        }
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// 상태 변경 수신기.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// 현재 연속 실패 횟수.
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lock().attempt
    }

    /// 재시도 타이머가 대기 중인지 여부.
    pub fn has_pending_retry(&self) -> bool {
        let control = self.inner.lock();
        control.cancel.is_some() && self.inner.state() == ConnectionState::Closed
    }

    /// 핸들러 레지스트리.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// 이벤트 핸들러를 등록합니다. `"*"`는 모든 이벤트.
    pub fn on<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        self.inner.bus.on(event_type, handler)
    }

    /// 연결을 시작합니다.
    ///
    /// 이미 연결 중이거나 연결되어 있으면 아무 일도 하지 않습니다. 재시도 대기
    /// 중이면 타이머를 취소하고 즉시 새로 시도합니다. tokio 런타임 밖에서
    /// 호출되면 `connection_error` 이벤트만 발생합니다.
    pub fn connect(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    channel = %self.inner.channel,
                    error = %e,
                    "connect() called outside of a tokio runtime"
                );
                let failure = RealtimeError::Network(e.to_string());
                self.inner.emit_error(&failure, 0, None);
                return;
            }
        };

        let mut control = self.inner.lock();
        let state = self.inner.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Open) {
            debug!(channel = %self.inner.channel, state = %state, "connect() coalesced");
            return;
        }

        if let Some(token) = control.cancel.take() {
            token.cancel();
        }
        control.generation += 1;
        control.attempt = 0;
        let generation = control.generation;
        let token = CancellationToken::new();
        control.cancel = Some(token.clone());
        self.inner.state_tx.send_replace(ConnectionState::Connecting);
        drop(control);

        info!(
            channel = %self.inner.channel,
            url = %self.inner.url,
            generation,
            "Realtime connect requested"
        );

        let span = channel_span!("realtime_driver", self.inner.channel, generation);
        let driver = drive(Arc::clone(&self.inner), generation, token);
        runtime.spawn(driver.instrument(span));
    }

    /// 연결을 끊고 재시도를 중단합니다. 항상 Idle로 끝납니다.
    pub fn disconnect(&self) {
        let mut control = self.inner.lock();
        control.generation += 1;
        control.attempt = 0;
        if let Some(token) = control.cancel.take() {
            token.cancel();
        }
        let previous = self.inner.state_tx.send_replace(ConnectionState::Idle);
        drop(control);

        if previous != ConnectionState::Idle {
            info!(
                channel = %self.inner.channel,
                from = %previous,
                "Realtime connection disconnected"
            );
        }
    }

    /// 메트릭 스냅샷.
    pub fn metrics(&self) -> ConnectionMetrics {
        ConnectionMetrics {
            channel: self.inner.channel.clone(),
            state: self.inner.state(),
            reconnect_attempt: self.reconnect_attempt(),
            connects: self.inner.connects.load(Ordering::Relaxed),
            reconnect_attempts: self.inner.reconnect_attempts.load(Ordering::Relaxed),
            frames_received: self.inner.frames_received.load(Ordering::Relaxed),
            bus: self.inner.bus.metrics(),
        }
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.disconnect();
        self.inner.bus.clear();
    }
}

/// 한 generation의 연결/수신/재시도 루프.
async fn drive(inner: Arc<ConnectionInner>, generation: u64, cancel: CancellationToken) {
    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = inner.connector.open(&inner.url) => result,
        };

        let failure = match opened {
            Ok(mut transport) => {
                let Some(previous_attempts) = inner.mark_open(generation) else {
                    transport.close().await;
                    return;
                };
                info!(channel = %inner.channel, previous_attempts, "Realtime connection open");
                inner.emit_status(true, previous_attempts);

                match read_frames(&inner, generation, transport.as_mut(), &cancel).await {
                    ReadOutcome::Cancelled => {
                        transport.close().await;
                        debug!(channel = %inner.channel, "Transport closed after cancellation");
                        return;
                    }
                    ReadOutcome::Lost(reason) => {
                        if !inner.transition(generation, ConnectionState::Closing) {
                            transport.close().await;
                            return;
                        }
                        transport.close().await;
                        if !inner.transition(generation, ConnectionState::Closed) {
                            return;
                        }
                        warn!(
                            channel = %inner.channel,
                            error = %reason,
                            "Realtime connection lost"
                        );
                        inner.emit_status(false, 0);
                        reason
                    }
                }
            }
            Err(e) => {
                if !inner.transition(generation, ConnectionState::Closed) {
                    return;
                }
                warn!(channel = %inner.channel, error = %e, "Realtime connection failed");
                e
            }
        };

        let Some(attempt) = inner.next_attempt(generation) else {
            return;
        };

        if !failure.is_retryable() {
            error!(
                channel = %inner.channel,
                error = %failure,
                "Connection failure is not retryable"
            );
            if inner.give_up(generation) {
                inner.emit_error(&failure, attempt, None);
            }
            return;
        }

        if !inner.policy.allows(attempt) {
            let max = inner.policy.max_attempts().unwrap_or(attempt);
            error!(channel = %inner.channel, max_attempts = max, "Reconnect attempts exhausted");
            if inner.give_up(generation) {
                inner.emit_error(&failure, attempt, None);
                inner.emit_error(&RealtimeError::RetriesExhausted(max), attempt, None);
            }
            return;
        }

        let delay = inner.policy.delay_for(attempt);
        info!(
            channel = %inner.channel,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        inner.emit_error(&failure, attempt, Some(delay.as_millis() as u64));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        if !inner.transition(generation, ConnectionState::Connecting) {
            return;
        }
        inner.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }
}

/// 프레임을 순서대로 읽어 디스패치합니다.
async fn read_frames(
    inner: &ConnectionInner,
    generation: u64,
    transport: &mut dyn Transport,
    cancel: &CancellationToken,
) -> ReadOutcome {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReadOutcome::Cancelled,
            frame = transport.next_frame() => frame,
        };

        match frame {
            Some(Ok(text)) => {
                if !inner.is_current(generation) {
                    return ReadOutcome::Cancelled;
                }
                inner.frames_received.fetch_add(1, Ordering::Relaxed);
                inner.bus.dispatch_frame(&text);
            }
            Some(Err(e)) => return ReadOutcome::Lost(e),
            None => {
                return ReadOutcome::Lost(RealtimeError::ClosedByServer(
                    "stream ended".to_string(),
                ))
            }
        }
    }
}
