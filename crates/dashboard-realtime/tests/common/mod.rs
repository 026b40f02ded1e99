//! 테스트용 가짜 연결기.
//!
//! 스크립트된 실패 후 연결을 수락하며, 수락된 각 세션은 테스트 쪽에서
//! 프레임을 밀어 넣거나 서버 종료를 흉내 낼 수 있습니다.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashboard_realtime::{
    Connector, RealtimeConnection, RealtimeError, RealtimeMessage, RealtimeResult,
    ReconnectPolicy, Transport,
};
use tokio::sync::mpsc;

/// 수락된 연결의 서버 쪽 핸들.
pub struct MockSession {
    frames: mpsc::UnboundedSender<RealtimeResult<String>>,
    closed: Arc<AtomicBool>,
}

impl MockSession {
    pub fn send(&self, frame: &str) {
        let _ = self.frames.send(Ok(frame.to_string()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.frames.send(Err(RealtimeError::WebSocket(message.to_string())));
    }

    /// 클라이언트가 `close()`를 호출했는지 여부.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 서버 쪽에서 연결을 끊습니다 (스트림 종료).
    pub fn hang_up(self) {
        drop(self.frames);
    }
}

struct MockTransport {
    frames: mpsc::UnboundedReceiver<RealtimeResult<String>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn next_frame(&mut self) -> Option<RealtimeResult<String>> {
        self.frames.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.frames.close();
    }
}

/// 앞에서부터 `refusals`만큼 연결을 거부한 뒤 수락하는 연결기.
pub struct MockConnector {
    refusals: Mutex<VecDeque<String>>,
    refuse_forever: AtomicBool,
    opens: AtomicUsize,
    urls: Mutex<Vec<String>>,
    sessions: mpsc::UnboundedSender<MockSession>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockSession>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            refusals: Mutex::new(VecDeque::new()),
            refuse_forever: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            sessions: tx,
        });
        (connector, rx)
    }

    /// 다음 `count`번의 연결 시도를 거부합니다.
    pub fn refuse_next(&self, count: usize) {
        let mut refusals = self.refusals.lock().unwrap();
        for i in 0..count {
            refusals.push_back(format!("connection refused #{}", i + 1));
        }
    }

    pub fn refuse_forever(&self) {
        self.refuse_forever.store(true, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> RealtimeResult<Box<dyn Transport>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        if self.refuse_forever.load(Ordering::SeqCst) {
            return Err(RealtimeError::Network("connection refused".to_string()));
        }
        if let Some(reason) = self.refusals.lock().unwrap().pop_front() {
            return Err(RealtimeError::Network(reason));
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.sessions.send(MockSession {
            frames: frames_tx,
            closed: Arc::clone(&closed),
        });
        Ok(Box::new(MockTransport {
            frames: frames_rx,
            closed,
        }))
    }
}

/// 1초 시작, 2배, 최대 30초.
pub fn test_policy() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 2.0)
}

pub fn connection(connector: Arc<MockConnector>) -> RealtimeConnection {
    RealtimeConnection::new("trading", "ws://test/ws/trading", test_policy(), connector)
}

/// 지정한 타입의 메시지를 모두 기록합니다.
pub fn record(conn: &RealtimeConnection, event_type: &str) -> Arc<Mutex<Vec<RealtimeMessage>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    conn.on(event_type, move |msg| {
        sink.lock().unwrap().push(msg.clone());
    });
    log
}

/// 대기 중인 태스크를 모두 실행합니다 (정지된 시계 기준 1ms 진행).
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn price_frame(stock_code: &str, price: u64) -> String {
    format!(
        r#"{{"type":"price_update","stock_code":"{}","current_price":{},"change_percent":1.25,"volume":1000}}"#,
        stock_code, price
    )
}
