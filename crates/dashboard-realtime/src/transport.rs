//! 전송 계층 추상화.
//!
//! [`Connector`]는 URL로 새 [`Transport`]를 엽니다. 재연결 시에는 항상 새
//! 전송 객체를 열며 기존 객체를 재사용하지 않습니다.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};

use crate::error::{RealtimeError, RealtimeResult};

/// 열린 단일 연결.
#[async_trait]
pub trait Transport: Send {
    /// 다음 텍스트 프레임.
    ///
    /// `None`은 스트림 종료, `Some(Err)`는 전송 에러입니다. 두 경우 모두
    /// 예상치 못한 종료로 처리됩니다.
    async fn next_frame(&mut self) -> Option<RealtimeResult<String>>;

    /// 연결을 닫습니다. 실패는 무시합니다.
    async fn close(&mut self);
}

/// 새 연결을 여는 팩토리.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> RealtimeResult<Box<dyn Transport>>;
}

/// tokio-tungstenite 기반 WebSocket 연결기.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> RealtimeResult<Box<dyn Transport>> {
        info!("Connecting to WebSocket: {}", url);

        let (stream, _response) = connect_async(url).await?;

        info!("Connected to WebSocket: {}", url);
        Ok(Box::new(WsTransport { stream }))
    }
}

/// tokio-tungstenite 스트림 래퍼.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_frame(&mut self) -> Option<RealtimeResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Ping(_)) => {
                    // Pong은 tungstenite가 다음 읽기에서 자동으로 보냄
                    debug!("Ping 수신");
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Some(Err(RealtimeError::ClosedByServer(reason)));
                }
                Ok(_) => {
                    // 바이너리/퐁 프레임은 무시
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_scheme_is_invalid_url() {
        // 포트 없는 http 주소는 소켓을 열기 전에 거부됨
        match WsConnector.open("http://dashboard.local/ws/trading").await {
            Err(err) => {
                assert!(matches!(err, RealtimeError::InvalidUrl(_)));
                assert!(!err.is_retryable());
            }
            Ok(_) => panic!("http URL must not open a WebSocket"),
        }
    }
}
