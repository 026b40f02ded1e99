//! 실시간 연결 에러 타입.

use thiserror::Error;

/// 실시간 연결 관련 에러.
///
/// 공개 API(`connect`, `on`, `disconnect`)로는 전파되지 않으며,
/// 합성 `connection_error` 이벤트나 로그로만 드러납니다.
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// WebSocket 프로토콜 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 서버가 연결을 종료함
    #[error("Closed by server: {0}")]
    ClosedByServer(String),

    /// 프레임 파싱 에러
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// 잘못된 연결 주소 (재시도하지 않음)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// 최대 재연결 횟수 초과
    #[error("Reconnect attempts exhausted after {0} tries")]
    RetriesExhausted(u32),
}

/// 실시간 작업을 위한 Result 타입.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl RealtimeError {
    /// 재연결 정책을 적용해야 하는 에러인지 확인.
    ///
    /// 재시도할 수 없는 에러로 연결이 실패하면 재연결하지 않고 Idle로 전이합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RealtimeError::Network(_)
                | RealtimeError::WebSocket(_)
                | RealtimeError::ClosedByServer(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::Io(e) => RealtimeError::Network(e.to_string()),
            WsError::Url(e) => RealtimeError::InvalidUrl(e.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                RealtimeError::ClosedByServer(err.to_string())
            }
            other => RealtimeError::WebSocket(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::MalformedFrame(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(RealtimeError::Network("refused".to_string()).is_retryable());
        assert!(RealtimeError::ClosedByServer("1006".into()).is_retryable());
        assert!(!RealtimeError::MalformedFrame("eof".into()).is_retryable());
        assert!(!RealtimeError::RetriesExhausted(5).is_retryable());
        assert!(!RealtimeError::InvalidUrl("no host".into()).is_retryable());
    }

    #[test]
    fn test_from_tungstenite() {
        use tokio_tungstenite::tungstenite::error::UrlError;
        use tokio_tungstenite::tungstenite::Error as WsError;

        let err = RealtimeError::from(WsError::ConnectionClosed);
        assert!(matches!(err, RealtimeError::ClosedByServer(_)));

        let err = RealtimeError::from(WsError::Url(UrlError::UnsupportedUrlScheme));
        assert!(matches!(err, RealtimeError::InvalidUrl(_)));
        assert!(!err.is_retryable());
    }
}
