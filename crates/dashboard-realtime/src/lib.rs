//! 실시간 이벤트 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 채널별 WebSocket 연결과 지수 백오프 재연결
//! - 이벤트 타입별 핸들러 레지스트리 (`"*"` 와일드카드 포함)
//! - 연결 상태/에러를 알리는 합성 이벤트
//! - 채널 이름으로 연결을 공유하는 레지스트리

pub mod backoff;
pub mod bus;
pub mod connection;
pub mod error;
pub mod events;
pub mod factory;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use bus::{BusMetrics, EventBus, EventFilter, Handler, Subscription};
pub use connection::{ConnectionMetrics, ConnectionState, RealtimeConnection};
pub use error::{RealtimeError, RealtimeResult};
pub use events::{
    event_type, ConnectionErrorData, ConnectionStatusData, NotificationData, OrderUpdateData,
    PriceUpdateData, RealtimeEvent, RealtimeMessage, RecipeSignalData, SignalType, WILDCARD,
};
pub use factory::{
    create_connection_registry, ConnectionFactory, ConnectionRegistry, SharedConnectionRegistry,
};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
