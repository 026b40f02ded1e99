//! 채널별 연결 생성과 공유 레지스트리.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashboard_core::RealtimeConfig;
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::connection::RealtimeConnection;
use crate::transport::{Connector, WsConnector};

/// 설정으로부터 [`RealtimeConnection`]을 생성합니다.
#[derive(Clone)]
pub struct ConnectionFactory {
    config: RealtimeConfig,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("ws_base_url", &self.config.ws_base_url)
            .field("auto_connect", &self.config.auto_connect)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ConnectionFactory {
    /// WebSocket 연결기를 사용하는 팩토리.
    pub fn new(config: RealtimeConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Self {
        let policy = ReconnectPolicy::from_config(&config.reconnect);
        Self {
            config,
            policy,
            connector,
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// `{ws_base_url}/{channel}`에 연결하는 새 연결을 생성합니다.
    ///
    /// `auto_connect`가 켜져 있으면 즉시 `connect()`를 호출합니다. tokio 런타임
    /// 밖에서는 자동 연결을 건너뛰고 `Idle` 상태로 반환하므로, 핸들러를 등록한
    /// 뒤 런타임 안에서 `connect()`를 직접 호출해야 합니다.
    pub fn create_connection(&self, channel: &str) -> RealtimeConnection {
        let url = self.config.channel_url(channel);
        debug!(channel, url = %url, "Creating realtime connection");

        let connection = RealtimeConnection::new(
            channel,
            url,
            self.policy.clone(),
            Arc::clone(&self.connector),
        );
        if self.config.auto_connect {
            if tokio::runtime::Handle::try_current().is_ok() {
                connection.connect();
            } else {
                warn!(channel, "auto_connect skipped outside of a tokio runtime");
            }
        }
        connection
    }
}

/// 채널 이름으로 연결을 공유하는 레지스트리.
///
/// 같은 채널을 여러 화면에서 구독해도 연결은 하나만 유지됩니다.
#[derive(Debug)]
pub struct ConnectionRegistry {
    factory: ConnectionFactory,
    connections: RwLock<HashMap<String, Arc<RealtimeConnection>>>,
}

/// 공유 가능한 레지스트리.
pub type SharedConnectionRegistry = Arc<ConnectionRegistry>;

impl ConnectionRegistry {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self {
            factory,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// 채널 연결을 조회하거나 새로 생성합니다.
    pub fn get_or_create(&self, channel: &str) -> Arc<RealtimeConnection> {
        if let Some(existing) = self.get(channel) {
            return existing;
        }

        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            connections
                .entry(channel.to_string())
                .or_insert_with(|| Arc::new(self.factory.create_connection(channel))),
        )
    }

    pub fn get(&self, channel: &str) -> Option<Arc<RealtimeConnection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }

    /// 연결을 끊고 레지스트리에서 제거합니다.
    pub fn remove(&self, channel: &str) -> Option<Arc<RealtimeConnection>> {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel);
        if let Some(connection) = &removed {
            connection.disconnect();
            info!(channel, "Realtime connection removed");
        }
        removed
    }

    /// 모든 연결을 끊습니다 (등록은 유지).
    pub fn disconnect_all(&self) {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for connection in connections.values() {
            connection.disconnect();
        }
        let count = connections.len();
        info!(count, "All realtime connections disconnected");
    }

    /// 등록된 채널 목록 (정렬됨).
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        channels.sort();
        channels
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 공유 레지스트리를 생성합니다.
pub fn create_connection_registry(config: RealtimeConfig) -> SharedConnectionRegistry {
    Arc::new(ConnectionRegistry::new(ConnectionFactory::new(config)))
}
