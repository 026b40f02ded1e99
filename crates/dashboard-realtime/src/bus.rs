//! 이벤트 핸들러 등록 및 디스패치.
//!
//! 한 메시지에 대해 해당 타입 핸들러를 등록 순서대로 먼저 호출하고,
//! 그다음 와일드카드(`"*"`) 핸들러를 등록 순서대로 호출합니다.
//! 디스패치는 시작 시점의 등록 목록 스냅샷을 사용하므로 진행 중에
//! 구독이 해제되어도 해당 메시지의 디스패치는 끝까지 진행됩니다.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{error, warn};

use crate::events::{RealtimeMessage, WILDCARD};

/// 이벤트 핸들러.
pub type Handler = Arc<dyn Fn(&RealtimeMessage) + Send + Sync + 'static>;

/// 핸들러가 수신할 이벤트 범위.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// 특정 타입
    Type(String),
    /// 모든 이벤트
    Wildcard,
}

impl EventFilter {
    /// `"*"`는 와일드카드, 나머지는 타입 이름.
    pub fn parse(event_type: &str) -> Self {
        if event_type == WILDCARD {
            EventFilter::Wildcard
        } else {
            EventFilter::Type(event_type.to_string())
        }
    }

    fn matches_type(&self, event_type: &str) -> bool {
        matches!(self, EventFilter::Type(t) if t == event_type)
    }
}

impl std::fmt::Display for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventFilter::Type(t) => write!(f, "{}", t),
            EventFilter::Wildcard => write!(f, "{}", WILDCARD),
        }
    }
}

struct Registration {
    id: u64,
    filter: EventFilter,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    dispatched: AtomicU64,
    malformed_frames: AtomicU64,
    handler_failures: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut regs = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = regs.len();
        regs.retain(|r| r.id != id);
        regs.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| r.id == id)
    }
}

/// 이벤트 버스 메트릭.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusMetrics {
    /// 디스패치된 메시지 수
    pub dispatched: u64,
    /// 버려진 잘못된 프레임 수
    pub malformed_frames: u64,
    /// panic으로 실패한 핸들러 호출 수
    pub handler_failures: u64,
    /// 현재 등록된 핸들러 수
    pub handlers: usize,
}

/// 타입별 핸들러 레지스트리.
///
/// 복제본은 같은 레지스트리를 공유합니다.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러를 등록합니다.
    ///
    /// `event_type`이 `"*"`이면 모든 이벤트를 수신합니다.
    /// 반환된 [`Subscription`]을 drop해도 등록은 유지됩니다.
    pub fn on<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let filter = EventFilter::parse(event_type);

        self.inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                filter: filter.clone(),
                handler: Arc::new(handler),
            });

        Subscription {
            id,
            filter,
            bus: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        }
    }

    /// 텍스트 프레임을 파싱해 디스패치합니다.
    ///
    /// 잘못된 프레임은 로그만 남기고 버립니다. 반환값은 성공한 핸들러 호출 수입니다.
    pub fn dispatch_frame(&self, frame: &str) -> usize {
        match RealtimeMessage::parse(frame) {
            Ok(message) => self.dispatch(&message),
            Err(e) => {
                self.inner.malformed_frames.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, frame_len = frame.len(), "Dropping malformed frame");
                0
            }
        }
    }

    /// 메시지를 해당 타입 핸들러와 와일드카드 핸들러에 전달합니다.
    ///
    /// 핸들러 panic은 핸들러 단위로 격리됩니다.
    pub fn dispatch(&self, message: &RealtimeMessage) -> usize {
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);

        let targets: Vec<Handler> = {
            let regs = self
                .inner
                .registrations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let typed = regs
                .iter()
                .filter(|r| r.filter.matches_type(&message.event_type));
            let wildcard = regs.iter().filter(|r| r.filter == EventFilter::Wildcard);
            typed.chain(wildcard).map(|r| Arc::clone(&r.handler)).collect()
        };

        let mut delivered = 0;
        for handler in targets {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    self.inner.handler_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        event_type = %message.event_type,
                        reason = %panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        delivered
    }

    /// 등록된 핸들러 수.
    pub fn handler_count(&self) -> usize {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 모든 핸들러를 제거합니다.
    pub fn clear(&self) {
        self.inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// 메트릭 스냅샷.
    pub fn metrics(&self) -> BusMetrics {
        BusMetrics {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            malformed_frames: self.inner.malformed_frames.load(Ordering::Relaxed),
            handler_failures: self.inner.handler_failures.load(Ordering::Relaxed),
            handlers: self.handler_count(),
        }
    }
}

/// [`EventBus::on`]으로 만든 등록 하나.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    filter: EventFilter,
    bus: Weak<BusInner>,
    active: AtomicBool,
}

impl Subscription {
    /// 이 등록만 제거합니다. 두 번째 호출부터는 아무 일도 하지 않습니다.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }

    /// 아직 레지스트리에 남아 있는지 확인.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
            && self.bus.upgrade().is_some_and(|inner| inner.contains(self.id))
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
