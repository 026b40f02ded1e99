//! 실시간 이벤트 타입.
//!
//! 서버 프레임은 `{ "type": string, ...payload }` 형태의 JSON 객체입니다.
//! 파싱 경계에서 알려진 타입은 [`RealtimeEvent`]의 각 variant로 좁히고,
//! 나머지는 [`RealtimeEvent::Other`]로 남깁니다.
//!
//! ```json
//! {"type": "price_update", "stock_code": "005930", "current_price": 71500, ...}
//! {"type": "recipe_signal", "recipe_id": 12, "signal_type": "entry", ...}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{RealtimeError, RealtimeResult};

/// 모든 이벤트를 수신하는 와일드카드 타입.
pub const WILDCARD: &str = "*";

/// 알려진 이벤트 타입 이름.
pub mod event_type {
    pub const PRICE_UPDATE: &str = "price_update";
    pub const ORDER_UPDATE: &str = "order_update";
    pub const RECIPE_SIGNAL: &str = "recipe_signal";
    pub const NOTIFICATION: &str = "notification";
    /// 연결 상태 변경 (합성 이벤트)
    pub const CONNECTION_STATUS: &str = "connection_status";
    /// 연결 실패 (합성 이벤트)
    pub const CONNECTION_ERROR: &str = "connection_error";
}

// ==================== 데이터 타입 ====================

/// 시세 업데이트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdateData {
    /// 종목 코드
    pub stock_code: String,
    /// 현재가
    pub current_price: Decimal,
    /// 등락률 (%)
    #[serde(default)]
    pub change_percent: Decimal,
    /// 누적 거래량
    #[serde(default)]
    pub volume: Decimal,
    /// 고가
    #[serde(default)]
    pub high: Option<Decimal>,
    /// 저가
    #[serde(default)]
    pub low: Option<Decimal>,
}

/// 주문 업데이트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdateData {
    /// 주문을 낸 레시피 ID
    #[serde(deserialize_with = "deserialize_id")]
    pub recipe_id: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub stock_code: Option<String>,
    /// 매수/매도
    #[serde(default)]
    pub side: Option<String>,
    /// 주문 상태
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub filled_quantity: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// 레시피 신호 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Entry,
    Exit,
}

/// 레시피 매매 신호.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSignalData {
    #[serde(deserialize_with = "deserialize_id")]
    pub recipe_id: String,
    #[serde(default)]
    pub recipe_name: String,
    pub stock_code: String,
    pub signal_type: SignalType,
}

/// 사용자 알림.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    /// info, warning, error 등
    #[serde(default)]
    pub level: Option<String>,
}

/// 연결 상태 (합성).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatusData {
    pub channel: String,
    pub connected: bool,
    /// 직전까지 누적된 재연결 시도 횟수
    pub attempt: u32,
}

/// 연결 실패 (합성).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionErrorData {
    pub channel: String,
    pub message: String,
    pub attempt: u32,
    /// 다음 재시도까지 남은 시간 (재시도하지 않으면 None)
    #[serde(default)]
    pub retry_in_ms: Option<u64>,
}

/// 타입이 지정된 실시간 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    PriceUpdate(PriceUpdateData),
    OrderUpdate(OrderUpdateData),
    RecipeSignal(RecipeSignalData),
    Notification(NotificationData),
    ConnectionStatus(ConnectionStatusData),
    ConnectionError(ConnectionErrorData),
    /// 알 수 없는 타입이거나 본문이 알려진 형태와 다름
    Other,
}

impl RealtimeEvent {
    /// 타입 이름과 원본 객체로부터 이벤트를 좁힙니다.
    fn narrow(event_type: &str, payload: &Value) -> Self {
        fn typed<T: for<'de> Deserialize<'de>>(payload: &Value) -> Option<T> {
            T::deserialize(payload).ok()
        }

        let narrowed = match event_type {
            event_type::PRICE_UPDATE => typed(payload).map(RealtimeEvent::PriceUpdate),
            event_type::ORDER_UPDATE => typed(payload).map(RealtimeEvent::OrderUpdate),
            event_type::RECIPE_SIGNAL => typed(payload).map(RealtimeEvent::RecipeSignal),
            event_type::NOTIFICATION => typed(payload).map(RealtimeEvent::Notification),
            event_type::CONNECTION_STATUS => typed(payload).map(RealtimeEvent::ConnectionStatus),
            event_type::CONNECTION_ERROR => typed(payload).map(RealtimeEvent::ConnectionError),
            _ => None,
        };

        narrowed.unwrap_or(RealtimeEvent::Other)
    }
}

/// 핸들러에 전달되는 메시지.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeMessage {
    /// `type` 필드 값
    pub event_type: String,
    /// 파싱된 전체 JSON 객체 (`type` 포함)
    pub payload: Value,
    /// 타입이 지정된 이벤트
    pub event: RealtimeEvent,
}

impl RealtimeMessage {
    /// 텍스트 프레임을 파싱합니다.
    ///
    /// JSON 객체가 아니거나 문자열 `type` 필드가 없으면 에러입니다.
    pub fn parse(frame: &str) -> RealtimeResult<Self> {
        let payload: Value = serde_json::from_str(frame)?;
        Self::from_value(payload)
    }

    /// 이미 파싱된 JSON 값에서 생성합니다.
    pub fn from_value(payload: Value) -> RealtimeResult<Self> {
        let event_type = match payload.get("type") {
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            Some(_) => {
                return Err(RealtimeError::MalformedFrame(
                    "'type' must be a non-empty string".to_string(),
                ))
            }
            None if payload.is_object() => {
                return Err(RealtimeError::MalformedFrame(
                    "missing 'type' field".to_string(),
                ))
            }
            None => {
                return Err(RealtimeError::MalformedFrame(
                    "frame is not a JSON object".to_string(),
                ))
            }
        };

        let event = RealtimeEvent::narrow(&event_type, &payload);
        Ok(Self {
            event_type,
            payload,
            event,
        })
    }

    /// 합성 이벤트를 생성합니다. `data`는 직렬화 가능한 객체여야 합니다.
    pub(crate) fn synthetic<T: Serialize>(event_type: &str, data: &T) -> Self {
        let mut object = match serde_json::to_value(data) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        object.insert("type".to_string(), json!(event_type));

        let payload = Value::Object(object);
        let event = RealtimeEvent::narrow(event_type, &payload);
        Self {
            event_type: event_type.to_string(),
            payload,
            event,
        }
    }

    /// payload의 문자열 필드를 조회합니다.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

// ==================== serde 헬퍼 ====================

/// 문자열 또는 숫자 ID를 문자열로 역직렬화.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(D::Error::custom("id must be a string or number")),
    }
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(D::Error::custom("id must be a string or number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_update() {
        let frame = r#"{"type":"price_update","stock_code":"005930","current_price":71500,"change_percent":1.25,"volume":1234567,"high":72000,"low":70800}"#;
        let msg = RealtimeMessage::parse(frame).unwrap();

        assert_eq!(msg.event_type, "price_update");
        match msg.event {
            RealtimeEvent::PriceUpdate(data) => {
                assert_eq!(data.stock_code, "005930");
                assert_eq!(data.current_price, dec!(71500));
                assert_eq!(data.change_percent, dec!(1.25));
                assert_eq!(data.high, Some(dec!(72000)));
            }
            other => panic!("Expected PriceUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_recipe_signal_numeric_id() {
        let frame = r#"{"type":"recipe_signal","recipe_id":12,"recipe_name":"RSI 반등","stock_code":"000660","signal_type":"exit"}"#;
        let msg = RealtimeMessage::parse(frame).unwrap();

        match msg.event {
            RealtimeEvent::RecipeSignal(data) => {
                assert_eq!(data.recipe_id, "12");
                assert_eq!(data.signal_type, SignalType::Exit);
            }
            other => panic!("Expected RecipeSignal, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_update() {
        let frame = r#"{"type":"order_update","recipe_id":"r-1","order_id":99,"side":"buy","status":"filled","quantity":10}"#;
        let msg = RealtimeMessage::parse(frame).unwrap();

        match msg.event {
            RealtimeEvent::OrderUpdate(data) => {
                assert_eq!(data.recipe_id, "r-1");
                assert_eq!(data.order_id.as_deref(), Some("99"));
                assert_eq!(data.quantity, Some(dec!(10)));
                assert!(data.price.is_none());
            }
            other => panic!("Expected OrderUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_other() {
        let msg = RealtimeMessage::parse(r#"{"type":"market_briefing","summary":"..."}"#).unwrap();
        assert_eq!(msg.event, RealtimeEvent::Other);
        assert_eq!(msg.str_field("summary"), Some("..."));
    }

    #[test]
    fn test_known_type_with_wrong_shape_is_other() {
        let msg = RealtimeMessage::parse(r#"{"type":"price_update","stock_code":5}"#).unwrap();
        assert_eq!(msg.event_type, "price_update");
        assert_eq!(msg.event, RealtimeEvent::Other);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(RealtimeMessage::parse("{not json").is_err());
        assert!(RealtimeMessage::parse("[1,2,3]").is_err());
        assert!(RealtimeMessage::parse(r#"{"title":"x"}"#).is_err());
        assert!(RealtimeMessage::parse(r#"{"type":42}"#).is_err());
        assert!(RealtimeMessage::parse(r#"{"type":""}"#).is_err());
    }

    #[test]
    fn test_payload_keeps_full_object() {
        let frame = r#"{"type":"notification","title":"x","extra":[1]}"#;
        let msg = RealtimeMessage::parse(frame).unwrap();

        assert_eq!(msg.payload["extra"], json!([1]));
        assert_eq!(msg.payload["type"], json!("notification"));
        assert!(matches!(msg.event, RealtimeEvent::Notification(_)));
    }

    #[test]
    fn test_synthetic_error_event() {
        let msg = RealtimeMessage::synthetic(
            event_type::CONNECTION_ERROR,
            &ConnectionErrorData {
                channel: "trading".to_string(),
                message: "refused".to_string(),
                attempt: 2,
                retry_in_ms: Some(4000),
            },
        );

        assert_eq!(msg.event_type, "connection_error");
        assert_eq!(msg.payload["retry_in_ms"], json!(4000));
        assert!(matches!(msg.event, RealtimeEvent::ConnectionError(ref d) if d.attempt == 2));
    }
}
