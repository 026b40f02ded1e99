//! 트리맵 입력/출력 타입.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 트리맵에 표시할 보유 종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreemapItem {
    /// 종목 코드
    pub code: String,
    /// 표시 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 평가 금액 (면적 결정)
    pub value: f64,
    /// 포트폴리오 비중 (%, 표시 전용)
    #[serde(default)]
    pub weight: f64,
    /// 손익률 (%, 색상 결정)
    #[serde(default)]
    pub pnl_percent: f64,
}

impl TreemapItem {
    /// 코드와 평가 금액으로 생성합니다.
    pub fn new(code: impl Into<String>, value: f64) -> Self {
        Self {
            code: code.into(),
            name: None,
            value,
            weight: 0.0,
            pnl_percent: 0.0,
        }
    }

    /// Decimal 기반 보유 내역에서 생성합니다.
    ///
    /// f64로 표현할 수 없는 값은 0으로 취급되어 레이아웃에서 제외됩니다.
    pub fn from_holding(
        code: impl Into<String>,
        name: Option<String>,
        market_value: Decimal,
        weight: Decimal,
        pnl_percent: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            name,
            value: market_value.to_f64().unwrap_or(0.0),
            weight: weight.to_f64().unwrap_or(0.0),
            pnl_percent: pnl_percent.to_f64().unwrap_or(0.0),
        }
    }

    /// 표시 이름을 설정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 비중을 설정합니다.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// 손익률을 설정합니다.
    pub fn with_pnl_percent(mut self, pnl_percent: f64) -> Self {
        self.pnl_percent = pnl_percent;
        self
    }

    /// 레이블 (이름이 없으면 코드).
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code)
    }

    /// 레이아웃 대상 여부 (양수이고 유한한 값).
    pub fn is_placeable(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

/// 레이아웃 결과 사각형.
///
/// 좌표는 레이아웃에 전달한 컨테이너 단위입니다. 100 x 100 컨테이너를 쓰거나
/// [`LayoutRect::to_percent`]로 백분율 좌표를 얻습니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutRect<'a> {
    /// 원본 항목
    pub item: &'a TreemapItem,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl<'a> LayoutRect<'a> {
    /// 면적.
    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// 종횡비 (항상 1 이상).
    pub fn aspect_ratio(&self) -> f64 {
        if self.w <= 0.0 || self.h <= 0.0 {
            return f64::INFINITY;
        }
        (self.w / self.h).max(self.h / self.w)
    }

    /// 다른 사각형과 겹치는 면적.
    pub fn intersection_area(&self, other: &LayoutRect<'_>) -> f64 {
        let overlap_w = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let overlap_h = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        overlap_w.max(0.0) * overlap_h.max(0.0)
    }

    /// 컨테이너 대비 백분율 좌표로 변환합니다.
    pub fn to_percent(&self, container_width: f64, container_height: f64) -> LayoutRect<'a> {
        LayoutRect {
            item: self.item,
            x: self.x / container_width * 100.0,
            y: self.y / container_height * 100.0,
            w: self.w / container_width * 100.0,
            h: self.h / container_height * 100.0,
        }
    }
}
