//! 손익률 기반 셀 색상.
//!
//! 셀 색상은 손익률로만 결정되며 면적과 무관합니다.

use serde::{Deserialize, Serialize};

use crate::types::{LayoutRect, TreemapItem};

/// 강한 상승/하락으로 분류하는 기준 (%).
pub const STRONG_MOVE_PCT: f64 = 3.0;

/// 보합으로 취급하는 범위 (%).
pub const FLAT_BAND_PCT: f64 = 0.05;

/// 셀 색조.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlTone {
    StrongGain,
    Gain,
    Flat,
    Loss,
    StrongLoss,
}

impl PnlTone {
    /// 손익률로 색조를 분류합니다. NaN은 보합입니다.
    pub fn classify(pnl_percent: f64) -> Self {
        if pnl_percent.is_nan() || pnl_percent.abs() < FLAT_BAND_PCT {
            PnlTone::Flat
        } else if pnl_percent >= STRONG_MOVE_PCT {
            PnlTone::StrongGain
        } else if pnl_percent > 0.0 {
            PnlTone::Gain
        } else if pnl_percent <= -STRONG_MOVE_PCT {
            PnlTone::StrongLoss
        } else {
            PnlTone::Loss
        }
    }
}

impl std::fmt::Display for PnlTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PnlTone::StrongGain => write!(f, "strong_gain"),
            PnlTone::Gain => write!(f, "gain"),
            PnlTone::Flat => write!(f, "flat"),
            PnlTone::Loss => write!(f, "loss"),
            PnlTone::StrongLoss => write!(f, "strong_loss"),
        }
    }
}

/// 색상 강도 (-1.0 ~ 1.0).
///
/// 집합 내 최대 절대 손익률로 정규화합니다. `max_abs`가 0이면 0입니다.
pub fn intensity(pnl_percent: f64, max_abs: f64) -> f64 {
    if !pnl_percent.is_finite() || !(max_abs > 0.0) {
        return 0.0;
    }
    (pnl_percent / max_abs).clamp(-1.0, 1.0)
}

/// 배치된 셀의 표시 정보.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellStyle<'a> {
    pub rect: LayoutRect<'a>,
    pub tone: PnlTone,
    pub intensity: f64,
}

/// 레이아웃 결과에 색조와 정규화된 강도를 붙입니다.
pub fn style_cells<'a>(rects: &[LayoutRect<'a>]) -> Vec<CellStyle<'a>> {
    let max_abs = max_abs_pnl(rects.iter().map(|r| r.item));

    rects
        .iter()
        .map(|rect| CellStyle {
            rect: *rect,
            tone: PnlTone::classify(rect.item.pnl_percent),
            intensity: intensity(rect.item.pnl_percent, max_abs),
        })
        .collect()
}

fn max_abs_pnl<'a>(items: impl Iterator<Item = &'a TreemapItem>) -> f64 {
    items
        .map(|i| i.pnl_percent.abs())
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squarify::layout;

    #[test]
    fn test_classify() {
        assert_eq!(PnlTone::classify(5.0), PnlTone::StrongGain);
        assert_eq!(PnlTone::classify(3.0), PnlTone::StrongGain);
        assert_eq!(PnlTone::classify(1.2), PnlTone::Gain);
        assert_eq!(PnlTone::classify(0.01), PnlTone::Flat);
        assert_eq!(PnlTone::classify(-0.01), PnlTone::Flat);
        assert_eq!(PnlTone::classify(-1.0), PnlTone::Loss);
        assert_eq!(PnlTone::classify(-3.0), PnlTone::StrongLoss);
        assert_eq!(PnlTone::classify(f64::NAN), PnlTone::Flat);
    }

    #[test]
    fn test_intensity() {
        assert_eq!(intensity(5.0, 10.0), 0.5);
        assert_eq!(intensity(-20.0, 10.0), -1.0);
        assert_eq!(intensity(5.0, 0.0), 0.0);
        assert_eq!(intensity(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn test_style_cells() {
        let items = vec![
            TreemapItem::new("A", 50.0).with_pnl_percent(4.0),
            TreemapItem::new("B", 30.0).with_pnl_percent(-8.0),
            TreemapItem::new("C", 20.0),
        ];
        let rects = layout(&items, 100.0, 100.0).unwrap();
        let cells = style_cells(&rects);

        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].tone, PnlTone::StrongGain);
        assert_eq!(cells[0].intensity, 0.5);
        assert_eq!(cells[1].tone, PnlTone::StrongLoss);
        assert_eq!(cells[1].intensity, -1.0);
        assert_eq!(cells[2].tone, PnlTone::Flat);
        assert_eq!(cells[2].intensity, 0.0);
    }
}
