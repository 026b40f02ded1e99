//! Squarified 트리맵 레이아웃.
//!
//! 남은 빈 사각형의 짧은 변을 따라 행(strip)을 하나씩 떼어내는 방식입니다.
//! 다음 항목을 행에 추가했을 때 행의 최악 종횡비가 나빠지면 행을 닫습니다.
//!
//! ```text
//! h <= w : 세로 strip (x 방향으로 전진)     h > w : 가로 strip (y 방향으로 전진)
//! ┌──┬────────┐                            ┌──────────┐
//! │A │        │                            │ A  │  B  │
//! ├──┤  rest  │                            ├──────────┤
//! │B │        │                            │   rest   │
//! └──┴────────┘                            └──────────┘
//! ```

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{LayoutError, LayoutResult};
use crate::types::{LayoutRect, TreemapItem};

/// 아직 채워지지 않은 영역.
#[derive(Debug, Clone, Copy)]
struct FreeRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl FreeRect {
    fn short_side(&self) -> f64 {
        self.w.min(self.h)
    }

    /// 세로 strip 여부 (짧은 변이 높이).
    fn is_vertical_strip(&self) -> bool {
        self.h <= self.w
    }
}

/// 배치 대기 중인 항목과 목표 면적.
#[derive(Debug, Clone, Copy)]
struct Pending<'a> {
    item: &'a TreemapItem,
    area: f64,
}

/// 레이아웃 요약 정보.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSummary {
    /// 배치된 항목의 총 평가 금액
    pub total_value: f64,
    /// 배치된 항목 수
    pub placed: usize,
    /// 값이 0 이하여서 제외된 항목 수
    pub skipped: usize,
    /// 전체 셀 중 최악 종횡비 (배치된 항목이 없으면 1.0)
    pub worst_aspect_ratio: f64,
}

/// 보유 종목을 겹치지 않는 사각형들로 배치합니다.
///
/// 값이 0 이하인 항목은 제외되며, 남는 항목이 없으면 빈 벡터를 반환합니다.
/// 결과는 평가 금액 내림차순입니다.
///
/// # Errors
///
/// 컨테이너 크기가 양의 유한값이 아니면 [`LayoutError::InvalidContainer`].
///
/// ```
/// use dashboard_treemap::{layout, TreemapItem};
///
/// let items = vec![TreemapItem::new("A", 60.0), TreemapItem::new("B", 40.0)];
/// let rects = layout(&items, 100.0, 100.0).unwrap();
/// assert_eq!(rects.len(), 2);
/// assert_eq!(rects[0].item.code, "A");
/// ```
pub fn layout(items: &[TreemapItem], width: f64, height: f64) -> LayoutResult<Vec<LayoutRect<'_>>> {
    validate_container(width, height)?;

    let mut placeable: Vec<&TreemapItem> = items.iter().filter(|i| i.is_placeable()).collect();
    if placeable.is_empty() {
        return Ok(Vec::new());
    }

    placeable.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));

    // 최댓값으로 나눠 합계 오버플로 방지
    let max_value = placeable[0].value;
    let total: f64 = placeable.iter().map(|i| i.value / max_value).sum();
    let queue: Vec<Pending<'_>> = placeable
        .into_iter()
        .map(|item| Pending {
            item,
            area: item.value / max_value / total * width * height,
        })
        .collect();

    let mut rects = Vec::with_capacity(queue.len());
    let mut free = FreeRect {
        x: 0.0,
        y: 0.0,
        w: width,
        h: height,
    };
    let degenerate = f64::EPSILON * width.max(height);
    let mut start = 0;

    while start < queue.len() {
        // 남은 영역이 사실상 0이면 나머지를 한 행으로 묶음
        let end = if free.short_side() <= degenerate {
            queue.len()
        } else {
            start + close_row(&queue[start..], free.short_side())
        };
        free = place_row(&queue[start..end], free, end == queue.len(), &mut rects);
        start = end;
    }

    Ok(rects)
}

/// [`layout`] 결과와 함께 요약 정보를 반환합니다.
pub fn layout_with_summary(
    items: &[TreemapItem],
    width: f64,
    height: f64,
) -> LayoutResult<(Vec<LayoutRect<'_>>, LayoutSummary)> {
    let rects = layout(items, width, height)?;

    let summary = LayoutSummary {
        total_value: rects.iter().map(|r| r.item.value).sum(),
        placed: rects.len(),
        skipped: items.len() - rects.len(),
        worst_aspect_ratio: rects
            .iter()
            .map(LayoutRect::aspect_ratio)
            .fold(1.0, f64::max),
    };

    debug!(
        placed = summary.placed,
        skipped = summary.skipped,
        worst_aspect_ratio = summary.worst_aspect_ratio,
        "Treemap layout computed"
    );

    Ok((rects, summary))
}

fn validate_container(width: f64, height: f64) -> LayoutResult<()> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if valid(width) && valid(height) {
        Ok(())
    } else {
        Err(LayoutError::InvalidContainer { width, height })
    }
}

/// 행에 포함할 항목 수를 결정합니다 (최소 1개).
///
/// 최악 종횡비가 같으면 계속 추가하고, 엄격하게 커질 때만 멈춥니다.
fn close_row(pending: &[Pending<'_>], short: f64) -> usize {
    let mut len = 1;
    let mut best = worst_ratio(&pending[..len], short);

    while len < pending.len() {
        let candidate = worst_ratio(&pending[..len + 1], short);
        if candidate > best {
            break;
        }
        best = candidate;
        len += 1;
    }

    len
}

/// 행의 최악 종횡비.
///
/// 행 두께(span)는 `행 면적 / 짧은 변`, 각 셀 길이는 `셀 면적 / span`.
fn worst_ratio(row: &[Pending<'_>], short: f64) -> f64 {
    let row_area: f64 = row.iter().map(|s| s.area).sum();
    let span = row_area / short;
    if !(span > 0.0) || !span.is_finite() {
        return f64::INFINITY;
    }

    row.iter()
        .map(|s| {
            let length = s.area / span;
            if length > 0.0 {
                (length / span).max(span / length)
            } else {
                f64::INFINITY
            }
        })
        .fold(0.0, f64::max)
}

/// 닫힌 행을 strip에 배치하고 남은 영역을 반환합니다.
///
/// 마지막 행은 남은 영역을 정확히 채웁니다. 셀 길이는 행 면적 대비 비율로
/// 나누므로 항상 strip 안에 들어갑니다.
fn place_row<'a>(
    row: &[Pending<'a>],
    free: FreeRect,
    last: bool,
    out: &mut Vec<LayoutRect<'a>>,
) -> FreeRect {
    let row_area: f64 = row.iter().map(|p| p.area).sum();
    let vertical = free.is_vertical_strip();
    let (short, long) = if vertical {
        (free.h, free.w)
    } else {
        (free.w, free.h)
    };
    let span = if last || !(short > 0.0) {
        long
    } else {
        (row_area / short).min(long)
    };

    let mut offset = 0.0;
    for pending in row {
        let share = if row_area > 0.0 {
            pending.area / row_area
        } else {
            1.0 / row.len() as f64
        };
        let length = short * share;
        let rect = if vertical {
            LayoutRect {
                item: pending.item,
                x: free.x,
                y: free.y + offset,
                w: span,
                h: length,
            }
        } else {
            LayoutRect {
                item: pending.item,
                x: free.x + offset,
                y: free.y,
                w: length,
                h: span,
            }
        };
        out.push(rect);
        offset += length;
    }

    if vertical {
        FreeRect {
            x: free.x + span,
            y: free.y,
            w: (free.w - span).max(0.0),
            h: free.h,
        }
    } else {
        FreeRect {
            x: free.x,
            y: free.y + span,
            w: free.w,
            h: (free.h - span).max(0.0),
        }
    }
}
