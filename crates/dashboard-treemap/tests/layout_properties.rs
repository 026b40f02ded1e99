//! 트리맵 레이아웃 속성 테스트
//!
//! 타일링, 면적 비례, 비중첩, 멱등성을 임의 입력에 대해 검증합니다.
//! 극단적으로 치우친 값에서도 컨테이너를 벗어나지 않아야 합니다.

use dashboard_treemap::{layout, LayoutRect, TreemapItem};
use proptest::prelude::*;

fn build_items(values: &[f64]) -> Vec<TreemapItem> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| TreemapItem::new(format!("S{:03}", i), *v))
        .collect()
}

fn positive_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01f64..10_000.0, 1..40)
}

/// 18자리 이상 차이 나는 값들.
fn skewed_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((1.0f64..10.0, 0i32..19), 1..12)
        .prop_map(|pairs| pairs.into_iter().map(|(m, e)| m * 10f64.powi(e)).collect())
}

fn container() -> impl Strategy<Value = (f64, f64)> {
    (1.0f64..2_000.0, 1.0f64..2_000.0)
}

proptest! {
    #[test]
    fn rects_tile_the_container(values in positive_values(), (w, h) in container()) {
        let items = build_items(&values);
        let rects = layout(&items, w, h).unwrap();

        prop_assert_eq!(rects.len(), items.len());
        let total: f64 = rects.iter().map(LayoutRect::area).sum();
        prop_assert!((total - w * h).abs() <= 1e-6 * w * h);
    }

    #[test]
    fn area_is_proportional_to_value(values in positive_values(), (w, h) in container()) {
        let items = build_items(&values);
        let total_value: f64 = values.iter().sum();
        let rects = layout(&items, w, h).unwrap();

        for rect in &rects {
            let expected = rect.item.value / total_value;
            let actual = rect.area() / (w * h);
            prop_assert!((expected - actual).abs() <= 1e-6);
        }
    }

    #[test]
    fn rects_do_not_overlap(values in positive_values(), (w, h) in container()) {
        let items = build_items(&values);
        let rects = layout(&items, w, h).unwrap();
        let tolerance = 1e-6 * w * h;

        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                prop_assert!(rects[i].intersection_area(&rects[j]) <= tolerance);
            }
        }
    }

    #[test]
    fn rects_stay_inside_container(values in positive_values(), (w, h) in container()) {
        let items = build_items(&values);
        let rects = layout(&items, w, h).unwrap();
        let eps = 1e-6 * w.max(h);

        for r in &rects {
            prop_assert!(r.x >= -eps && r.y >= -eps);
            prop_assert!(r.x + r.w <= w + eps);
            prop_assert!(r.y + r.h <= h + eps);
        }
    }

    #[test]
    fn skewed_values_stay_inside_container(values in skewed_values(), (w, h) in container()) {
        let items = build_items(&values);
        let rects = layout(&items, w, h).unwrap();
        let eps = 1e-6 * w.max(h);

        prop_assert_eq!(rects.len(), items.len());
        for r in &rects {
            prop_assert!(r.w >= 0.0 && r.h >= 0.0);
            prop_assert!(r.x >= -eps && r.y >= -eps);
            prop_assert!(r.x + r.w <= w + eps);
            prop_assert!(r.y + r.h <= h + eps);
        }
        let total: f64 = rects.iter().map(LayoutRect::area).sum();
        prop_assert!((total - w * h).abs() <= 1e-6 * w * h);
    }

    #[test]
    fn layout_is_idempotent(values in positive_values(), (w, h) in container()) {
        let items = build_items(&values);
        let first = layout(&items, w, h).unwrap();
        let second = layout(&items, w, h).unwrap();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn output_is_sorted_by_value(values in positive_values(), (w, h) in container()) {
        let items = build_items(&values);
        let rects = layout(&items, w, h).unwrap();

        for pair in rects.windows(2) {
            prop_assert!(pair[0].item.value >= pair[1].item.value);
        }
    }

    #[test]
    fn non_positive_values_are_skipped(
        values in prop::collection::vec(-100.0f64..100.0, 0..30),
    ) {
        let items = build_items(&values);
        let rects = layout(&items, 100.0, 100.0).unwrap();

        let positive = values.iter().filter(|v| **v > 0.0).count();
        prop_assert_eq!(rects.len(), positive);
        prop_assert!(rects.iter().all(|r| r.item.value > 0.0));
    }
}

#[test]
fn test_percentage_container() {
    let items = vec![
        TreemapItem::new("005930", 6_000_000.0).with_name("삼성전자"),
        TreemapItem::new("000660", 3_000_000.0).with_name("SK하이닉스"),
        TreemapItem::new("035420", 1_000_000.0).with_name("NAVER"),
    ];
    let rects = layout(&items, 100.0, 100.0).unwrap();

    let areas: Vec<f64> = rects.iter().map(LayoutRect::area).collect();
    assert!((areas[0] - 6000.0).abs() < 1e-6);
    assert!((areas[1] - 3000.0).abs() < 1e-6);
    assert!((areas[2] - 1000.0).abs() < 1e-6);
    assert!((areas.iter().sum::<f64>() - 10_000.0).abs() < 1e-6);
}

#[test]
fn test_to_percent_matches_percentage_layout() {
    let items = vec![
        TreemapItem::new("A", 5.0),
        TreemapItem::new("B", 3.0),
        TreemapItem::new("C", 2.0),
    ];
    let pixel = layout(&items, 800.0, 800.0).unwrap();
    let percent = layout(&items, 100.0, 100.0).unwrap();

    for (px, pct) in pixel.iter().zip(percent.iter()) {
        let converted = px.to_percent(800.0, 800.0);
        assert!((converted.x - pct.x).abs() < 1e-9);
        assert!((converted.y - pct.y).abs() < 1e-9);
        assert!((converted.w - pct.w).abs() < 1e-9);
        assert!((converted.h - pct.h).abs() < 1e-9);
    }
}
