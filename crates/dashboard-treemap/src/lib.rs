//! 포트폴리오 트리맵 레이아웃.
//!
//! 보유 종목 목록을 평가 금액에 비례하는 면적의 사각형으로 배치합니다
//! (squarified 알고리즘). 순수 함수이며 I/O나 내부 상태가 없습니다.
//!
//! - [`layout`]: 사각형 배치
//! - [`style_cells`]: 손익률 기반 색조/강도

pub mod color;
pub mod error;
pub mod squarify;
pub mod types;

pub use color::{intensity, style_cells, CellStyle, PnlTone};
pub use error::{LayoutError, LayoutResult};
pub use squarify::{layout, layout_with_summary, LayoutSummary};
pub use types::{LayoutRect, TreemapItem};
