//! 레이아웃 에러 타입.

use dashboard_core::DashboardError;
use thiserror::Error;

/// 레이아웃 입력 에러.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// 컨테이너 크기가 양의 유한값이 아님
    #[error("잘못된 컨테이너 크기: {width} x {height}")]
    InvalidContainer { width: f64, height: f64 },
}

/// 레이아웃 작업을 위한 Result 타입.
pub type LayoutResult<T> = Result<T, LayoutError>;

impl From<LayoutError> for DashboardError {
    fn from(err: LayoutError) -> Self {
        DashboardError::InvalidInput(err.to_string())
    }
}
