//! # Dashboard Core
//!
//! 대시보드 코어 크레이트들이 공유하는 기반 타입을 제공합니다.
//!
//! - 에러 타입
//! - 설정 관리 (파일 + 환경 변수)
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;
