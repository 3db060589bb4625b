//! 工具模块
//!
//! 错误类型、标识生成与日志系统。

pub mod error;
pub mod id;
pub mod logger;

pub use error::{error_code, CoreError, ErrorKind, Result};
pub use id::{generate_token, generate_uuid, is_valid_token};
pub use logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
