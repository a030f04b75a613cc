//! # 工具模块
//!
//! 导表流程的基础支撑：错误类型、配置管理、类型注解解析、
//! 命名规范校验、路径安全与用户确认。

pub mod config;
pub mod error;
pub mod naming_config;
pub mod naming_utils;
pub mod path_utils;
pub mod type_utils;
pub mod user_utils;

pub use config::{resolve_config, ConfigManager, SheetConfig};
pub use error::{AppError, AppResult};
