/// SheetEase 导表工具 - 核心库
pub mod core;
pub mod dist;
pub mod error;
pub mod generation;
pub mod logging;
pub mod models;
pub mod parsing;
pub mod utils;
pub mod validation;

// 重新导出常用类型，方便使用
pub use crate::core::{ExportPipeline, WorksheetData};
pub use crate::models::*;
pub use crate::utils::{AppError, AppResult, SheetConfig};
