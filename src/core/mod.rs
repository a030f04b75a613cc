//! # 核心模块
//!
//! 单个工作表的导出模型与批量导表流程。

pub mod export_process;
pub mod worksheet_data;

pub use export_process::ExportPipeline;
pub use worksheet_data::{ExportContext, WorksheetData};
