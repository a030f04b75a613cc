//! # 数据模型模块
//!
//! 定义导表流程中使用的核心数据类型：
//! - **enums**: 类型注解种类、字段标签、主键策略等枚举
//! - **structs**: 枚举定义、导出统计等结构体
//!
//! 所有模型都支持 serde 序列化，便于日志输出与测试断言。

pub mod enums;
pub mod structs;

pub use enums::*;
pub use structs::*;
