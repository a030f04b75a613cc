//! # 生成模块
//!
//! 枚举注册表与 C# 脚本/枚举文件的模板化生成、输出写入与清理台账。

pub mod cs_generation;
pub mod enum_registry;

pub use cs_generation::{OutputWriter, ScriptGenerator};
pub use enum_registry::EnumRegistry;
