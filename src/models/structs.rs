//! # 模型结构体模块
//!
//! 导表流程中跨模块传递的数据载体。

use serde::{Deserialize, Serialize};

/// 一个待生成的枚举定义
///
/// 第一阶段从各 Excel 收集，统一注册后再写出 C# 枚举文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumSpec {
    /// 枚举类型名称（如 "SampleKeys"）
    pub name: String,
    /// 枚举项（名称, 值），保持收集顺序
    pub members: Vec<(String, i64)>,
    /// 每个枚举项的注释（与 members 对齐）
    pub remarks: Vec<Option<String>>,
    /// 所属命名空间
    pub namespace: String,
    /// 来源信息（用于错误提示，如 "Item.xlsx" 或 "Item.xlsx/Enum-ItemType"）
    pub source: String,
}

impl EnumSpec {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            remarks: Vec::new(),
            namespace: namespace.into(),
            source: source.into(),
        }
    }
}

/// 单次导表运行的统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportStats {
    /// 成功导出的 Excel 文件数
    pub ok: usize,
    /// 跳过的 Excel 文件数（首字母非大写）
    pub skipped: usize,
    /// 本次实际写入的 JSON 总字节数
    pub total_json_bytes: u64,
    /// 总耗时（秒）
    pub elapsed_secs: f64,
}

impl ExportStats {
    /// 人类可读的 JSON 总大小
    pub fn human_json_size(&self) -> String {
        human_bytes(self.total_json_bytes)
    }
}

/// 简单的人类可读字节格式
pub fn human_bytes(n: u64) -> String {
    if n < 1024 {
        format!("{} B", n)
    } else if n < 1024 * 1024 {
        format!("{:.1} KB", n as f64 / 1024.0)
    } else {
        format!("{:.2} MB", n as f64 / 1024.0 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_enum_spec_new() {
        let spec = EnumSpec::new("ItemKeys", "Data.TableScript", "Item.xlsx");
        assert_eq!(spec.name, "ItemKeys");
        assert!(spec.members.is_empty());
        assert_eq!(spec.namespace, "Data.TableScript");
    }
}
