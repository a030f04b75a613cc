//! # 模型枚举类型模块
//!
//! 定义导表流程中使用的枚举类型：
//! - **类型注解种类**: 标量/列表/字典/枚举四类类型注解
//! - **字段标签**: 第4行标签对字段的导出约束
//! - **主键策略**: 单列 int / 组合 int / 字符串枚举三种主键方案
//!
//! 所有枚举都支持 JSON 序列化，并提供与字符串的双向转换能力。

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// 类型注解的种类
/// 由 `parse_type_annotation` 从第3行类型字符串解析得出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// 标量类型：int / float / string / bool
    Scalar,
    /// 列表类型：list(T)
    List,
    /// 字典类型：dict(K,V)
    Dict,
    /// 枚举类型：enum(Name)
    Enum,
}

impl Display for TypeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TypeKind::Scalar => "scalar",
            TypeKind::List => "list",
            TypeKind::Dict => "dict",
            TypeKind::Enum => "enum",
        };
        write!(f, "{}", s)
    }
}

/// 字段标签（表头第4行）
/// 控制单列的导出行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldLabel {
    /// 无标签：正常导出，空值回退到默认值或类型零值
    Plain,
    /// required：空值且无默认值时导出失败
    Required,
    /// ignore：该列不参与导出
    Ignore,
}

impl Default for FieldLabel {
    fn default() -> Self {
        Self::Plain
    }
}

impl FieldLabel {
    /// 从第4行单元格内容解析标签，未识别的内容按无标签处理
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("required") => Self::Required,
            Some("ignore") => Self::Ignore,
            _ => Self::Plain,
        }
    }
}

/// 主键策略
/// 按以下优先级在工作表构造时检测：字符串枚举键 > 组合 int 键 > 单列 int 键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStrategy {
    /// 字符串枚举主键：首个有效字段为 string 类型，
    /// 数据行首列的字符串成为自动编号的枚举项
    EnumKeys,
    /// 组合 int 主键：前两个字段标记为 key1:Real / key2:Real 且均为 int，
    /// combined = key1 * MULTIPLIER + key2
    CompositeInt {
        /// key1 对应的真实字段名
        key1: String,
        /// key2 对应的真实字段名
        key2: String,
    },
    /// 单列 int 主键（默认行为）
    SingleInt,
}

impl Default for KeyStrategy {
    fn default() -> Self {
        Self::SingleInt
    }
}

impl KeyStrategy {
    /// 是否需要为该表生成 {Sheet}Keys 枚举文件
    pub fn needs_generated_keys(&self) -> bool {
        matches!(self, Self::EnumKeys)
    }

    /// 是否为组合键
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::CompositeInt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_label_parse() {
        assert_eq!(FieldLabel::parse(Some("required")), FieldLabel::Required);
        assert_eq!(FieldLabel::parse(Some("ignore")), FieldLabel::Ignore);
        assert_eq!(FieldLabel::parse(Some("  ignore  ")), FieldLabel::Ignore);
        assert_eq!(FieldLabel::parse(Some("")), FieldLabel::Plain);
        assert_eq!(FieldLabel::parse(Some("其它")), FieldLabel::Plain);
        assert_eq!(FieldLabel::parse(None), FieldLabel::Plain);
    }

    #[test]
    fn test_key_strategy_helpers() {
        assert!(KeyStrategy::EnumKeys.needs_generated_keys());
        assert!(!KeyStrategy::SingleInt.needs_generated_keys());
        let composite = KeyStrategy::CompositeInt {
            key1: "id".to_string(),
            key2: "group".to_string(),
        };
        assert!(composite.is_composite());
        assert!(!composite.needs_generated_keys());
    }

    #[test]
    fn test_type_kind_display() {
        assert_eq!(TypeKind::Scalar.to_string(), "scalar");
        assert_eq!(TypeKind::List.to_string(), "list");
        assert_eq!(TypeKind::Dict.to_string(), "dict");
        assert_eq!(TypeKind::Enum.to_string(), "enum");
    }
}
