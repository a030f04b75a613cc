//! 类型注解工具：解析第3行类型字符串并转换为 C# 类型表示
//!
//! 支持的注解形态：
//! - 标量：`int` / `float` / `string` / `bool`（含 int32、double、str 等别名）
//! - 容器：`list(T)`、`dict(K,V)`
//! - 枚举：`enum(Name)`、`list(enum(Name))`、`dict(K,enum(Name))`

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::TypeKind;

static ENUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^enum\s*\(\s*([^)]+)\s*\)$").unwrap());
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^list\s*\(\s*(.+)\s*\)$").unwrap());
static DICT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^dict\s*\(\s*([^,]+)\s*,\s*(.+)\s*\)$").unwrap());

/// 归一化基础类型别名
fn base_norm(s: &str) -> String {
    match s.trim().to_lowercase().as_str() {
        "int" | "int32" | "integer" => "int".to_string(),
        "float" | "double" => "float".to_string(),
        "str" | "string" => "string".to_string(),
        "bool" | "boolean" => "bool".to_string(),
        other => other.to_string(),
    }
}

/// 解析类型注解
///
/// 返回 (类型种类, 基础类型或枚举名)：
/// - `Scalar` -> 归一化后的基础类型
/// - `List`   -> 元素基础类型，或内层 `enum(Name)` 原样保留
/// - `Dict`   -> 值为枚举时保留 `enum(Name)`，否则为 None
/// - `Enum`   -> 枚举类型名
pub fn parse_type_annotation(type_str: &str) -> (TypeKind, Option<String>) {
    let t = type_str.trim();

    if let Some(caps) = ENUM_RE.captures(t) {
        return (TypeKind::Enum, Some(caps[1].trim().to_string()));
    }

    if let Some(caps) = LIST_RE.captures(t) {
        let inner = caps[1].trim();
        if let Some(inner_caps) = ENUM_RE.captures(inner) {
            return (
                TypeKind::List,
                Some(format!("enum({})", inner_caps[1].trim())),
            );
        }
        return (TypeKind::List, Some(base_norm(inner)));
    }

    if let Some(caps) = DICT_RE.captures(t) {
        let value_type = caps[2].trim();
        if let Some(value_caps) = ENUM_RE.captures(value_type) {
            return (
                TypeKind::Dict,
                Some(format!("enum({})", value_caps[1].trim())),
            );
        }
        return (TypeKind::Dict, None);
    }

    (TypeKind::Scalar, Some(base_norm(t)))
}

/// 从 `enum(Name)` 形式中提取枚举名
pub fn extract_enum_name(annotation: &str) -> Option<String> {
    ENUM_RE
        .captures(annotation.trim())
        .map(|caps| caps[1].trim().to_string())
}

/// 验证类型注解的合法性
///
/// 检查括号匹配与顺序、嵌套深度（最大3层）以及逗号用法，
/// 返回 Err(原因) 表示注解非法。
pub fn validate_type_annotation(type_str: &str) -> Result<(), String> {
    let t = type_str.trim();
    if t.is_empty() {
        return Err("类型注解为空".to_string());
    }

    let open = t.matches('(').count();
    let close = t.matches(')').count();
    if open != close {
        return Err("括号不匹配".to_string());
    }

    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    for c in t.chars() {
        match c {
            '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err("括号顺序错误".to_string());
                }
            }
            _ => {}
        }
    }

    if max_depth > 3 {
        return Err(format!("嵌套深度过深: {} (最大允许3层)", max_depth));
    }

    if t.starts_with(',') || t.ends_with(',') {
        return Err("类型注解不能以逗号开头或结尾".to_string());
    }
    if t.contains(",,") {
        return Err("类型注解不能包含连续的逗号".to_string());
    }

    Ok(())
}

/// 将类型注解转换为 C# 类型表示
///
/// `list(int)` -> `List<int>`，`dict(int,string)` -> `Dictionary<int,string>`，
/// `enum(X)` -> `X`，`list(enum(X))` -> `List<X>`
pub fn convert_type_to_csharp(type_str: &str) -> String {
    static LIST_ENUM_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^list\s*\(\s*enum\s*\(\s*([^)]+)\s*\)\s*\)$").unwrap()
    });
    static DICT_ENUM_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^dict\s*\(\s*([^,]+)\s*,\s*enum\s*\(\s*([^)]+)\s*\)\s*\)$").unwrap()
    });

    let t = type_str.trim();

    if let Some(caps) = ENUM_RE.captures(t) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = LIST_ENUM_RE.captures(t) {
        return format!("List<{}>", caps[1].trim());
    }
    if let Some(caps) = DICT_ENUM_RE.captures(t) {
        return format!("Dictionary<{}, {}>", caps[1].trim(), caps[2].trim());
    }

    t.replace("list", "List")
        .replace("dict", "Dictionary")
        .replace('(', "<")
        .replace(')', ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar() {
        assert_eq!(
            parse_type_annotation("int"),
            (TypeKind::Scalar, Some("int".to_string()))
        );
        assert_eq!(
            parse_type_annotation("string"),
            (TypeKind::Scalar, Some("string".to_string()))
        );
        // 别名归一化
        assert_eq!(
            parse_type_annotation("int32"),
            (TypeKind::Scalar, Some("int".to_string()))
        );
        assert_eq!(
            parse_type_annotation("double"),
            (TypeKind::Scalar, Some("float".to_string()))
        );
        assert_eq!(
            parse_type_annotation("str"),
            (TypeKind::Scalar, Some("string".to_string()))
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_type_annotation("list(int)"),
            (TypeKind::List, Some("int".to_string()))
        );
        assert_eq!(
            parse_type_annotation("list(string)"),
            (TypeKind::List, Some("string".to_string()))
        );
    }

    #[test]
    fn test_parse_dict() {
        assert_eq!(parse_type_annotation("dict(int,string)"), (TypeKind::Dict, None));
        assert_eq!(
            parse_type_annotation("dict(int, enum(ItemType))"),
            (TypeKind::Dict, Some("enum(ItemType)".to_string()))
        );
    }

    #[test]
    fn test_parse_enum() {
        assert_eq!(
            parse_type_annotation("enum(TestEnum)"),
            (TypeKind::Enum, Some("TestEnum".to_string()))
        );
        assert_eq!(
            parse_type_annotation("list(enum(TestEnum))"),
            (TypeKind::List, Some("enum(TestEnum)".to_string()))
        );
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate_type_annotation("int").is_ok());
        assert!(validate_type_annotation("list(int)").is_ok());
        assert!(validate_type_annotation("dict(int,string)").is_ok());
        assert!(validate_type_annotation("list(enum(TestEnum))").is_ok());
        assert!(validate_type_annotation("list(list(int))").is_ok());
    }

    #[test]
    fn test_validate_bracket_mismatch() {
        let err = validate_type_annotation("list(int").unwrap_err();
        assert!(err.contains("括号不匹配"));
        let err = validate_type_annotation("list(int))").unwrap_err();
        assert!(err.contains("括号不匹配"));
    }

    #[test]
    fn test_validate_nested_too_deep() {
        let err = validate_type_annotation("list(list(list(list(int))))").unwrap_err();
        assert!(err.contains("嵌套深度过深"));
    }

    #[test]
    fn test_validate_empty() {
        assert!(validate_type_annotation("").unwrap_err().contains("为空"));
        assert!(validate_type_annotation("   ").unwrap_err().contains("为空"));
    }

    #[test]
    fn test_validate_bracket_order() {
        let err = validate_type_annotation("list)int(").unwrap_err();
        assert!(err.contains("括号顺序错误"));
    }

    #[test]
    fn test_convert_to_csharp() {
        assert_eq!(convert_type_to_csharp("int"), "int");
        assert_eq!(convert_type_to_csharp("string"), "string");
        assert_eq!(convert_type_to_csharp("list(int)"), "List<int>");
        assert_eq!(convert_type_to_csharp("dict(int,string)"), "Dictionary<int,string>");
        assert_eq!(convert_type_to_csharp("enum(TestEnum)"), "TestEnum");
        assert_eq!(convert_type_to_csharp("list(enum(TestEnum))"), "List<TestEnum>");
        assert_eq!(
            convert_type_to_csharp("dict(int, enum(TestEnum))"),
            "Dictionary<int, TestEnum>"
        );
    }
}
