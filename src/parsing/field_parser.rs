//! 字段名前缀解析
//!
//! 字段行（第5行）的字段名可携带前缀：
//! - `key1:RealName` / `key2:RealName` —— 组合主键标记
//! - `[Sheet/Field]RealName` 或 `[Sheet]RealName` —— 引用标记（省略 Field 时默认 id）
//! - `[Asset]RealName` / `[Asset:png]RealName` —— 资源文件校验标记
//!
//! 引用标记的 Sheet 名不允许包含 ':'，避免与 [Asset:ext] 混淆。

use once_cell::sync::Lazy;
use regex::Regex;

use serde_json::Value;

static KEY1_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*key1\s*:\s*(?P<name>.+?)\s*$").unwrap());
static KEY2_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*key2\s*:\s*(?P<name>.+?)\s*$").unwrap());
static REF_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[(?P<sheet>[^:/\]]+)(?:/(?P<field>[^\]]+))?\]\s*(?P<name>.+)$").unwrap()
});
static ASSET_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\[asset(?::(?P<ext>[A-Za-z0-9_]+))?\]\s*(?P<name>.+)$").unwrap()
});

/// 组合键前缀位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Key1,
    Key2,
}

/// 从原始字段名中提取真实字段名（去掉所有前缀）
pub fn extract_actual_field_name(raw_field_name: &str) -> String {
    if let Some(caps) = KEY1_PREFIX_RE.captures(raw_field_name) {
        return caps["name"].trim().to_string();
    }
    if let Some(caps) = KEY2_PREFIX_RE.captures(raw_field_name) {
        return caps["name"].trim().to_string();
    }
    // 资源前缀先于引用前缀匹配，[Asset] 本身也符合 [Sheet] 的形状
    if let Some(caps) = ASSET_PREFIX_RE.captures(raw_field_name) {
        return caps["name"].trim().to_string();
    }
    if let Some(caps) = REF_PREFIX_RE.captures(raw_field_name) {
        return caps["name"].trim().to_string();
    }
    raw_field_name.to_string()
}

/// 解析引用前缀 [Sheet/Field] 或 [Sheet]
///
/// 返回 (目标表名, 目标字段名)；目标字段缺省为 None（检查时回退到 id）。
pub fn parse_ref_prefix(raw_field_name: &str) -> Option<(String, Option<String>)> {
    let caps = REF_PREFIX_RE.captures(raw_field_name)?;
    let sheet = caps["sheet"].trim().to_string();
    let field = caps
        .name("field")
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());
    Some((sheet, field))
}

/// 解析资源前缀 [Asset] 或 [Asset:ext]
///
/// 返回 (真实字段名, 扩展名)；扩展名统一小写。
pub fn parse_asset_prefix(raw_field_name: &str) -> Option<(String, Option<String>)> {
    let caps = ASSET_PREFIX_RE.captures(raw_field_name)?;
    let field_name = caps["name"].trim().to_string();
    let ext = caps
        .name("ext")
        .map(|m| m.as_str().trim().to_lowercase())
        .filter(|s| !s.is_empty());
    Some((field_name, ext))
}

/// 解析 key1: 或 key2: 前缀
pub fn parse_key_prefix(raw_field_name: &str) -> Option<(KeyPrefix, String)> {
    if let Some(caps) = KEY1_PREFIX_RE.captures(raw_field_name) {
        return Some((KeyPrefix::Key1, caps["name"].trim().to_string()));
    }
    if let Some(caps) = KEY2_PREFIX_RE.captures(raw_field_name) {
        return Some((KeyPrefix::Key2, caps["name"].trim().to_string()));
    }
    None
}

/// 检查 JSON 值是否符合指定的基础类型（引用检查用）
pub fn value_type_ok(base: &str, v: &Value) -> bool {
    match base {
        "int" => v.is_i64() || v.is_u64(),
        "float" => v.is_number(),
        "string" => v.is_string(),
        "bool" => v.is_boolean(),
        // 未知类型：不强校验
        _ => true,
    }
}
