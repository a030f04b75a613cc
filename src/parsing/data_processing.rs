//! 单元格值类型转换
//!
//! 按第3行类型注解把单元格内容转换为 JSON 值，支持基础类型、
//! list、dict、枚举以及全限定自定义类型。转换所需的枚举注册表
//! 与自定义类型注册表由调用方显式传入。

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::generation::EnumRegistry;
use crate::logging::warn_collected;
use crate::models::TypeKind;
use crate::utils::error::{AppError, AppResult};
use crate::utils::type_utils::{extract_enum_name, parse_type_annotation};

/// 容器注解的内部类型提取：list(...) / dict(...)
static INNER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((.*)\)").unwrap());

/// 自定义类型解析函数
pub type CustomParser = Box<dyn Fn(Option<&str>) -> Result<Value, String> + Send + Sync>;

/// 自定义类型注册表
///
/// 全限定类型名（至少包含一个 '.'）-> 解析函数。
/// 未注册的类型默认走通用回退：按 '#' 切分为 segments 并保留原串。
pub struct CustomTypeRegistry {
    handlers: HashMap<String, CustomParser>,
    /// 是否启用未注册自定义类型的通用回退解析
    pub generic_fallback: bool,
}

impl Default for CustomTypeRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl CustomTypeRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            generic_fallback: true,
        }
    }

    /// 带内置类型的注册表（Localization.LocalizedStringRef）
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("Localization.LocalizedStringRef", |raw| {
            Ok(parse_localized_string_ref(raw))
        });
        registry
    }

    /// 注册自定义类型解析器
    pub fn register<F>(&mut self, full_name: impl Into<String>, parser: F)
    where
        F: Fn(Option<&str>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.handlers.insert(full_name.into(), Box::new(parser));
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.handlers.contains_key(full_name)
    }

    pub fn all_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// 调用注册的解析函数
    pub fn parse(
        &self,
        full_name: &str,
        raw: Option<&str>,
        field: Option<&str>,
        sheet: Option<&str>,
    ) -> AppResult<Value> {
        let handler = self.handlers.get(full_name).ok_or_else(|| {
            AppError::unknown_custom_type_error(full_name, field, sheet)
        })?;
        handler(raw).map_err(|reason| {
            AppError::custom_type_parse_error(
                full_name,
                raw.unwrap_or(""),
                reason,
                field,
                sheet,
            )
        })
    }
}

/// 默认示例: Localization.LocalizedStringRef 形如 文本#上下文 (#可省)
fn parse_localized_string_ref(raw: Option<&str>) -> Value {
    match raw {
        None | Some("") => json!({"keyHash": 0, "source": "", "context": ""}),
        Some(txt) => {
            let txt = txt.replace("\r\n", "\n");
            let (src, ctx) = match txt.split_once('#') {
                Some((s, c)) => (s.trim().to_string(), c.trim().to_string()),
                None => (txt.trim().to_string(), String::new()),
            };
            json!({"keyHash": 0, "source": src, "context": ctx})
        }
    }
}

/// 通用自定义类型打包：按 '#' 切分为 segments，保留原串
fn generic_custom_type_object(full_name: &str, raw: Option<&str>) -> Value {
    match raw {
        None | Some("") => json!({"__type": full_name, "segments": []}),
        Some(txt) => {
            let txt = txt.replace("\r\n", "\n");
            let segments: Vec<String> = txt.split('#').map(|p| p.trim().to_string()).collect();
            json!({"__type": full_name, "__raw": txt, "segments": segments})
        }
    }
}

/// 类型转换上下文：注册表引用与错误定位信息
pub struct ConvertCtx<'a> {
    pub enums: &'a EnumRegistry,
    pub customs: &'a CustomTypeRegistry,
    pub sheet: Option<&'a str>,
    pub field: Option<&'a str>,
    pub row: Option<usize>,
    pub col: Option<usize>,
}

impl<'a> ConvertCtx<'a> {
    /// 错误/警告消息的定位前缀："[表] 行r 列c 字段f "
    fn prefix(&self) -> String {
        let mut prefix = String::new();
        if let Some(sheet) = self.sheet {
            prefix.push_str(&format!("[{}] ", sheet));
        }
        if let Some(row) = self.row {
            prefix.push_str(&format!("行{} ", row));
        }
        if let Some(col) = self.col {
            prefix.push_str(&format!("列{} ", col));
        }
        if let Some(field) = self.field {
            prefix.push_str(&format!("字段{} ", field));
        }
        prefix
    }
}

/// 根据类型注解转换值
///
/// `value` 为 None 表示空单元格（调用方已处理默认值回退）。
/// 支持 "int", "list(int)", "dict(int,string)", "enum(Name)",
/// "list(enum(Name))", "dict(K,enum(Name))" 以及全限定自定义类型。
pub fn convert_to_type(type_str: &str, value: Option<&str>, ctx: &ConvertCtx) -> AppResult<Value> {
    let type_str = type_str.trim();
    if type_str.is_empty() {
        return Err(AppError::export_error(format!("{}空类型定义", ctx.prefix())));
    }

    let (kind, base) = parse_type_annotation(type_str);

    match kind {
        TypeKind::Enum => {
            let enum_name = base.unwrap_or_default();
            convert_enum(&enum_name, value, ctx).map(Value::from)
        }
        TypeKind::List => {
            if let Some(enum_name) = base.as_deref().and_then(extract_enum_name) {
                return convert_list_enum(&enum_name, value, ctx);
            }
            convert_list(type_str, value, ctx)
        }
        TypeKind::Dict => {
            if let Some(enum_name) = base.as_deref().and_then(extract_enum_name) {
                return convert_dict_enum(type_str, &enum_name, value, ctx);
            }
            convert_dict(type_str, value, ctx)
        }
        TypeKind::Scalar => {
            let base = base.unwrap_or_default();
            if is_primitive(&base) {
                return convert_primitive(&base, value, ctx);
            }
            // 自定义(简单策略: 至少包含一个 . 视为全限定类型)
            if type_str.contains('.') {
                if ctx.customs.contains(type_str) {
                    return ctx.customs.parse(type_str, value, ctx.field, ctx.sheet);
                }
                if ctx.customs.generic_fallback {
                    return Ok(generic_custom_type_object(type_str, value));
                }
                return Err(AppError::unknown_custom_type_error(
                    type_str, ctx.field, ctx.sheet,
                ));
            }
            Err(AppError::export_error(format!(
                "{}不支持的数据类型: {}",
                ctx.prefix(),
                type_str
            )))
        }
    }
}

fn is_primitive(base: &str) -> bool {
    matches!(base, "int" | "float" | "bool" | "string")
}

/// 转换为基本类型，并做C#风格范围/合法性检查
fn convert_primitive(base: &str, value: Option<&str>, ctx: &ConvertCtx) -> AppResult<Value> {
    let raw = value.unwrap_or("");
    match base {
        "int" => {
            let v = if raw.trim().is_empty() {
                0
            } else {
                parse_int(raw).ok_or_else(|| {
                    AppError::export_error(format!(
                        "{}值{:?}无法转换为C# int",
                        ctx.prefix(),
                        raw
                    ))
                })?
            };
            if !(-2147483648..=2147483647).contains(&v) {
                warn_collected(format!(
                    "{}值{:?}超出C# int范围[-2147483648,2147483647]，实际为{}",
                    ctx.prefix(),
                    raw,
                    v
                ));
            }
            Ok(Value::from(v))
        }
        "float" => {
            let v = if raw.trim().is_empty() {
                0.0
            } else {
                raw.trim().parse::<f64>().map_err(|_| {
                    AppError::export_error(format!(
                        "{}值{:?}无法转换为C# float",
                        ctx.prefix(),
                        raw
                    ))
                })?
            };
            if v.abs() > 3.402_823_5e38 {
                warn_collected(format!(
                    "{}值{:?}超出C# float范围[-3.4028235e38,3.4028235e38]，实际为{}",
                    ctx.prefix(),
                    raw,
                    v
                ));
            }
            Ok(Value::from(v))
        }
        "bool" => {
            let s = raw.trim().to_lowercase();
            let v = matches!(s.as_str(), "1" | "true");
            // 空值视为False且不警告
            if !s.is_empty() && !matches!(s.as_str(), "1" | "0" | "true" | "false") {
                warn_collected(format!(
                    "{}值{:?}不是C# bool允许的取值(true/false/1/0)",
                    ctx.prefix(),
                    raw
                ));
            }
            Ok(Value::from(v))
        }
        "string" => {
            if raw.len() > 65535 {
                warn_collected(format!(
                    "{}字符串长度{}超出C# string推荐上限65535，可能导致序列化或存储异常",
                    ctx.prefix(),
                    raw.len()
                ));
            }
            Ok(Value::from(raw.to_string()))
        }
        _ => Err(AppError::export_error(format!(
            "{}不支持的数据类型: {}",
            ctx.prefix(),
            base
        ))),
    }
}

/// int 解析：整数字符串直接解析，小数字符串截断取整
fn parse_int(raw: &str) -> Option<i64> {
    let t = raw.trim();
    if let Ok(v) = t.parse::<i64>() {
        return Some(v);
    }
    t.parse::<f64>().ok().map(|f| f.trunc() as i64)
}

/// 转换为列表类型，例如 list(int)，逗号分隔，递归转换元素
fn convert_list(type_str: &str, value: Option<&str>, ctx: &ConvertCtx) -> AppResult<Value> {
    let mut result = Vec::new();
    let inner = match INNER_RE.captures(type_str) {
        Some(caps) => caps[1].trim().to_string(),
        None => return Ok(Value::Array(result)),
    };
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(Value::Array(result)),
    };

    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        result.push(convert_with_check(&inner, part, ctx)?);
    }
    Ok(Value::Array(result))
}

/// 转换为字典类型，例如 dict(int,string)；每行一条 `key:value`
fn convert_dict(type_str: &str, value: Option<&str>, ctx: &ConvertCtx) -> AppResult<Value> {
    let mut result = Map::new();
    let inner = match INNER_RE.captures(type_str) {
        Some(caps) => caps[1].to_string(),
        None => return Ok(Value::Object(result)),
    };
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(Value::Object(result)),
    };

    let (key_type, value_type) = match inner.split_once(',') {
        Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
        None => return Ok(Value::Object(result)),
    };

    for line in raw.lines() {
        if let Some((key, val)) = line.split_once(':') {
            let key = dict_key_string(&key_type, key.trim(), ctx)?;
            let converted = convert_with_check(&value_type, val.trim(), ctx)?;
            result.insert(key, converted);
        }
    }
    Ok(Value::Object(result))
}

/// 字典键统一为字符串键（JSON 对象约束），int 键先做合法性解析
fn dict_key_string(key_type: &str, key: &str, ctx: &ConvertCtx) -> AppResult<String> {
    if key_type == "int" {
        let v = parse_int(key).ok_or_else(|| {
            AppError::export_error(format!("{}字典键{:?}无法转换为C# int", ctx.prefix(), key))
        })?;
        return Ok(v.to_string());
    }
    Ok(key.to_string())
}

/// 转换枚举类型：将枚举项名称转换为枚举值（整数）
fn convert_enum(enum_name: &str, value: Option<&str>, ctx: &ConvertCtx) -> AppResult<i64> {
    // 验证枚举是否存在
    if !ctx.enums.has_enum(enum_name) {
        return Err(AppError::export_error(format!(
            "{}枚举类型 '{}' 未定义。可用的枚举类型: {:?}",
            ctx.prefix(),
            enum_name,
            ctx.enums.all_enum_names()
        )));
    }

    // 非嵌套枚举不允许空值
    let item_name = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => {
            return Err(AppError::export_error(format!(
                "{}枚举字段不允许为空值（枚举类型: {}）",
                ctx.prefix(),
                enum_name
            )))
        }
    };

    // 验证枚举项名称格式（大写驼峰式）
    if !ctx.enums.validate_enum_item_name(item_name) {
        return Err(AppError::export_error(format!(
            "{}枚举项名称 '{}' 不符合C#命名规范（必须大写驼峰式）。枚举类型: {}",
            ctx.prefix(),
            item_name,
            enum_name
        )));
    }

    ctx.enums
        .get_enum_value(enum_name, item_name)
        .map_err(|e| AppError::export_error(format!("{}{}", ctx.prefix(), e)))
}

/// 转换枚举列表类型：list(enum(枚举名))，列表允许为空
fn convert_list_enum(enum_name: &str, value: Option<&str>, ctx: &ConvertCtx) -> AppResult<Value> {
    let mut result = Vec::new();
    let raw = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(Value::Array(result)),
    };

    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        result.push(Value::from(convert_enum(enum_name, Some(part), ctx)?));
    }
    Ok(Value::Array(result))
}

/// 转换字典枚举类型：dict(K, enum(枚举名))
fn convert_dict_enum(
    type_str: &str,
    enum_name: &str,
    value: Option<&str>,
    ctx: &ConvertCtx,
) -> AppResult<Value> {
    let mut result = Map::new();
    let inner = match INNER_RE.captures(type_str) {
        Some(caps) => caps[1].to_string(),
        None => return Ok(Value::Object(result)),
    };
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(Value::Object(result)),
    };

    let key_type = inner
        .split_once(',')
        .map(|(k, _)| k.trim().to_string())
        .unwrap_or_default();

    for line in raw.lines() {
        if let Some((key, val)) = line.split_once(':') {
            let key = dict_key_string(&key_type, key.trim(), ctx)?;
            let enum_value = convert_enum(enum_name, Some(val.trim()), ctx)?;
            result.insert(key, Value::from(enum_value));
        }
    }
    Ok(Value::Object(result))
}

/// 递归类型转换+范围检查。支持基础、list、dict、enum
fn convert_with_check(type_str: &str, value: &str, ctx: &ConvertCtx) -> AppResult<Value> {
    let t = type_str.trim();
    let (kind, base) = parse_type_annotation(t);
    match kind {
        TypeKind::Scalar => {
            let base = base.unwrap_or_default();
            if is_primitive(&base) {
                convert_primitive(&base, Some(value), ctx)
            } else {
                // 其它类型暂不递归
                Ok(Value::from(value.to_string()))
            }
        }
        TypeKind::List => convert_list(t, Some(value), ctx),
        TypeKind::Dict => convert_dict(t, Some(value), ctx),
        TypeKind::Enum => {
            let enum_name = base.unwrap_or_default();
            convert_enum(&enum_name, Some(value), ctx).map(Value::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnumSpec;

    fn registry_with_item_type() -> EnumRegistry {
        let mut enums = EnumRegistry::new();
        enums
            .register_enum(&EnumSpec {
                name: "ItemType".to_string(),
                members: vec![("Sword".to_string(), 0), ("Shield".to_string(), 1)],
                remarks: vec![None, None],
                namespace: "Data.TableScript".to_string(),
                source: "test".to_string(),
            })
            .unwrap();
        enums
    }

    fn ctx<'a>(enums: &'a EnumRegistry, customs: &'a CustomTypeRegistry) -> ConvertCtx<'a> {
        ConvertCtx {
            enums,
            customs,
            sheet: Some("Item"),
            field: Some("f"),
            row: Some(7),
            col: Some(2),
        }
    }

    #[test]
    fn test_convert_primitives() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);

        assert_eq!(convert_to_type("int", Some("15"), &c).unwrap(), json!(15));
        assert_eq!(convert_to_type("int", Some("15.0"), &c).unwrap(), json!(15));
        assert_eq!(convert_to_type("int", None, &c).unwrap(), json!(0));
        assert_eq!(convert_to_type("float", Some("0.5"), &c).unwrap(), json!(0.5));
        assert_eq!(convert_to_type("bool", Some("1"), &c).unwrap(), json!(true));
        assert_eq!(convert_to_type("bool", Some("false"), &c).unwrap(), json!(false));
        assert_eq!(convert_to_type("bool", None, &c).unwrap(), json!(false));
        assert_eq!(convert_to_type("string", Some("abc"), &c).unwrap(), json!("abc"));
        assert_eq!(convert_to_type("str", Some("abc"), &c).unwrap(), json!("abc"));
        assert_eq!(convert_to_type("string", None, &c).unwrap(), json!(""));
    }

    #[test]
    fn test_convert_int_failure() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        let err = convert_to_type("int", Some("abc"), &c).unwrap_err();
        assert!(err.to_string().contains("无法转换为C# int"));
        assert!(err.to_string().contains("[Item]"));
        assert!(err.to_string().contains("行7"));
    }

    #[test]
    fn test_convert_list() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        assert_eq!(
            convert_to_type("list(int)", Some("1, 2,3"), &c).unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(convert_to_type("list(int)", None, &c).unwrap(), json!([]));
        assert_eq!(
            convert_to_type("list(string)", Some("a,b"), &c).unwrap(),
            json!(["a", "b"])
        );
    }

    #[test]
    fn test_convert_dict() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        assert_eq!(
            convert_to_type("dict(int,string)", Some("1:甲\n2:乙"), &c).unwrap(),
            json!({"1": "甲", "2": "乙"})
        );
        assert_eq!(
            convert_to_type("dict(string,int)", Some("a:1"), &c).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(convert_to_type("dict(int,string)", None, &c).unwrap(), json!({}));
    }

    #[test]
    fn test_convert_enum() {
        let enums = registry_with_item_type();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);

        assert_eq!(
            convert_to_type("enum(ItemType)", Some("Shield"), &c).unwrap(),
            json!(1)
        );
        assert_eq!(
            convert_to_type("list(enum(ItemType))", Some("Sword,Shield"), &c).unwrap(),
            json!([0, 1])
        );
        assert_eq!(
            convert_to_type("dict(int,enum(ItemType))", Some("1:Sword"), &c).unwrap(),
            json!({"1": 0})
        );
        // 枚举列表允许为空
        assert_eq!(
            convert_to_type("list(enum(ItemType))", None, &c).unwrap(),
            json!([])
        );
    }

    #[test]
    fn test_convert_enum_errors() {
        let enums = registry_with_item_type();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);

        // 未定义的枚举
        let err = convert_to_type("enum(Missing)", Some("A"), &c).unwrap_err();
        assert!(err.to_string().contains("未定义"));
        assert!(err.to_string().contains("ItemType"));

        // 空值
        let err = convert_to_type("enum(ItemType)", None, &c).unwrap_err();
        assert!(err.to_string().contains("不允许为空值"));

        // 小写开头的枚举项
        let err = convert_to_type("enum(ItemType)", Some("sword"), &c).unwrap_err();
        assert!(err.to_string().contains("命名规范"));

        // 不存在的枚举项
        let err = convert_to_type("enum(ItemType)", Some("Axe"), &c).unwrap_err();
        assert!(err.to_string().contains("不存在枚举项"));
    }

    #[test]
    fn test_custom_type_builtin() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        assert_eq!(
            convert_to_type("Localization.LocalizedStringRef", Some("你好#问候"), &c).unwrap(),
            json!({"keyHash": 0, "source": "你好", "context": "问候"})
        );
        assert_eq!(
            convert_to_type("Localization.LocalizedStringRef", Some("你好"), &c).unwrap(),
            json!({"keyHash": 0, "source": "你好", "context": ""})
        );
    }

    #[test]
    fn test_custom_type_generic_fallback() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        let v = convert_to_type("Game.SkillRef", Some("fire#3"), &c).unwrap();
        assert_eq!(v["__type"], json!("Game.SkillRef"));
        assert_eq!(v["segments"], json!(["fire", "3"]));

        let empty = convert_to_type("Game.SkillRef", None, &c).unwrap();
        assert_eq!(empty, json!({"__type": "Game.SkillRef", "segments": []}));
    }

    #[test]
    fn test_custom_type_fallback_disabled() {
        let enums = EnumRegistry::new();
        let mut customs = CustomTypeRegistry::with_builtin();
        customs.generic_fallback = false;
        let c = ctx(&enums, &customs);
        let err = convert_to_type("Game.SkillRef", Some("x"), &c).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CUSTOM_TYPE_ERROR");
    }

    #[test]
    fn test_unsupported_type() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        let err = convert_to_type("vector3", Some("x"), &c).unwrap_err();
        assert!(err.to_string().contains("不支持的数据类型"));
    }

    #[test]
    fn test_alias_types() {
        let enums = EnumRegistry::new();
        let customs = CustomTypeRegistry::with_builtin();
        let c = ctx(&enums, &customs);
        // 别名在解析阶段归一化
        assert_eq!(convert_to_type("int32", Some("3"), &c).unwrap(), json!(3));
        assert_eq!(convert_to_type("double", Some("1.5"), &c).unwrap(), json!(1.5));
        assert_eq!(convert_to_type("boolean", Some("true"), &c).unwrap(), json!(true));
    }
}
