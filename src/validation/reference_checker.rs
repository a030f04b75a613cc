//! 引用检查：验证字段间的跨表引用关系
//!
//! 标记为 `[Sheet/Field]` 的字段在 JSON 生成阶段收集待检查项，
//! 所有表导出完成后统一对照目标表的 JSON 产物进行存在性与类型检查。

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::logging::warn_collected;
use crate::models::TypeKind;
use crate::parsing::field_parser::value_type_ok;
use crate::utils::naming_config::{
    JSON_FILE_PATTERN, REFERENCE_ALLOW_EMPTY_INT_VALUES, REFERENCE_ALLOW_EMPTY_STRING_VALUES,
};

/// 一条待检查的引用
#[derive(Debug, Clone)]
pub struct PendingRefCheck {
    pub excel_row: usize,
    pub field_name: String,
    pub ref_sheet: String,
    /// None 表示省略（回退到 id 或首个非空标量列）
    pub ref_field: Option<String>,
    pub kind: TypeKind,
    pub base: Option<String>,
    pub value: Value,
}

/// 目标表某列的引用集合：值集合（规范化字符串）、推断类型、实际列名
type RefSet = Option<(HashSet<String>, Option<String>, String)>;

/// 引用检查器：负责验证工作表之间的引用关系
#[derive(Debug)]
pub struct ReferenceChecker {
    sheet_name: String,
    source_file: Option<String>,
    pending_ref_checks: Vec<PendingRefCheck>,
    ref_dict_warned_cols: HashSet<usize>,
    reference_checks_done: bool,
}

impl ReferenceChecker {
    pub fn new(sheet_name: impl Into<String>, source_file: Option<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            source_file,
            pending_ref_checks: Vec::new(),
            ref_dict_warned_cols: HashSet::new(),
            reference_checks_done: false,
        }
    }

    /// 添加待检查的引用项
    pub fn add_pending_check(&mut self, check_item: PendingRefCheck) {
        self.pending_ref_checks.push(check_item);
    }

    /// 记录已警告的字典类型列
    pub fn add_warned_dict_col(&mut self, col_index: usize) {
        self.ref_dict_warned_cols.insert(col_index);
    }

    /// 检查字典类型列是否已警告
    pub fn is_dict_col_warned(&self, col_index: usize) -> bool {
        self.ref_dict_warned_cols.contains(&col_index)
    }

    /// 清空待检查项（用于同一张表多次导出）
    pub fn clear_pending_checks(&mut self) {
        self.pending_ref_checks.clear();
        self.reference_checks_done = false;
    }

    /// 统一的日志源前缀：优先 Excel 文件名
    fn source_prefix(&self) -> String {
        match &self.source_file {
            Some(src) => format!("[{}] ", src),
            None => format!("[{}] ", self.sheet_name),
        }
    }

    /// 执行引用检查
    ///
    /// `search_dirs` 为目标表 JSON 的查找目录（客户端/工程输出目录），
    /// `sheet_to_file_map` 用于在日志中显示目标 Excel 文件名。
    pub fn run_checks(
        &mut self,
        search_dirs: &[&str],
        sheet_to_file_map: &HashMap<String, String>,
    ) {
        // 若没有待检查项或已检查过，直接返回，避免重复日志
        if self.reference_checks_done || self.pending_ref_checks.is_empty() {
            return;
        }

        let mut resolver = RefSetResolver::new(search_dirs);
        let src_disp_default = self.source_prefix();
        let mut any_error = false;

        for item in &self.pending_ref_checks {
            let ref_pack = resolver.load(&item.ref_sheet, item.ref_field.as_deref());
            let (ref_values, ref_base, ref_real_field) = match ref_pack {
                Some(pack) => pack,
                None => {
                    warn_collected(format!(
                        "{}行{} 字段 {} 引用 [{}/{}] 未找到目标表 JSON，已跳过检查",
                        src_disp_default,
                        item.excel_row,
                        item.field_name,
                        item.ref_sheet,
                        item.ref_field.as_deref().unwrap_or("id")
                    ));
                    continue;
                }
            };

            let target_excel = sheet_to_file_map
                .get(&item.ref_sheet)
                .cloned()
                .unwrap_or_else(|| format!("{}.xlsx", item.ref_sheet));
            let target_disp = format!("[{}]", target_excel);
            let marker = format!("[{}/{}]", item.ref_sheet, ref_real_field);

            // 声明类型与目标列类型不一致直接报错
            if let (Some(base), Some(rb)) = (item.base.as_deref(), ref_base.as_deref()) {
                if base != rb {
                    any_error = true;
                    let declared = if item.kind == TypeKind::List {
                        format!("list({})", base)
                    } else {
                        base.to_string()
                    };
                    log::error!(
                        "{}行{} 字段{} 引用类型不匹配 {}，但被标记为{}（目标类型为{}，本字段声明为 {}）",
                        src_disp_default,
                        item.excel_row,
                        item.field_name,
                        target_disp,
                        marker,
                        rb,
                        declared
                    );
                }
            }

            let expected_base = item.base.clone().or_else(|| ref_base.clone());
            let mut check_one = |v: &Value| {
                // 允许空值策略：命中则跳过存在性检查
                if is_empty_ref(v, expected_base.as_deref()) {
                    return;
                }
                if let Some(base) = expected_base.as_deref() {
                    if !value_type_ok(base, v) {
                        log::error!(
                            "{}行{} 字段 {} 类型不匹配，期望 {}，实际值 {}",
                            src_disp_default,
                            item.excel_row,
                            item.field_name,
                            base,
                            v
                        );
                        return;
                    }
                }
                if !ref_values.contains(&canonical_value(v)) {
                    any_error = true;
                    log::error!(
                        "{}行{} 字段{} 引用值{} 不存在于{}，但被标记为{}",
                        src_disp_default,
                        item.excel_row,
                        item.field_name,
                        v,
                        target_disp,
                        marker
                    );
                }
            };

            match item.kind {
                TypeKind::List => match &item.value {
                    Value::Array(elements) => {
                        for ele in elements {
                            check_one(ele);
                        }
                    }
                    _ => {
                        log::error!(
                            "{}行{} 字段 {} 声明为 list({}) 但实际非列表",
                            src_disp_default,
                            item.excel_row,
                            item.field_name,
                            item.base.as_deref().unwrap_or("?")
                        );
                    }
                },
                _ => check_one(&item.value),
            }
        }

        // 执行了检查且无任何错误时打印一行成功日志
        if !any_error {
            log::info!("{}没有引用丢失或引用类型不匹配", src_disp_default);
        }

        // 标记已完成，避免重复打印
        self.reference_checks_done = true;
    }
}

/// 空引用判定：int 0/-1、空字符串视为"未填写"
fn is_empty_ref(v: &Value, base: Option<&str>) -> bool {
    match base {
        Some("int") => v
            .as_i64()
            .map(|i| REFERENCE_ALLOW_EMPTY_INT_VALUES.contains(&i))
            .unwrap_or(false),
        Some("string") => v
            .as_str()
            .map(|s| REFERENCE_ALLOW_EMPTY_STRING_VALUES.contains(&s))
            .unwrap_or(false),
        _ => false,
    }
}

/// 值的规范化字符串表示：整数值的 float 与 int 等价
fn canonical_value(v: &Value) -> String {
    if let Some(f) = v.as_f64() {
        if f.fract() == 0.0 && f.abs() < 9e15 {
            return format!("{}", f as i64);
        }
    }
    v.to_string()
}

/// 从值推断基础类型
fn infer_base_from_value(v: &Value) -> Option<String> {
    match v {
        Value::Bool(_) => Some("bool".to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("int".to_string()),
        Value::Number(_) => Some("float".to_string()),
        Value::String(_) => Some("string".to_string()),
        _ => None,
    }
}

/// 选择第一条记录中，第一个非空且非容器的字段（包含 id）
fn pick_first_nonempty_field(obj: &Map<String, Value>) -> Option<String> {
    for (k, v) in obj {
        match v {
            Value::Array(_) | Value::Object(_) | Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            _ => return Some(k.clone()),
        }
    }
    None
}

/// 目标表 JSON 的按需加载与列集合缓存
struct RefSetResolver<'a> {
    search_dirs: Vec<&'a str>,
    json_obj_cache: HashMap<String, Value>,
    json_missing: HashSet<String>,
    column_cache: HashMap<(String, String), RefSet>,
}

impl<'a> RefSetResolver<'a> {
    fn new(search_dirs: &[&'a str]) -> Self {
        Self {
            search_dirs: search_dirs.to_vec(),
            json_obj_cache: HashMap::new(),
            json_missing: HashSet::new(),
            column_cache: HashMap::new(),
        }
    }

    /// 加载目标表指定列的引用集合；目标 JSON 缺失或损坏返回 None
    fn load(&mut self, sheet: &str, field: Option<&str>) -> RefSet {
        if let Some(field) = field {
            if let Some(cached) = self
                .column_cache
                .get(&(sheet.to_string(), field.to_string()))
            {
                return cached.clone();
            }
        }
        if self.json_missing.contains(sheet) {
            return None;
        }

        if !self.json_obj_cache.contains_key(sheet) {
            match self.read_sheet_json(sheet) {
                Some(obj) => {
                    self.json_obj_cache.insert(sheet.to_string(), obj);
                }
                None => {
                    self.json_missing.insert(sheet.to_string());
                    return None;
                }
            }
        }
        let obj = self.json_obj_cache.get(sheet).cloned()?;

        // 确定实际引用列
        let real_field = match field {
            Some(f) => f.to_string(),
            None => obj
                .as_object()
                .and_then(|map| map.values().next())
                .and_then(|first_row| first_row.as_object())
                .and_then(pick_first_nonempty_field)
                .unwrap_or_else(|| "id".to_string()),
        };

        let cache_key = (sheet.to_string(), real_field.clone());
        if let Some(cached) = self.column_cache.get(&cache_key) {
            return cached.clone();
        }

        // 构建该列的引用集合
        let mut values = HashSet::new();
        let mut base: Option<String> = None;
        if let Some(map) = obj.as_object() {
            for row in map.values() {
                if let Some(v) = row.as_object().and_then(|r| r.get(&real_field)) {
                    if base.is_none() {
                        base = infer_base_from_value(v);
                    }
                    values.insert(canonical_value(v));
                }
            }
        }

        let pack = Some((values, base, real_field));
        self.column_cache.insert(cache_key, pack.clone());
        pack
    }

    /// 在各查找目录中定位并解析目标表 JSON
    fn read_sheet_json(&self, sheet: &str) -> Option<Value> {
        let file_name = JSON_FILE_PATTERN.replace("{name}", sheet);
        for dir in &self.search_dirs {
            let candidate = Path::new(dir).join(&file_name);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate).ok()?;
                return serde_json::from_str(&content).ok();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_target_json(dir: &Path, sheet: &str, content: &Value) {
        std::fs::write(
            dir.join(format!("{}.json", sheet)),
            serde_json::to_string_pretty(content).unwrap(),
        )
        .unwrap();
    }

    fn check(
        excel_row: usize,
        field: &str,
        ref_sheet: &str,
        ref_field: Option<&str>,
        kind: TypeKind,
        base: Option<&str>,
        value: Value,
    ) -> PendingRefCheck {
        PendingRefCheck {
            excel_row,
            field_name: field.to_string(),
            ref_sheet: ref_sheet.to_string(),
            ref_field: ref_field.map(str::to_string),
            kind,
            base: base.map(str::to_string),
            value,
        }
    }

    #[test]
    fn test_resolver_builds_column_set() {
        let dir = tempdir().unwrap();
        write_target_json(
            dir.path(),
            "Item",
            &json!({
                "1": {"id": 1, "name": "甲"},
                "2": {"id": 2, "name": "乙"}
            }),
        );
        let dir_str = dir.path().to_string_lossy().to_string();
        let mut resolver = RefSetResolver::new(&[dir_str.as_str()]);

        let (values, base, real_field) = resolver.load("Item", Some("id")).unwrap();
        assert_eq!(real_field, "id");
        assert_eq!(base.as_deref(), Some("int"));
        assert!(values.contains("1"));
        assert!(values.contains("2"));
        assert!(!values.contains("3"));

        // 省略字段 -> 第一个非空标量列（id）
        let (_, _, real_field) = resolver.load("Item", None).unwrap();
        assert_eq!(real_field, "id");

        // 缺失的表
        assert!(resolver.load("Missing", Some("id")).is_none());
    }

    #[test]
    fn test_run_checks_pass_and_missing_value() {
        let dir = tempdir().unwrap();
        write_target_json(
            dir.path(),
            "Item",
            &json!({"1": {"id": 1}, "2": {"id": 2}}),
        );
        let dir_str = dir.path().to_string_lossy().to_string();

        let mut checker = ReferenceChecker::new("Skill", Some("Skill.xlsx".to_string()));
        checker.add_pending_check(check(
            7,
            "itemId",
            "Item",
            Some("id"),
            TypeKind::Scalar,
            Some("int"),
            json!(2),
        ));
        // 允许空值 0 跳过存在性检查
        checker.add_pending_check(check(
            8,
            "itemId",
            "Item",
            Some("id"),
            TypeKind::Scalar,
            Some("int"),
            json!(0),
        ));
        // 列表引用
        checker.add_pending_check(check(
            9,
            "itemIds",
            "Item",
            Some("id"),
            TypeKind::List,
            Some("int"),
            json!([1, 2]),
        ));
        checker.run_checks(&[dir_str.as_str()], &HashMap::new());
        // 重复调用是幂等的
        checker.run_checks(&[dir_str.as_str()], &HashMap::new());
    }

    #[test]
    fn test_clear_pending_checks() {
        let mut checker = ReferenceChecker::new("Skill", None);
        checker.add_pending_check(check(
            7,
            "x",
            "Item",
            None,
            TypeKind::Scalar,
            Some("int"),
            json!(1),
        ));
        checker.clear_pending_checks();
        // 清空后运行不访问任何文件
        checker.run_checks(&[], &HashMap::new());
    }

    #[test]
    fn test_dict_col_warned_tracking() {
        let mut checker = ReferenceChecker::new("Skill", None);
        assert!(!checker.is_dict_col_warned(3));
        checker.add_warned_dict_col(3);
        assert!(checker.is_dict_col_warned(3));
    }

    #[test]
    fn test_canonical_value_int_float_equivalence() {
        assert_eq!(canonical_value(&json!(3)), "3");
        assert_eq!(canonical_value(&json!(3.0)), "3");
        assert_eq!(canonical_value(&json!(3.5)), "3.5");
        assert_eq!(canonical_value(&json!("a")), "\"a\"");
    }

    #[test]
    fn test_pick_first_nonempty_field() {
        let obj = json!({"a": null, "b": "", "c": [1], "d": 5, "e": "x"});
        let map = obj.as_object().unwrap();
        assert_eq!(pick_first_nonempty_field(map), Some("d".to_string()));
    }
}
