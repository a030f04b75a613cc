//! 工作表验证：主键预检查、有效数据检测与接口字段一致性检查

use std::collections::HashMap;
use std::path::PathBuf;

use calamine::DataType;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::logging::warn_collected;
use crate::models::FieldLabel;
use crate::parsing::cell_to_string;
use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_utils::is_valid_csharp_identifier;
use crate::utils::user_utils::user_confirm;

/// 接口文件相对路径（打包时作为运行时数据目录内嵌）
pub const INTERFACE_FILE_PATH: &str = "ProjectFolder/ConfigData/IConfigRawInfo.cs";

/// 匹配接口属性声明：`int id { get; }` / `string name { get; set; }`
static INTERFACE_PROP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(int|string|float|double|bool)\s+(\w+)\s*\{[^{]*?get;[^{]*?\}").unwrap()
});

/// 检查枚举名是否合法（excel_row 为真实 Excel 行号，用于错误提示）
pub fn validate_enum_name(name: Option<&str>, excel_row: i64) -> AppResult<String> {
    let name = name.unwrap_or("").trim();
    if !is_valid_csharp_identifier(name) {
        return Err(AppError::invalid_enum_name_error(name, excel_row));
    }
    Ok(name.to_string())
}

/// 字符串主键预检查：
/// - 验证每个名字是否为合法的 C# 标识符
/// - 收集出现的 Excel 行号，重复则报错（显示真实 Excel 行号）
pub fn check_duplicate_enum_keys(
    row_data: &[(usize, Vec<DataType>)],
    _sheet_name: &str,
) -> AppResult<()> {
    let mut name_rows: HashMap<String, Vec<usize>> = HashMap::new();
    for (excel_row, row) in row_data {
        let val = row.first().and_then(cell_to_string);
        let name = validate_enum_name(val.as_deref(), *excel_row as i64)?;
        name_rows.entry(name).or_default().push(*excel_row);
    }

    let mut dup: Vec<(String, Vec<usize>)> = name_rows
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .collect();
    if dup.is_empty() {
        return Ok(());
    }
    dup.sort_by(|a, b| a.0.cmp(&b.0));
    let lines = dup
        .iter()
        .map(|(name, rows)| format!("{} -> 行{:?}", name, rows))
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::invalid_enum_name_error(
        format!("重复的字符串主键: {}", lines),
        -1,
    ))
}

/// 组合 int 键预检查：
/// - key1/key2 必须是整数且非空
/// - 组合后的 combined 必须唯一（重复则显示真实 Excel 行号）
pub fn check_duplicate_composite_keys(
    row_data: &[(usize, Vec<DataType>)],
    multiplier: i64,
    _max_key2: i64,
    _sheet_name: &str,
) -> AppResult<()> {
    let mut seen: HashMap<i64, usize> = HashMap::new();
    for (excel_row, row) in row_data {
        if row.len() < 2 {
            continue;
        }
        let k1 = row.first().and_then(cell_to_string);
        let k2 = row.get(1).and_then(cell_to_string);
        let (k1, k2) = match (k1, k2) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(AppError::export_error(format!(
                    "行{} key1/key2 为空",
                    excel_row
                )))
            }
        };
        let (i1, i2) = match (k1.parse::<i64>(), k2.parse::<i64>()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => {
                return Err(AppError::export_error(format!(
                    "行{} key1/key2 不是整数: {},{}",
                    excel_row, k1, k2
                )))
            }
        };
        let combined = i1 * multiplier + i2;
        if let Some(prev_row) = seen.get(&combined) {
            return Err(AppError::duplicate_primary_key_error(
                combined, *prev_row, *excel_row,
            ));
        }
        seen.insert(combined, *excel_row);
    }
    Ok(())
}

/// 检查是否至少存在一行包含至少一个非 ignore 且非空的单元格
///
/// 不改变生成逻辑，仅用于日志提示。
pub fn check_has_effective_data(
    row_data: &[(usize, Vec<DataType>)],
    field_count: usize,
    data_labels: &[FieldLabel],
) -> bool {
    for (_, row) in row_data {
        for (offset, cell) in row.iter().enumerate() {
            let col_index = offset + 1;
            if col_index >= field_count {
                continue;
            }
            if data_labels
                .get(col_index)
                .map(|l| *l == FieldLabel::Ignore)
                .unwrap_or(false)
            {
                continue;
            }
            if cell_to_string(cell).is_some() {
                return true;
            }
        }
    }
    false
}

/// 解析接口文件中的属性定义（名称 -> 类型小写）
fn parse_interface_fields(content: &str) -> HashMap<String, String> {
    INTERFACE_PROP_RE
        .captures_iter(content)
        .map(|caps| (caps[2].to_string(), caps[1].to_lowercase()))
        .collect()
}

/// 定位接口文件：优先当前目录，其次可执行文件所在目录（打包运行时）
fn locate_interface_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from(INTERFACE_FILE_PATH),
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join(INTERFACE_FILE_PATH)))
            .unwrap_or_default(),
    ];
    candidates.into_iter().find(|p| p.is_file())
}

/// 接口字段类型一致性检查
///
/// 解析 IConfigRawInfo.cs 获取接口字段及类型：
/// - id/name 与接口（或内置期望 id:int, name:string）不一致时直接报错
/// - 其他同名字段类型不符时提示并由用户确认是否继续
pub fn check_interface_field_types(
    sheet_name: &str,
    properties: &[(String, String)],
    assume_yes: bool,
) -> AppResult<()> {
    check_interface_field_types_at(sheet_name, properties, assume_yes, locate_interface_file())
}

/// 可注入接口文件路径的实现（测试用）
pub fn check_interface_field_types_at(
    sheet_name: &str,
    properties: &[(String, String)],
    assume_yes: bool,
    interface_path: Option<PathBuf>,
) -> AppResult<()> {
    let content = match &interface_path {
        Some(path) => std::fs::read_to_string(path).unwrap_or_default(),
        None => String::new(),
    };
    let interface_fields = parse_interface_fields(&content);

    let props: HashMap<&str, String> = properties
        .iter()
        .map(|(name, cs_type)| (name.as_str(), cs_type.to_lowercase()))
        .collect();

    // 1) id/name 执行强制一致性检查（与接口或内置期望一致），不通过直接中断
    let expected_id = interface_fields
        .get("id")
        .cloned()
        .unwrap_or_else(|| "int".to_string());
    let expected_name = interface_fields
        .get("name")
        .cloned()
        .unwrap_or_else(|| "string".to_string());

    let mut hard_errors: Vec<String> = Vec::new();
    if let Some(actual) = props.get("id") {
        if *actual != expected_id {
            hard_errors.push(format!(
                "id 字段类型为 {}，必须为 {}，因为id属性必须跟接口一致。如果要保留类型{}，建议修改字段名",
                actual, expected_id, actual
            ));
        }
    }
    if let Some(actual) = props.get("name") {
        if *actual != expected_name {
            hard_errors.push(format!(
                "name 字段类型为 {}，必须为 {}，因为name属性必须跟接口一致。如果要保留类型{}，建议修改字段名",
                actual, expected_name, actual
            ));
        }
    }
    if !hard_errors.is_empty() {
        let detail = hard_errors
            .iter()
            .map(|x| format!("  - {}", x))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(AppError::export_error(format!(
            "表[{}] 字段类型错误：\n{}",
            sheet_name, detail
        )));
    }

    // 2) 其他接口字段保持"提示并确认"的流程
    let mut wrongs: Vec<(String, String, String)> = Vec::new();
    for (fname, ftype) in &interface_fields {
        if fname == "id" || fname == "name" {
            continue;
        }
        if let Some(actual) = props.get(fname.as_str()) {
            if actual != ftype {
                wrongs.push((fname.clone(), actual.clone(), ftype.clone()));
            }
        }
    }
    if !wrongs.is_empty() {
        wrongs.sort();
        let mut msg = format!("表[{}] 字段类型警告：\n", sheet_name);
        for (fname, actual, expect) in &wrongs {
            msg.push_str(&format!("  - {} 字段类型为 {}，应为 {}\n", fname, actual, expect));
        }
        msg.push_str("这可能导致生成的 C# 脚本无法通过编译。\n是否继续导出？(y/n)");
        if user_confirm(&msg, assume_yes) {
            warn_collected(format!("表[{}] 接口字段类型不符，用户选择继续导出", sheet_name));
        } else {
            return Err(AppError::user_cancelled_error("用户取消导出：接口字段类型不符"));
        }
    }

    Ok(())
}
