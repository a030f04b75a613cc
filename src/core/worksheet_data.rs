//! 工作表数据处理模块：处理单个 Worksheet 的数据导出逻辑
//!
//! 表头约定（列从 A 起，行号 1-based）：
//! 第1行备注、第2行表头、第3行类型、第4行标签（required/ignore）、
//! 第5行字段名、第6行默认值；数据从第7行、B 列开始（A 列为留白列）。
//!
//! 支持三种主键策略：
//! 1) 字符串枚举主键（首个有效字段为 string 类型）
//! 2) 单列 int 主键（默认行为）
//! 3) 组合 int 主键（key1:RealName, key2:RealName 位于前两个字段）
//!    组合映射算法：combined = key1 * MULTIPLIER + key2（无冲突）
//!
//! 使用前缀配置（key1:xxx / key2:yyy）时会解析出真实字段名，
//! 并在生成的 C# 方法中使用真实字段名作为参数名。

use std::collections::HashMap;
use std::path::Path;

use calamine::{DataType, Range};
use serde_json::{Map, Value};

use crate::generation::cs_generation::{OutputWriter, ScriptGenerator};
use crate::generation::EnumRegistry;
use crate::logging::warn_collected;
use crate::models::{EnumSpec, FieldLabel, KeyStrategy, TypeKind};
use crate::parsing::data_processing::{convert_to_type, ConvertCtx, CustomTypeRegistry};
use crate::parsing::excel_processing::{
    cell_to_string, check_repeating_values, read_data_rows, read_row_values,
};
use crate::parsing::field_parser::{
    extract_actual_field_name, parse_asset_prefix, parse_key_prefix, parse_ref_prefix, KeyPrefix,
};
use crate::utils::config::JsonOptions;
use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_config::{
    CS_NAMESPACE, ENUM_KEYS_SUFFIX, JSON_FILE_PATTERN, MAX_KEY2, MULTIPLIER,
};
use crate::utils::naming_utils::is_valid_csharp_identifier;
use crate::utils::path_utils::sanitize_filename;
use crate::utils::type_utils::{convert_type_to_csharp, parse_type_annotation};
use crate::validation::reference_checker::{PendingRefCheck, ReferenceChecker};
use crate::validation::worksheet_validator::{
    check_duplicate_composite_keys, check_duplicate_enum_keys, check_has_effective_data,
    validate_enum_name,
};
use crate::validation::AssetValidator;

/// 可选字段统计开关（默认打印一次汇总）
const PRINT_FIELD_SUMMARY: bool = true;

/// 每多少条记录做一次轻量的单条大小检查
const RECORD_CHECK_INTERVAL: usize = 50;

/// 导出上下文：一次运行内共享的写入器、注册表与选项
pub struct ExportContext<'a> {
    pub writer: &'a OutputWriter,
    pub enums: &'a EnumRegistry,
    pub customs: &'a CustomTypeRegistry,
    pub json: &'a JsonOptions,
    pub assets: Option<&'a AssetValidator>,
}

/// 单个工作表的导出模型
#[derive(Debug)]
pub struct WorksheetData {
    pub name: String,
    pub source_file: Option<String>,
    remarks: Vec<Option<String>>,
    headers: Vec<Option<String>>,
    data_types: Vec<Option<String>>,
    data_labels: Vec<FieldLabel>,
    field_names: Vec<Option<String>>,
    default_values: Vec<Option<String>>,
    /// (Excel 行号, B 列起的单元格)
    row_data: Vec<(usize, Vec<DataType>)>,
    pub key_strategy: KeyStrategy,
    /// 列索引 -> (目标表, 目标字段)
    ref_specs: HashMap<usize, (String, Option<String>)>,
    /// 列索引 -> 要求的扩展名
    asset_specs: HashMap<usize, Option<String>>,
    reference_checker: ReferenceChecker,
    has_effective_data: bool,
    first_int_pk_not_named_id_warned: bool,
    asset_validator_missing_warned: bool,
}

impl WorksheetData {
    /// 从工作表数据区构造导出模型，并完成全部结构校验
    pub fn new(
        name: &str,
        range: &Range<DataType>,
        source_file: Option<String>,
    ) -> AppResult<Self> {
        // 读取 1..6 行表头
        let remarks = read_row_values(range, 1);
        let headers = read_row_values(range, 2);
        let data_types = read_row_values(range, 3);
        let label_row = read_row_values(range, 4);
        let field_names = read_row_values(range, 5);
        let default_values = read_row_values(range, 6);

        let n_fields = field_names.len();
        if n_fields == 0 {
            return Err(AppError::header_format_error(name, "字段行为空或未定义"));
        }

        // 告警+自动对齐到字段列数，兼容历史表头差异
        let remarks = align_row(remarks, n_fields, name, "备注行");
        let headers = align_row(headers, n_fields, name, "表头行");
        let data_types = align_row(data_types, n_fields, name, "类型行");
        let label_row = align_row(label_row, n_fields, name, "标签行");
        let default_values = align_row(default_values, n_fields, name, "默认值行");

        let data_labels: Vec<FieldLabel> = label_row
            .iter()
            .map(|l| FieldLabel::parse(l.as_deref()))
            .collect();

        // 数据行与重复字段检测
        let row_data = read_data_rows(range);
        check_repeating_values(&field_names)?;

        // 统计（仅用于汇总日志）
        let ignore_count = data_labels
            .iter()
            .filter(|l| **l == FieldLabel::Ignore)
            .count();
        let required_count = data_labels
            .iter()
            .filter(|l| **l == FieldLabel::Required)
            .count();

        let has_effective_data = check_has_effective_data(&row_data, n_fields, &data_labels);

        let mut ws = Self {
            name: name.to_string(),
            source_file: source_file.clone(),
            remarks,
            headers,
            data_types,
            data_labels,
            field_names,
            default_values,
            row_data,
            key_strategy: KeyStrategy::SingleInt,
            ref_specs: HashMap::new(),
            asset_specs: HashMap::new(),
            reference_checker: ReferenceChecker::new(name, source_file),
            has_effective_data,
            first_int_pk_not_named_id_warned: false,
            asset_validator_missing_warned: false,
        };

        ws.key_strategy = ws.detect_key_strategy();
        match &ws.key_strategy {
            KeyStrategy::EnumKeys => check_duplicate_enum_keys(&ws.row_data, &ws.name)?,
            KeyStrategy::CompositeInt { .. } => {
                check_duplicate_composite_keys(&ws.row_data, MULTIPLIER, MAX_KEY2, &ws.name)?
            }
            KeyStrategy::SingleInt => {}
        }

        // 解析字段上的引用前缀 [Sheet/Field] 与资源前缀 [Asset]/[Asset:ext]
        for i in 1..ws.field_names.len() {
            if ws.data_labels[i] == FieldLabel::Ignore {
                continue;
            }
            let raw = match &ws.field_names[i] {
                Some(raw) => raw.as_str(),
                None => continue,
            };
            // 先解析资源标记，命中后不再作为引用处理，避免混淆
            if let Some((_, ext)) = parse_asset_prefix(raw) {
                ws.asset_specs.insert(i, ext);
                continue;
            }
            if let Some((sheet, field)) = parse_ref_prefix(raw) {
                ws.ref_specs.insert(i, (sheet, field));
            }
        }

        // 字段命名规范校验（C# 标识符），不合法则终止导出
        for i in 1..ws.field_names.len() {
            if ws.data_labels[i] == FieldLabel::Ignore {
                continue;
            }
            if ws.field_names[i].is_none() {
                continue;
            }
            let actual = ws.actual_field_name(i);
            if !is_valid_csharp_identifier(&actual) {
                return Err(AppError::invalid_field_name_error(actual, i, &ws.name));
            }
        }

        if !ws.has_effective_data {
            warn_collected(format!("表[{}] 没有有效数据行（将生成空 JSON）。", ws.name));
        }

        if PRINT_FIELD_SUMMARY {
            log::info!(
                "[{}] 字段统计: 总列={} ignore列={} required列={}",
                ws.name,
                ws.field_names.len(),
                ignore_count,
                required_count
            );
        }

        Ok(ws)
    }

    /// 检测主键策略：字符串枚举键 > 组合 int 键 > 单列 int 键
    fn detect_key_strategy(&self) -> KeyStrategy {
        // 首个有效字段为 string 类型 -> 自动生成枚举键
        if let Some(first) = self.effective_indices().into_iter().next() {
            let base = self.data_types[first]
                .as_deref()
                .map(|t| parse_type_annotation(t))
                .and_then(|(kind, base)| (kind == TypeKind::Scalar).then_some(base).flatten());
            if base.as_deref() == Some("string") {
                return KeyStrategy::EnumKeys;
            }
        }

        // 前两个字段带 key1:/key2: 前缀且都是 int -> 组合键
        if self.field_names.len() > 2 {
            let key1 = self.field_names[1].as_deref().and_then(parse_key_prefix);
            let key2 = self.field_names[2].as_deref().and_then(parse_key_prefix);
            if let (Some((KeyPrefix::Key1, real1)), Some((KeyPrefix::Key2, real2))) = (key1, key2) {
                let both_int = [1usize, 2].iter().all(|&i| {
                    self.data_types[i]
                        .as_deref()
                        .map(|t| t.trim().to_lowercase().contains("int"))
                        .unwrap_or(false)
                });
                if both_int && !real1.is_empty() && !real2.is_empty() {
                    return KeyStrategy::CompositeInt {
                        key1: real1,
                        key2: real2,
                    };
                }
            }
        }

        KeyStrategy::SingleInt
    }

    /// 导出所需的有效列索引（排除 ignore 且不含首列留白）
    fn effective_indices(&self) -> Vec<usize> {
        (1..self.field_names.len())
            .filter(|&i| self.data_labels[i] != FieldLabel::Ignore)
            .collect()
    }

    /// 返回列的"真实字段名"（去掉 key1:/key2:/[..] 前缀）
    fn actual_field_name(&self, field_index: usize) -> String {
        match &self.field_names[field_index] {
            Some(raw) => extract_actual_field_name(raw),
            None => String::new(),
        }
    }

    /// 字段名 -> C# 类型（保持 Excel 列顺序）
    pub fn properties(&self) -> Vec<(String, String)> {
        self.effective_indices()
            .into_iter()
            .map(|i| {
                let cs_type = self.data_types[i]
                    .as_deref()
                    .map(convert_type_to_csharp)
                    .unwrap_or_default();
                (self.actual_field_name(i), cs_type)
            })
            .collect()
    }

    /// 字段名 -> 注释（表头: 备注）
    pub fn property_remarks(&self) -> HashMap<String, String> {
        self.effective_indices()
            .into_iter()
            .map(|i| {
                let header = self.headers[i].clone().unwrap_or_default();
                let remark = match &self.remarks[i] {
                    Some(remark) => format!("{}: {}", header, remark),
                    None => header,
                };
                (self.actual_field_name(i), remark)
            })
            .collect()
    }

    /// 计算一行的主键
    fn row_key(
        &mut self,
        excel_row: usize,
        row: &[DataType],
        serial_key: &mut i64,
        first_real: Option<&str>,
    ) -> AppResult<i64> {
        match &self.key_strategy {
            KeyStrategy::EnumKeys => {
                let key = *serial_key;
                *serial_key += 1;
                Ok(key)
            }
            KeyStrategy::CompositeInt { .. } => {
                let k1 = parse_cell_int(row.first());
                let k2 = parse_cell_int(row.get(1));
                let (k1, k2) = match (k1, k2) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(AppError::export_error(format!(
                            "行{} 无法解析组合键 int",
                            excel_row
                        )))
                    }
                };
                if !(0..MAX_KEY2).contains(&k1) || !(0..MAX_KEY2).contains(&k2) {
                    return Err(AppError::export_error(format!(
                        "行{} 组合键超范围 0~{}",
                        excel_row,
                        MAX_KEY2 - 1
                    )));
                }
                let combined = k1 * MULTIPLIER + k2;
                if combined >= 1 << 31 {
                    return Err(AppError::composite_key_overflow_error(combined));
                }
                Ok(combined)
            }
            KeyStrategy::SingleInt => {
                let key = parse_cell_int(row.first()).ok_or_else(|| {
                    AppError::export_error(format!(
                        "行{} 主键非 int: {}",
                        excel_row,
                        row.first().and_then(cell_to_string).unwrap_or_default()
                    ))
                })?;
                if let Some(first_real) = first_real {
                    if !first_real.eq_ignore_ascii_case("id")
                        && !self.first_int_pk_not_named_id_warned
                    {
                        warn_collected(format!(
                            "表[{}] 第一列视为主键但字段名不是 id，已写入 id 属性。建议修改表头。",
                            self.name
                        ));
                        self.first_int_pk_not_named_id_warned = true;
                    }
                }
                Ok(key)
            }
        }
    }

    /// 将表格数据导出为 JSON 文件
    ///
    /// 每条记录都会填充 id 属性：
    /// - 字符串主键（枚举）：id = 序号（枚举 int 值）
    /// - 组合键：id = key1*MULTIPLIER + key2
    /// - 单列 int 主键：id = 第一列的 int 值
    pub fn generate_json(&mut self, output_folder: &Path, ctx: &ExportContext) -> AppResult<()> {
        // 避免重复收集：同一张表导出到多个目录时清空后重新收集
        self.reference_checker.clear_pending_checks();

        let first_real = if self.field_names.len() > 1 {
            Some(self.actual_field_name(1))
        } else {
            None
        };

        let mut records: Vec<(i64, Map<String, Value>)> = Vec::new();
        let mut used_keys: HashMap<i64, usize> = HashMap::new();
        let mut serial_key: i64 = 0;
        let mut required_missing_count: usize = 0;
        let mut oversized_record_warned = false;

        let row_data = std::mem::take(&mut self.row_data);
        let result = (|| -> AppResult<()> {
            for (row_idx, (excel_row, row)) in row_data.iter().enumerate() {
                let row_key =
                    self.row_key(*excel_row, row, &mut serial_key, first_real.as_deref())?;

                if let Some(prev_row) = used_keys.get(&row_key) {
                    return Err(AppError::duplicate_primary_key_error(
                        row_key, *prev_row, *excel_row,
                    ));
                }
                used_keys.insert(row_key, *excel_row);

                // 保持列顺序：按 Excel 顺序构建
                let mut row_obj = Map::new();
                if ctx.json.id_first {
                    row_obj.insert("id".to_string(), Value::from(row_key));
                }

                for (offset, cell) in row.iter().enumerate() {
                    let col_index = offset + 1;
                    if col_index >= self.field_names.len() {
                        continue;
                    }
                    if self.data_labels[col_index] == FieldLabel::Ignore {
                        continue;
                    }
                    let data_name = self.actual_field_name(col_index);
                    let type_str = self.data_types[col_index].clone().unwrap_or_default();
                    let default_value = self.default_values[col_index].clone();
                    let cell_value = cell_to_string(cell);

                    let convert_ctx = ConvertCtx {
                        enums: ctx.enums,
                        customs: ctx.customs,
                        sheet: Some(&self.name),
                        field: Some(&data_name),
                        row: Some(*excel_row),
                        col: None,
                    };
                    let value = match &cell_value {
                        None => {
                            if default_value.is_none()
                                && self.data_labels[col_index] == FieldLabel::Required
                            {
                                required_missing_count += 1;
                                return Err(AppError::export_error(format!(
                                    "{} required 但值为空且无默认值 (行{})",
                                    data_name, excel_row
                                )));
                            }
                            convert_to_type(&type_str, default_value.as_deref(), &convert_ctx)?
                        }
                        Some(raw) => convert_to_type(&type_str, Some(raw), &convert_ctx)?,
                    };

                    // 资源字段校验：值为无扩展名文件名
                    if self.asset_specs.contains_key(&col_index) {
                        self.check_asset_field(ctx, col_index, &data_name, *excel_row, &value)?;
                    }

                    // 收集引用检查
                    if let Some((ref_sheet, ref_field)) = self.ref_specs.get(&col_index).cloned() {
                        let (kind, base) = parse_type_annotation(&type_str);
                        if kind == TypeKind::Dict {
                            if !self.reference_checker.is_dict_col_warned(col_index) {
                                warn_collected(format!(
                                    "[{}] 字段 {} 标注了引用 [{}/{}] 但类型为字典，跳过检查",
                                    self.name,
                                    data_name,
                                    ref_sheet,
                                    ref_field.as_deref().unwrap_or("id")
                                ));
                                self.reference_checker.add_warned_dict_col(col_index);
                            }
                        } else {
                            self.reference_checker.add_pending_check(PendingRefCheck {
                                excel_row: *excel_row,
                                field_name: data_name.clone(),
                                ref_sheet,
                                ref_field,
                                kind,
                                base,
                                value: value.clone(),
                            });
                        }
                    }

                    row_obj.insert(data_name, value);
                }

                if !ctx.json.id_first {
                    row_obj.insert("id".to_string(), Value::from(row_key));
                }

                // 机会性的单条记录大小检查（警告一次后不再检查）
                if !oversized_record_warned && row_idx % RECORD_CHECK_INTERVAL == 0 {
                    if let Ok(record_bytes) = serde_json::to_vec(&row_obj) {
                        if record_bytes.len() > ctx.json.warn_record_bytes {
                            warn_collected(format!(
                                "[{}] 行{} 序列化单条记录大小过大: {} bytes (> {}). 此表可能会导致内存或磁盘问题。",
                                self.name,
                                excel_row,
                                record_bytes.len(),
                                ctx.json.warn_record_bytes
                            ));
                            oversized_record_warned = true;
                        }
                    }
                }

                records.push((row_key, row_obj));
            }
            Ok(())
        })();
        self.row_data = row_data;
        result?;

        if ctx.json.sort_keys {
            records.sort_by_key(|(key, _)| *key);
        }
        let mut data = Map::new();
        let record_count = records.len();
        for (key, row_obj) in records {
            data.insert(key.to_string(), Value::Object(row_obj));
        }

        let file_content = to_pretty_json(&Value::Object(data))?;

        // 全量 JSON 大小检查
        let total_len = file_content.as_bytes().len();
        if total_len > ctx.json.warn_total_bytes {
            warn_collected(format!(
                "[{}] 序列化后的 JSON 总大小为 {} bytes (> {}). 请检查表格是否过大或包含不应导出的数据。",
                self.name, total_len, ctx.json.warn_total_bytes
            ));
        }

        let file_name = sanitize_filename(&JSON_FILE_PATTERN.replace("{name}", &self.name))?;
        ctx.writer
            .write_to_file(&file_content, &output_folder.join(file_name))?;

        if PRINT_FIELD_SUMMARY {
            log::info!(
                "[{}] 导出完成: 行数={} required缺失={}",
                self.name,
                record_count,
                required_missing_count
            );
        }
        Ok(())
    }

    /// [Asset] 字段校验：仅对 string 或 list(string) 做校验
    fn check_asset_field(
        &mut self,
        ctx: &ExportContext,
        col_index: usize,
        data_name: &str,
        excel_row: usize,
        value: &Value,
    ) -> AppResult<()> {
        let required_ext = self
            .asset_specs
            .get(&col_index)
            .cloned()
            .unwrap_or_default();
        let validator = match ctx.assets {
            Some(validator) => validator,
            None => {
                // 未配置或解析失败：提示一次后跳过（不逐行重复提示）
                if !self.asset_validator_missing_warned {
                    warn_collected(format!(
                        "[{}] 未配置 YooAsset 收集设置或解析失败，已跳过 [Asset] 字段校验。请在 sheet_config.json 配置 yooasset.collector_setting",
                        self.name
                    ));
                    self.asset_validator_missing_warned = true;
                }
                return Ok(());
            }
        };

        let marker = match &required_ext {
            Some(ext) => format!("[Asset:{}]", ext),
            None => "[Asset]".to_string(),
        };
        let mut check_one = |file_name: &str| -> AppResult<()> {
            let file_name = file_name.trim();
            if file_name.is_empty() {
                return Ok(());
            }
            if validator.exists_base_name(file_name, required_ext.as_deref()) {
                return Ok(());
            }
            let msg = format!(
                "[{}] 行{} 字段 {} 标记为{}，在任一收集路径下未找到文件名为 '{}' 的资源",
                self.name, excel_row, data_name, marker, file_name
            );
            if validator.strict {
                // 严格模式：直接报错中断
                return Err(AppError::export_error(msg));
            }
            warn_collected(msg);
            Ok(())
        };

        match value {
            Value::Array(elements) => {
                for ele in elements {
                    if let Some(s) = ele.as_str() {
                        check_one(s)?;
                    }
                }
            }
            Value::String(s) => check_one(s)?,
            _ => {}
        }
        Ok(())
    }

    /// 执行引用检查
    pub fn run_reference_checks(
        &mut self,
        search_dirs: &[&str],
        sheet_to_file_map: &HashMap<String, String>,
    ) {
        self.reference_checker
            .run_checks(search_dirs, sheet_to_file_map);
    }

    /// 生成 C# 脚本（必要时生成枚举 Key 文件）
    pub fn generate_script(
        &self,
        generator: &ScriptGenerator,
        writer: &OutputWriter,
        output_folder: &Path,
    ) -> AppResult<()> {
        let props = self.properties();
        let remarks = self.property_remarks();
        generator.generate_script_file(
            writer,
            &self.name,
            CS_NAMESPACE,
            &props,
            &remarks,
            &self.key_strategy,
            output_folder,
        )?;
        if self.key_strategy.needs_generated_keys() {
            let spec = self.enum_keys_spec()?;
            generator.generate_enum_file(writer, &spec, output_folder)?;
        }
        Ok(())
    }

    /// 构造字符串主键表的 {Sheet}Keys 枚举定义
    pub fn enum_keys_spec(&self) -> AppResult<EnumSpec> {
        let mut spec = EnumSpec::new(
            format!("{}{}", self.name, ENUM_KEYS_SUFFIX),
            CS_NAMESPACE,
            self.source_file
                .clone()
                .unwrap_or_else(|| self.name.clone()),
        );
        let mut idx_val = 0;
        for (excel_row, row) in &self.row_data {
            let val = row.first().and_then(cell_to_string);
            let name = validate_enum_name(val.as_deref(), *excel_row as i64)?;
            // 枚举项注释来自备注行对应键列
            let remark = self.remarks.get(1).cloned().flatten();
            spec.members.push((name, idx_val));
            spec.remarks.push(remark);
            idx_val += 1;
        }
        Ok(spec)
    }

    /// 是否存在有效数据行
    pub fn has_effective_data(&self) -> bool {
        self.has_effective_data
    }
}

/// 表头行对齐：少列以 None 填充（尾部空单元格属正常情况，不告警），
/// 多列则截断并告警
fn align_row(
    mut row: Vec<Option<String>>,
    target: usize,
    sheet: &str,
    row_name: &str,
) -> Vec<Option<String>> {
    if row.len() <= target {
        row.resize(target, None);
        return row;
    }
    warn_collected(format!(
        "{}: {} 数量({}) > 字段列({})，已截断多余列",
        sheet,
        row_name,
        row.len(),
        target
    ));
    row.truncate(target);
    row
}

/// 从单元格解析 int（整数 float 视为 int）
fn parse_cell_int(cell: Option<&DataType>) -> Option<i64> {
    match cell? {
        DataType::Int(i) => Some(*i),
        DataType::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        DataType::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// 4 空格缩进的 JSON 序列化
fn to_pretty_json(value: &Value) -> AppResult<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(value, &mut serializer)
        .map_err(|e| AppError::json_error(format!("序列化 JSON 失败: {}", e)))?;
    String::from_utf8(buf).map_err(|e| AppError::json_error(e.to_string()))
}
