//! 批量导表流程
//!
//! 两阶段运行：先收集并导出所有枚举（主键枚举与 Enum- 分表枚举），
//! 再逐表导出 JSON 与 C# 脚本；之后统一执行引用检查与输出目录清理。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use calamine::{DataType, Range, Reader};

use crate::core::worksheet_data::{ExportContext, WorksheetData};
use crate::generation::cs_generation::OutputWriter;
use crate::generation::{EnumRegistry, ScriptGenerator};
use crate::logging::{flush_warning_summary, green_filename, log_sep, warn_collected};
use crate::models::{EnumSpec, ExportStats, TypeKind};
use crate::parsing::data_processing::CustomTypeRegistry;
use crate::parsing::excel_processing::{
    cell_to_string, open_workbook_file, read_data_rows, read_row_values,
};
use crate::utils::config::SheetConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_config::{
    CS_NAMESPACE, ENUM_KEYS_SUFFIX, ENUM_SHEET_TAG, MIN_FREE_DISK_BYTES,
};
use crate::utils::path_utils::validate_path;
use crate::utils::type_utils::parse_type_annotation;
use crate::utils::user_utils::user_confirm;
use crate::validation::worksheet_validator::check_interface_field_types;
use crate::validation::AssetValidator;

/// 批量导表流水线
pub struct ExportPipeline {
    config: SheetConfig,
    writer: OutputWriter,
    generator: ScriptGenerator,
    customs: CustomTypeRegistry,
}

impl ExportPipeline {
    pub fn new(config: SheetConfig) -> AppResult<Self> {
        let writer = OutputWriter::new(config.diff_only, config.dry_run);
        Ok(Self {
            writer,
            generator: ScriptGenerator::new()?,
            customs: CustomTypeRegistry::with_builtin(),
            config,
        })
    }

    /// 执行一次完整导表
    pub async fn run(&mut self) -> AppResult<ExportStats> {
        let start = Instant::now();
        log_sep("开始导表");
        log::info!("Excel目录: {}", self.config.source_folder);

        // 输出目录可写性与磁盘空间检查
        for folder in self.config.output_folders() {
            check_output_dir(folder).await?;
        }

        let excel_files = collect_xlsx_files(Path::new(&self.config.source_folder));
        if excel_files.is_empty() {
            warn_collected("未找到 .xlsx 文件");
        }

        // ========== 第一阶段：收集并导出所有枚举 ==========
        log_sep("第一阶段：收集并导出枚举");
        let mut enums = EnumRegistry::new();
        let mut enum_specs: Vec<EnumSpec> = Vec::new();
        for excel_path in &excel_files {
            self.collect_enums_from_file(excel_path, &mut enums, &mut enum_specs)?;
        }

        if let Some(enum_folder) = self.config.enum_output_folder.clone() {
            if enum_specs.is_empty() {
                log::info!("未发现需要导出的枚举");
            } else {
                log::info!("开始导出 {} 个枚举...", enum_specs.len());
                for spec in &enum_specs {
                    self.generator
                        .generate_enum_file(&self.writer, spec, Path::new(&enum_folder))?;
                    log::info!("已导出枚举: {}", spec.name);
                }
            }
        }

        // ========== 第二阶段：处理表格数据 ==========
        log_sep("第二阶段：处理表格数据");
        let asset_validator = AssetValidator::from_config(&self.config.yooasset);
        let mut stats = ExportStats::default();
        let mut sheets: Vec<WorksheetData> = Vec::new();
        // Excel 文件名 -> 主表名（用于命名冲突检查）
        let mut file_sheet_map: HashMap<String, String> = HashMap::new();
        // 主表名 -> Excel 文件名（用于日志显示目标 Excel 文件）
        let mut sheet_to_file_map: HashMap<String, String> = HashMap::new();

        for excel_path in &excel_files {
            let file_name = file_name_of(excel_path);
            if !starts_with_uppercase(&file_name) {
                warn_collected(format!("跳过(首字母非大写): {}", green_filename(&file_name)));
                stats.skipped += 1;
                continue;
            }

            let ctx = ExportContext {
                writer: &self.writer,
                enums: &enums,
                customs: &self.customs,
                json: &self.config.json,
                assets: asset_validator.as_ref(),
            };
            match self.process_excel_file(excel_path, &file_sheet_map, &ctx)? {
                Some(ws) => {
                    file_sheet_map.insert(file_name.clone(), ws.name.clone());
                    sheet_to_file_map.insert(ws.name.clone(), file_name.clone());
                    sheets.push(ws);
                    stats.ok += 1;
                    log::info!("完成 {}\n", file_name);
                }
                None => {}
            }
        }

        // 统一引用检查（导出后）
        if !sheets.is_empty() {
            log::info!("");
            log::info!("————开始引用检查————");
            let search_dirs: Vec<&str> = [
                self.config.output_client_folder.as_deref(),
                self.config.output_project_folder.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect();
            for ws in &mut sheets {
                ws.run_reference_checks(&search_dirs, &sheet_to_file_map);
            }
        }

        if self.config.auto_cleanup {
            log_sep("清理阶段");
            self.cleanup_files();
        }

        stats.elapsed_secs = start.elapsed().as_secs_f64();
        stats.total_json_bytes = self.total_json_bytes();

        log_sep("结束");
        // 打印最终结果前统一输出所有警告，便于快速查看
        flush_warning_summary("以下为本次运行收集到的所有警告：");
        log::info!(
            "成功 {}，跳过 {}，总耗时 {:.2}s，总生成 JSON 大小: {}. diff_only:{}, dry_run:{}",
            stats.ok,
            stats.skipped,
            stats.elapsed_secs,
            stats.human_json_size(),
            self.config.diff_only,
            self.config.dry_run
        );

        Ok(stats)
    }

    /// 第一阶段：从单个 Excel 收集枚举定义
    ///
    /// 方式1（主表字符串主键）出错仅告警并继续；
    /// 方式2（Enum- 分表）中的命名违规与重复定义是致命错误。
    fn collect_enums_from_file(
        &self,
        excel_path: &Path,
        enums: &mut EnumRegistry,
        enum_specs: &mut Vec<EnumSpec>,
    ) -> AppResult<()> {
        let file_name = file_name_of(excel_path);
        if !starts_with_uppercase(&file_name) {
            return Ok(());
        }

        let mut workbook = match open_workbook_file(excel_path) {
            Ok(wb) => wb,
            Err(e) => {
                crate::log_file_parsing_failure!(
                    "打开失败（枚举收集阶段）: {} -> {}",
                    green_filename(&file_name),
                    e
                );
                return Ok(());
            }
        };

        let sheet_names = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Ok(());
        }

        // 方式1：主表主键为 string 类型 -> 自动生成 {Sheet}Keys 枚举
        if let Some(Ok(range)) = workbook.worksheet_range(&sheet_names[0]) {
            if let Err(e) =
                collect_main_sheet_enum(&sheet_names[0], &range, &file_name, enums, enum_specs)
            {
                warn_collected(format!("收集枚举时出错 {}: {}", file_name, e));
            }
        }

        // 方式2：Enum- 开头的附属 sheet
        if self.config.enum_output_folder.is_some() {
            for sheet_name in sheet_names.iter().skip(1) {
                if !sheet_name.starts_with(ENUM_SHEET_TAG) {
                    continue;
                }
                let range = match workbook.worksheet_range(sheet_name) {
                    Some(Ok(range)) => range,
                    _ => continue,
                };
                collect_enum_sheet(
                    sheet_name,
                    &range,
                    &file_name,
                    enums,
                    enum_specs,
                )?;
            }
        }

        Ok(())
    }

    /// 第二阶段：处理单个 Excel 文件的主表
    fn process_excel_file(
        &self,
        excel_path: &Path,
        file_sheet_map: &HashMap<String, String>,
        ctx: &ExportContext<'_>,
    ) -> AppResult<Option<WorksheetData>> {
        let file_name = file_name_of(excel_path);
        let mut workbook = match open_workbook_file(excel_path) {
            Ok(wb) => wb,
            Err(e) => {
                crate::log_file_parsing_failure!("打开失败: {} -> {}", green_filename(&file_name), e);
                return Ok(None);
            }
        };

        let sheet_names = workbook.sheet_names().to_vec();
        let main_sheet = match sheet_names.first() {
            Some(name) => name.clone(),
            None => {
                log::error!("{} 中没有工作表", green_filename(&file_name));
                return Ok(None);
            }
        };

        // 工作表命名冲突：两个 Excel 的主表同名
        if let Some((dup_file, _)) = file_sheet_map.iter().find(|(_, sheet)| **sheet == main_sheet)
        {
            return Err(AppError::sheet_name_conflict_error(
                main_sheet, dup_file, file_name,
            ));
        }

        let range = match workbook.worksheet_range(&main_sheet) {
            Some(Ok(range)) => range,
            Some(Err(e)) => {
                return Err(AppError::excel_file_corrupted_error(
                    excel_path.to_string_lossy(),
                    e.to_string(),
                ))
            }
            None => {
                log::error!("{} 主表不存在", green_filename(&file_name));
                return Ok(None);
            }
        };

        log_sep(&format!("开始 {}", green_filename(&file_name)));
        let mut ws = WorksheetData::new(&main_sheet, &range, Some(file_name))?;

        // 接口字段类型一致性检查
        check_interface_field_types(&ws.name, &ws.properties(), self.config.assume_yes)?;

        if let Some(folder) = &self.config.output_client_folder {
            ws.generate_json(Path::new(folder), ctx)?;
        }
        if let Some(folder) = &self.config.output_project_folder {
            ws.generate_json(Path::new(folder), ctx)?;
        }
        if let Some(folder) = &self.config.csfile_output_folder {
            ws.generate_script(&self.generator, &self.writer, Path::new(folder))?;
        }

        Ok(Some(ws))
    }

    /// 清理输出目录中本次未生成的陈旧文件（.meta 除外），删除前需用户确认
    fn cleanup_files(&self) {
        let mut stale: Vec<PathBuf> = Vec::new();
        for folder in self.config.output_folders() {
            let root = Path::new(folder);
            if !root.exists() {
                continue;
            }
            collect_stale_files(root, &self.writer, &mut stale);
        }

        if stale.is_empty() {
            log::info!("没有需要删除的文件");
            return;
        }

        log::warn!("以下文件未在本次生成中出现：");
        for f in &stale {
            log::warn!(" - {}", f.display());
        }
        if user_confirm("是否删除这些文件?(y/n): ", self.config.assume_yes) {
            crate::log_user_operation!("确认清理 {} 个陈旧文件", stale.len());
            for f in &stale {
                match std::fs::remove_file(f) {
                    Ok(_) => log::info!("删除: {}", f.display()),
                    Err(e) => log::error!("删除失败 {}: {}", f.display(), e),
                }
            }
        } else {
            warn_collected("已取消清理");
        }
    }

    /// 统计本次实际生成的 JSON 文件总体积
    fn total_json_bytes(&self) -> u64 {
        self.writer
            .created_files()
            .iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
            })
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }
}

/// 方式1：主表主键为 string 类型时，收集首列为 {Sheet}Keys 枚举
fn collect_main_sheet_enum(
    sheet_name: &str,
    range: &Range<DataType>,
    file_name: &str,
    enums: &mut EnumRegistry,
    enum_specs: &mut Vec<EnumSpec>,
) -> AppResult<()> {
    // 类型行（第3行）键列（B列）
    let type_row = read_row_values(range, 3);
    let key_type = match type_row.get(1).cloned().flatten() {
        Some(t) => t,
        None => return Ok(()),
    };
    let (kind, base) = parse_type_annotation(&key_type);
    if kind != TypeKind::Scalar || base.as_deref() != Some("string") {
        return Ok(());
    }

    let enum_type_name = format!("{}{}", sheet_name, ENUM_KEYS_SUFFIX);
    let remarks_row = read_row_values(range, 1);
    let key_remark = remarks_row.get(1).cloned().flatten();

    let mut spec = EnumSpec::new(&enum_type_name, CS_NAMESPACE, file_name);
    let mut idx_val = 0;
    for (_, row) in read_data_rows(range) {
        let val = match row.first().and_then(cell_to_string) {
            Some(v) => v,
            None => continue,
        };
        spec.members.push((val, idx_val));
        spec.remarks.push(key_remark.clone());
        idx_val += 1;
    }
    if spec.members.is_empty() {
        return Ok(());
    }

    // 验证枚举项名称格式
    let invalid: Vec<&str> = spec
        .members
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| !enums.validate_enum_item_name(n))
        .collect();
    if !invalid.is_empty() {
        return Err(AppError::export_error(format!(
            "枚举 {} (来自 {}) 包含不符合C#命名规范的枚举项: {:?}。枚举项必须以大写字母开头（大写驼峰式）",
            enum_type_name, file_name, invalid
        )));
    }

    enums.register_enum(&spec)?;
    enum_specs.push(spec);
    log::info!("收集枚举: {} (来自 {})", enum_type_name, file_name);
    Ok(())
}

/// 方式2：Enum- 开头的 sheet，按 (名称, 整数值, 注释) 行收集
fn collect_enum_sheet(
    sheet_name: &str,
    range: &Range<DataType>,
    file_name: &str,
    enums: &mut EnumRegistry,
    enum_specs: &mut Vec<EnumSpec>,
) -> AppResult<()> {
    let enum_type_name = sheet_name
        .strip_prefix(ENUM_SHEET_TAG)
        .unwrap_or(sheet_name)
        .to_string();
    let source = format!("{}/{}", file_name, sheet_name);
    let mut spec = EnumSpec::new(&enum_type_name, CS_NAMESPACE, &source);

    let height = range.end().map(|(r, _)| r + 1).unwrap_or(0);
    for row_idx in 1..height {
        let name = range
            .get_value((row_idx, 0))
            .and_then(cell_to_string);
        let value = range.get_value((row_idx, 1)).and_then(cell_to_string);
        let (name, value) = match (name, value) {
            (Some(n), Some(v)) => (n, v),
            _ => continue,
        };
        let value = match value.parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                warn_collected(format!("{} 枚举值非整数: {}={}", sheet_name, name, value));
                continue;
            }
        };
        let remark = range.get_value((row_idx, 2)).and_then(cell_to_string);
        spec.members.push((name, value));
        spec.remarks.push(remark);
    }

    if spec.members.is_empty() {
        return Ok(());
    }

    let invalid: Vec<&str> = spec
        .members
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| !enums.validate_enum_item_name(n))
        .collect();
    if !invalid.is_empty() {
        return Err(AppError::export_error(format!(
            "枚举 {} (来自 {}) 包含不符合C#命名规范的枚举项: {:?}。枚举项必须以大写字母开头（大写驼峰式）",
            enum_type_name, source, invalid
        )));
    }

    enums.register_enum(&spec)?;
    log::info!("收集枚举: {} (来自 {})", enum_type_name, source);
    enum_specs.push(spec);
    Ok(())
}

/// 输出目录检查：路径规范化、创建、可写性探测与磁盘空间下限
async fn check_output_dir(folder: &str) -> AppResult<()> {
    let folder_path = validate_path(folder, None)?;
    tokio::fs::create_dir_all(&folder_path)
        .await
        .map_err(|e| AppError::export_error(format!("无法创建输出目录: {} -> {}", folder, e)))?;

    // 可写性探测
    let probe = folder_path.join(".sheetease_probe");
    tokio::fs::write(&probe, b"probe")
        .await
        .map_err(|_| AppError::export_error(format!("输出目录不可写: {}", folder)))?;
    let _ = tokio::fs::remove_file(&probe).await;

    // 剩余空间检查（简单策略：至少 10MB 可用）
    if let Some(free) = free_disk_bytes(&folder_path) {
        if free < MIN_FREE_DISK_BYTES {
            return Err(AppError::export_error(format!(
                "输出目录磁盘空间不足 (<10MB): {}",
                folder
            )));
        }
    }
    Ok(())
}

#[cfg(unix)]
fn free_disk_bytes(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
fn free_disk_bytes(_path: &Path) -> Option<u64> {
    // Windows 下跳过磁盘空间检查
    None
}

/// 递归收集源目录下的全部 .xlsx 文件（跳过 Office 临时文件），按路径排序
fn collect_xlsx_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let name = file_name_of(&path);
            if name.starts_with("~$") {
                continue;
            }
            if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("xlsx"))
                .unwrap_or(false)
            {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// 递归收集目录下未出现在产出台账中的文件（.meta 除外）
fn collect_stale_files(root: &Path, writer: &OutputWriter, stale: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_stale_files(&path, writer, stale);
            continue;
        }
        if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("meta"))
            .unwrap_or(false)
        {
            continue;
        }
        if !writer.is_created(&path) {
            stale.push(path);
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

fn starts_with_uppercase(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}
