//! Excel 单元格读取
//!
//! 基于 calamine 的工作簿读取与表头/数据行提取。
//! 表头行（1~6行）从 A 列起按字符串读取；数据行从第7行、B 列起保留原始单元格。

use std::path::Path;

use calamine::{open_workbook, DataType, Range, Xlsx};

use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_config::DATA_START_ROW;

/// 打开一个 .xlsx 工作簿
pub fn open_workbook_file(path: &Path) -> AppResult<Xlsx<std::io::BufReader<std::fs::File>>> {
    open_workbook(path).map_err(|e: calamine::XlsxError| {
        AppError::excel_file_corrupted_error(path.to_string_lossy(), e.to_string())
    })
}

/// 将单元格转换为去除首尾空白的字符串；空单元格与错误单元格返回 None
///
/// 数值单元格统一格式化：整数值不带小数点（15.0 -> "15"）。
pub fn cell_to_string(cell: &DataType) -> Option<String> {
    let s = match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 9e15 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        DataType::Int(i) => format!("{}", i),
        DataType::Bool(b) => format!("{}", b),
        DataType::DateTime(f) => format!("{}", f),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// 读取指定表头行（1-based 行号）的所有单元格字符串
///
/// 从 A 列读到数据区右边界，尾部的连续空单元格被裁掉，
/// 保持每行各自的"有效长度"，由上层对齐到字段行列数。
pub fn read_row_values(range: &Range<DataType>, excel_row: usize) -> Vec<Option<String>> {
    let mut values = Vec::new();
    if excel_row == 0 {
        return values;
    }
    let row_idx = (excel_row - 1) as u32;
    let width = range.end().map(|(_, c)| c + 1).unwrap_or(0);

    for col in 0..width {
        let cell = range.get_value((row_idx, col));
        values.push(cell.and_then(cell_to_string));
    }

    // 裁掉尾部空列
    while matches!(values.last(), Some(None)) {
        values.pop();
    }
    values
}

/// 读取数据行：第 DATA_START_ROW 行起、B 列起的原始单元格
///
/// 全空的行被跳过（返回的行与 Excel 行号的对应关系由调用方
/// 通过 `(原行索引, 单元格)` 维护），这里保留行顺序并返回
/// (Excel 行号, 该行 B 列起的单元格) 列表。
pub fn read_data_rows(range: &Range<DataType>) -> Vec<(usize, Vec<DataType>)> {
    let mut rows = Vec::new();
    let (height, width) = match range.end() {
        Some((r, c)) => (r + 1, c + 1),
        None => return rows,
    };

    for row_idx in (DATA_START_ROW as u32 - 1)..height {
        let mut cells = Vec::new();
        for col in 1..width {
            let cell = range
                .get_value((row_idx, col))
                .cloned()
                .unwrap_or(DataType::Empty);
            cells.push(cell);
        }
        if cells.iter().all(|c| matches!(c, DataType::Empty)) {
            continue;
        }
        rows.push((row_idx as usize + 1, cells));
    }
    rows
}

/// 重复字段检测：字段行中出现两次以上的非空字段名视为错误
pub fn check_repeating_values(field_names: &[Option<String>]) -> AppResult<()> {
    use std::collections::HashMap;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in field_names.iter().flatten() {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }

    let duplicated: Vec<String> = counts
        .iter()
        .filter(|(_, &n)| n > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    if duplicated.is_empty() {
        Ok(())
    } else {
        Err(AppError::duplicate_field_error(duplicated))
    }
}
