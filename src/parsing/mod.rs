//! # 解析模块
//!
//! Excel 单元格读取、字段名前缀解析与单元格值的类型转换。

pub mod data_processing;
pub mod excel_processing;
pub mod field_parser;

pub use data_processing::{convert_to_type, ConvertCtx, CustomTypeRegistry};
pub use excel_processing::{cell_to_string, check_repeating_values, read_data_rows, read_row_values};
pub use field_parser::{
    extract_actual_field_name, parse_asset_prefix, parse_key_prefix, parse_ref_prefix, KeyPrefix,
};
