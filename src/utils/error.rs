use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序统一错误类型
/// 用于封装导表过程中可能出现的各种错误，提供统一的错误处理机制
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// 通用错误，包含错误消息
    #[error("通用错误: {message}")]
    Generic { message: String },

    /// 输入/输出错误
    #[error("IO错误: {message} (Kind: {kind})")]
    IoError { message: String, kind: String },

    /// 导表业务错误
    ///
    /// **业务含义**: 表示导出流程中的业务级失败
    /// **错误类型**:
    /// - required 字段为空且无默认值
    /// - 枚举未定义或枚举项缺失
    /// - 主键无法解析为整数
    #[error("导表错误: {message}")]
    ExportError { message: String },

    /// 表头格式错误（1~6行缺失或列数不匹配）
    #[error("表头格式错误: {sheet} -> {reason}")]
    HeaderFormatError { sheet: String, reason: String },

    /// 发现重复字段
    #[error("发现重复字段: {fields:?}")]
    DuplicateFieldError { fields: Vec<String> },

    /// 非法枚举名
    #[error("非法枚举名 '{name}' (Excel 行: {row})")]
    InvalidEnumNameError { name: String, row: i64 },

    /// 主键重复
    #[error("主键重复: {key} (行 {row_a} 与 行 {row_b})")]
    DuplicatePrimaryKeyError { key: i64, row_a: usize, row_b: usize },

    /// 组合键溢出（超出 int32）
    #[error("组合键溢出: {combined} >= 2^31")]
    CompositeKeyOverflowError { combined: i64 },

    /// 工作表命名冲突（两个 Excel 的主表同名）
    #[error("工作表命名冲突: {sheet} 出现在 {file_a} 与 {file_b}")]
    SheetNameConflictError { sheet: String, file_a: String, file_b: String },

    /// 未注册的自定义类型
    #[error("未注册的自定义类型: {type_name}{location}")]
    UnknownCustomTypeError { type_name: String, location: String },

    /// 自定义类型解析失败
    #[error("自定义类型解析失败: {type_name} 原值:[{raw}] -> {reason}{location}")]
    CustomTypeParseError { type_name: String, raw: String, reason: String, location: String },

    /// 非法字段名（不符合 C# 命名规范）
    #[error("非法字段名: '{field}' 在表 '{sheet}' 列索引 {col_index} 不符合 C# 命名规范")]
    InvalidFieldNameError { field: String, col_index: usize, sheet: String },

    /// 写入文件失败
    #[error("写入文件失败: {path} -> {reason}")]
    WriteFileError { path: String, reason: String },

    /// Excel文件损坏或无法打开
    #[error("Excel文件损坏: {path} -> {reason}")]
    ExcelFileCorruptedError { path: String, reason: String },

    /// Sheet结构错误
    #[error("Sheet结构错误: {sheet} -> {reason}")]
    SheetStructureError { sheet: String, reason: String },

    /// 数据验证错误
    #[error("验证错误: {message}")]
    ValidationError { message: String },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    ConfigurationError { message: String },

    /// JSON序列化/反序列化错误
    #[error("JSON序列化/反序列化错误: {message}")]
    JsonError { message: String },

    /// 模板引擎错误
    #[error("模板引擎错误: {message}")]
    TemplateError { message: String },

    /// 路径遍历检测
    #[error("路径遍历检测: {path} (基础目录: {base_dir})")]
    PathTraversalError { path: String, base_dir: String },

    /// 无效路径
    #[error("无效路径: {path} -> {reason}")]
    InvalidPathError { path: String, reason: String },

    /// 外部打包工具未找到
    #[error("外部工具未找到: {tool}")]
    ToolNotFoundError { tool: String },

    /// 用户取消操作
    #[error("用户取消操作: {message}")]
    UserCancelledError { message: String },
}

impl AppError {
    /// 创建通用错误
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// 创建IO错误
    pub fn io_error(message: impl Into<String>, kind_str: impl Into<String>) -> Self {
        Self::IoError {
            message: message.into(),
            kind: kind_str.into(),
        }
    }

    /// 创建导表业务错误
    pub fn export_error(message: impl Into<String>) -> Self {
        Self::ExportError {
            message: message.into(),
        }
    }

    /// 创建表头格式错误
    pub fn header_format_error(sheet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HeaderFormatError {
            sheet: sheet.into(),
            reason: reason.into(),
        }
    }

    /// 创建重复字段错误（字段名在消息中排序输出，便于对照）
    pub fn duplicate_field_error(mut fields: Vec<String>) -> Self {
        fields.sort();
        Self::DuplicateFieldError { fields }
    }

    /// 创建非法枚举名错误
    pub fn invalid_enum_name_error(name: impl Into<String>, row: i64) -> Self {
        Self::InvalidEnumNameError {
            name: name.into(),
            row,
        }
    }

    /// 创建主键重复错误
    pub fn duplicate_primary_key_error(key: i64, row_a: usize, row_b: usize) -> Self {
        Self::DuplicatePrimaryKeyError { key, row_a, row_b }
    }

    /// 创建组合键溢出错误
    pub fn composite_key_overflow_error(combined: i64) -> Self {
        Self::CompositeKeyOverflowError { combined }
    }

    /// 创建工作表命名冲突错误
    pub fn sheet_name_conflict_error(
        sheet: impl Into<String>,
        file_a: impl Into<String>,
        file_b: impl Into<String>,
    ) -> Self {
        Self::SheetNameConflictError {
            sheet: sheet.into(),
            file_a: file_a.into(),
            file_b: file_b.into(),
        }
    }

    /// 创建未注册自定义类型错误
    pub fn unknown_custom_type_error(
        type_name: impl Into<String>,
        field: Option<&str>,
        sheet: Option<&str>,
    ) -> Self {
        Self::UnknownCustomTypeError {
            type_name: type_name.into(),
            location: format_location(field, sheet),
        }
    }

    /// 创建自定义类型解析失败错误
    pub fn custom_type_parse_error(
        type_name: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
        field: Option<&str>,
        sheet: Option<&str>,
    ) -> Self {
        Self::CustomTypeParseError {
            type_name: type_name.into(),
            raw: raw.into(),
            reason: reason.into(),
            location: format_location(field, sheet),
        }
    }

    /// 创建非法字段名错误
    pub fn invalid_field_name_error(
        field: impl Into<String>,
        col_index: usize,
        sheet: impl Into<String>,
    ) -> Self {
        Self::InvalidFieldNameError {
            field: field.into(),
            col_index,
            sheet: sheet.into(),
        }
    }

    /// 创建写文件失败错误
    pub fn write_file_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFileError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 创建Excel文件损坏错误
    pub fn excel_file_corrupted_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExcelFileCorruptedError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 创建Sheet结构错误
    pub fn sheet_structure_error(sheet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SheetStructureError {
            sheet: sheet.into(),
            reason: reason.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// 创建JSON序列化错误
    pub fn json_error(message: impl Into<String>) -> Self {
        Self::JsonError {
            message: message.into(),
        }
    }

    /// 创建模板引擎错误
    pub fn template_error(message: impl Into<String>) -> Self {
        Self::TemplateError {
            message: message.into(),
        }
    }

    /// 创建路径遍历错误
    pub fn path_traversal_error(path: impl Into<String>, base_dir: impl Into<String>) -> Self {
        Self::PathTraversalError {
            path: path.into(),
            base_dir: base_dir.into(),
        }
    }

    /// 创建无效路径错误
    pub fn invalid_path_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPathError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 创建工具未找到错误
    pub fn tool_not_found_error(tool: impl Into<String>) -> Self {
        Self::ToolNotFoundError { tool: tool.into() }
    }

    /// 创建用户取消错误
    pub fn user_cancelled_error(message: impl Into<String>) -> Self {
        Self::UserCancelledError {
            message: message.into(),
        }
    }

    /// 获取错误的简短描述
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Generic { .. } => "GENERIC",
            AppError::IoError { .. } => "IO_ERROR",
            AppError::ExportError { .. } => "EXPORT_ERROR",
            AppError::HeaderFormatError { .. } => "HEADER_FORMAT_ERROR",
            AppError::DuplicateFieldError { .. } => "DUPLICATE_FIELD_ERROR",
            AppError::InvalidEnumNameError { .. } => "INVALID_ENUM_NAME_ERROR",
            AppError::DuplicatePrimaryKeyError { .. } => "DUPLICATE_PRIMARY_KEY_ERROR",
            AppError::CompositeKeyOverflowError { .. } => "COMPOSITE_KEY_OVERFLOW_ERROR",
            AppError::SheetNameConflictError { .. } => "SHEET_NAME_CONFLICT_ERROR",
            AppError::UnknownCustomTypeError { .. } => "UNKNOWN_CUSTOM_TYPE_ERROR",
            AppError::CustomTypeParseError { .. } => "CUSTOM_TYPE_PARSE_ERROR",
            AppError::InvalidFieldNameError { .. } => "INVALID_FIELD_NAME_ERROR",
            AppError::WriteFileError { .. } => "WRITE_FILE_ERROR",
            AppError::ExcelFileCorruptedError { .. } => "EXCEL_FILE_CORRUPTED_ERROR",
            AppError::SheetStructureError { .. } => "SHEET_STRUCTURE_ERROR",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AppError::JsonError { .. } => "JSON_ERROR",
            AppError::TemplateError { .. } => "TEMPLATE_ERROR",
            AppError::PathTraversalError { .. } => "PATH_TRAVERSAL_ERROR",
            AppError::InvalidPathError { .. } => "INVALID_PATH_ERROR",
            AppError::ToolNotFoundError { .. } => "TOOL_NOT_FOUND_ERROR",
            AppError::UserCancelledError { .. } => "USER_CANCELLED_ERROR",
        }
    }
}

/// 统一的位置后缀格式：" (字段:xxx, 表:yyy)"，两者都缺省时为空串
fn format_location(field: Option<&str>, sheet: Option<&str>) -> String {
    let mut loc = Vec::new();
    if let Some(f) = field {
        loc.push(format!("字段:{}", f));
    }
    if let Some(s) = sheet {
        loc.push(format!("表:{}", s));
    }
    if loc.is_empty() {
        String::new()
    } else {
        format!(" ({})", loc.join(", "))
    }
}

/// 标准 I/O 错误到 AppError 的转换
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError { message: err.to_string(), kind: format!("{:?}", err.kind()) }
    }
}

/// serde_json 错误到 AppError 的转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError { message: err.to_string() }
    }
}

/// tera 模板错误到 AppError 的转换
impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::TemplateError { message: err.to_string() }
    }
}

/// 字符串错误到 AppError 的转换（通用错误）
impl From<String> for AppError {
    fn from(err_msg: String) -> Self {
        Self::Generic { message: err_msg }
    }
}

/// &str 错误到 AppError 的转换（通用错误）
impl From<&str> for AppError {
    fn from(err_msg: &str) -> Self {
        Self::Generic { message: err_msg.to_string() }
    }
}

/// 应用程序结果类型别名
/// 简化错误处理的类型定义
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_display() {
        let err = AppError::export_error("测试错误");
        assert_eq!(err.to_string(), "导表错误: 测试错误");
        assert_eq!(err.error_code(), "EXPORT_ERROR");
    }

    #[test]
    fn test_duplicate_primary_key_error() {
        let err = AppError::duplicate_primary_key_error(123, 5, 10);
        let msg = err.to_string();
        assert!(msg.contains("主键重复"));
        assert!(msg.contains("123"));
        assert!(msg.contains("行 5"));
        assert!(msg.contains("行 10"));
    }

    #[test]
    fn test_composite_key_overflow_error() {
        let err = AppError::composite_key_overflow_error(2147483648);
        assert!(err.to_string().contains("组合键溢出"));
        assert!(err.to_string().contains("2147483648"));
    }

    #[test]
    fn test_unknown_custom_type_location_suffix() {
        let err = AppError::unknown_custom_type_error("Foo.Bar", Some("icon"), Some("Item"));
        let msg = err.to_string();
        assert!(msg.contains("Foo.Bar"));
        assert!(msg.contains("字段:icon"));
        assert!(msg.contains("表:Item"));

        let bare = AppError::unknown_custom_type_error("Foo.Bar", None, None);
        assert_eq!(bare.to_string(), "未注册的自定义类型: Foo.Bar");
    }

    #[test]
    fn test_path_traversal_error() {
        let err = AppError::path_traversal_error("../../etc/passwd", "/safe/dir");
        assert!(err.to_string().contains("路径遍历检测"));
        assert!(err.to_string().contains("../../etc/passwd"));
        assert!(err.to_string().contains("/safe/dir"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: AppError = io_err.into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(err.to_string().contains("no such file"));
    }
}
