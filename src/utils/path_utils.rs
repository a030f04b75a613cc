//! 路径校验工具：防止输出路径逃逸与非法文件名
//!
//! 输出目录与生成文件名均来自配置或表名，这里统一做规范化与越界检查。

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// 验证并规范化路径，防止路径遍历
///
/// 指定 `base_dir` 时，规范化后的路径必须位于基础目录内，
/// 否则返回 `PathTraversalError`。
pub fn validate_path(path: &str, base_dir: Option<&Path>) -> AppResult<PathBuf> {
    let p = Path::new(path);
    let resolved = normalize(p);

    if let Some(base) = base_dir {
        let base_resolved = normalize(base);
        if !resolved.starts_with(&base_resolved) {
            return Err(AppError::path_traversal_error(
                resolved.to_string_lossy(),
                base_resolved.to_string_lossy(),
            ));
        }
    }

    Ok(resolved)
}

/// 逻辑规范化：消去 `.` 与 `..` 分量，不要求路径存在
///
/// `..` 越过根部时保留在结果中，由上层的前缀检查判定越界。
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 清理文件名，移除危险字符
///
/// 路径分隔符与 Windows 保留字符替换为下划线，
/// 去掉前后空格与点号；清理后为空视为无效。
pub fn sanitize_filename(filename: &str) -> AppResult<String> {
    if filename.is_empty() {
        return Err(AppError::invalid_path_error(filename, "文件名为空"));
    }

    let dangerous = ['/', '\\', '<', '>', ':', '"', '|', '?', '*'];
    let mut sanitized: String = filename
        .chars()
        .map(|c| if dangerous.contains(&c) { '_' } else { c })
        .collect();
    sanitized = sanitized.replace("..", "_");
    let sanitized = sanitized.trim_matches(|c| c == ' ' || c == '.').to_string();

    if sanitized.is_empty() {
        return Err(AppError::invalid_path_error(filename, "清理后的文件名为空"));
    }

    Ok(sanitized)
}
