//! # 日志记录模块 (Logging Module)
//!
//! ## 业务说明
//! 导表是批处理流程，日志就是它的用户界面：
//! 阶段分隔线、绿色高亮的文件名、以及运行结束前统一输出的警告汇总，
//! 让一次几百张表的导出结果可以被快速浏览。
//!
//! ## 日志策略
//! - **即时输出**: 所有 info/warn/error 实时打印
//! - **警告汇总**: 警告同时收集到全局列表，结束前统一再输出一次
//! - **级别控制**: 通过配置或 RUST_LOG 环境变量调整

use once_cell::sync::Lazy;
use std::io::Write;
use std::sync::Mutex;

/// 运行期收集的全部警告，结束前统一输出
static WARN_SUMMARY: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// 初始化日志系统
///
/// 优先使用 RUST_LOG 环境变量，其次使用配置的级别。
/// 重复初始化（如测试中）静默忽略。
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}

/// 打印阶段分隔线
pub fn log_sep(title: &str) {
    log::info!("———————— {} ————————", title);
}

/// 文件名绿色高亮（ANSI），便于在大量日志中定位当前文件
pub fn green_filename(name: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", name)
}

/// 记录一条警告：实时打印并加入最终汇总
pub fn warn_collected(msg: impl Into<String>) {
    let msg = msg.into();
    log::warn!("{}", msg);
    if let Ok(mut summary) = WARN_SUMMARY.lock() {
        summary.push(msg);
    }
}

/// 仅加入汇总，不实时打印（用于已经以其它方式提示过的警告）
pub fn record_warning(msg: impl Into<String>) {
    if let Ok(mut summary) = WARN_SUMMARY.lock() {
        summary.push(msg.into());
    }
}

/// 输出并清空警告汇总
///
/// 没有收集到警告时不输出任何内容。
pub fn flush_warning_summary(title: &str) {
    let warnings: Vec<String> = match WARN_SUMMARY.lock() {
        Ok(mut summary) => summary.drain(..).collect(),
        Err(_) => return,
    };
    if warnings.is_empty() {
        return;
    }
    log::warn!("{}", title);
    for w in &warnings {
        log::warn!(" - {}", w);
    }
}

/// 测试辅助：清空警告汇总
pub fn clear_warning_summary() {
    if let Ok(mut summary) = WARN_SUMMARY.lock() {
        summary.clear();
    }
}

/// 当前已收集的警告数量
pub fn warning_count() -> usize {
    WARN_SUMMARY.lock().map(|s| s.len()).unwrap_or(0)
}

/// 便捷日志宏 - 记录核心问题日志

/// 记录文件解析失败日志
#[macro_export]
macro_rules! log_file_parsing_failure {
    ($msg:expr) => {
        log::error!("[文件解析失败] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::error!("[文件解析失败] {}", format!($msg, $($arg)*));
    };
}

/// 记录导出失败日志
#[macro_export]
macro_rules! log_export_failure {
    ($msg:expr) => {
        log::error!("[导出失败] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::error!("[导出失败] {}", format!($msg, $($arg)*));
    };
}

/// 记录用户操作日志
#[macro_export]
macro_rules! log_user_operation {
    ($msg:expr) => {
        log::info!("[用户操作] {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        log::info!("[用户操作] {}", format!($msg, $($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_green_filename_wraps_ansi() {
        let s = green_filename("Item.xlsx");
        assert!(s.starts_with("\x1b[32m"));
        assert!(s.contains("Item.xlsx"));
        assert!(s.ends_with("\x1b[0m"));
    }

    #[test]
    fn test_warning_summary_collects_and_flushes() {
        // 其它并发测试也可能写入全局汇总，这里只做下界断言
        record_warning("警告一");
        record_warning("警告二");
        assert!(warning_count() >= 2);
        flush_warning_summary("汇总:");
    }
}
