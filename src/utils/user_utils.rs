//! 用户交互工具：统一的确认入口
//!
//! 清理阶段与接口类型告警都需要用户确认后才继续。
//! 非交互环境（CI、定时任务）通过 assume-yes 跳过询问。

use std::io::{self, BufRead, Write};

/// 环境变量：设为 "1" 时所有确认视为同意
pub const ASSUME_YES_ENV: &str = "SHEETEASE_ASSUME_YES";

/// 统一的用户确认函数：打印消息后读取标准输入
///
/// 返回 true 表示继续，false 表示取消。
/// `assume_yes` 为 true 或环境变量 SHEETEASE_ASSUME_YES=1 时直接同意并记录日志。
pub fn user_confirm(msg: &str, assume_yes: bool) -> bool {
    if assume_yes || std::env::var(ASSUME_YES_ENV).map(|v| v == "1").unwrap_or(false) {
        log::info!("[用户确认] 已启用 assume-yes，自动同意: {}", msg);
        return true;
    }

    println!("{}", msg);
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => parse_answer(&line),
        Err(_) => false,
    }
}

/// 解析用户输入：y / yes（不区分大小写）为同意
fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
