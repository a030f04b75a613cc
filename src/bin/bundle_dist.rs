//! 发布打包入口
//!
//! 用法: bundle_dist [--onefile]
//! 将旧版 Python 发行版打包为独立可执行文件 SheetEase。
//! 打包工具缺失时退出码为 1，否则退出码继承自打包工具。

use sheetease_lib::dist::{run_bundle, SystemToolEnvironment};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = run_bundle(&SystemToolEnvironment, &args);
    std::process::exit(code);
}
