//! # 发布打包模块
//!
//! 将旧版 Python 发行版打包为独立可执行文件 SheetEase 的编排器。
//! 外部环境（工具查找、子进程执行）通过 `IToolEnvironment` 注入，
//! 测试中可替换为假实现。

pub mod bundler;

pub use bundler::{run_bundle, IToolEnvironment, SystemToolEnvironment};
