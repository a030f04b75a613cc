//! 打包编排器
//!
//! 检查 pyinstaller 是否可用，装配固定的打包参数（隐藏导入、
//! 子模块收集、运行时数据目录内嵌），按首个命令行参数选择
//! 单文件/目录输出模式，然后一次性阻塞调用打包工具。
//! 不做重试，不做部分失败处理，打包工具的退出码原样向上传递。

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::utils::error::{AppError, AppResult};

/// 外部打包工具名
pub const PACKAGING_TOOL: &str = "pyinstaller";

/// 产物名称
pub const OUTPUT_NAME: &str = "SheetEase";

/// 入口脚本路径
pub const ENTRY_POINT: &str = "ExcelExportTool/export_all.py";

/// 单文件模式参数
pub const ONEFILE_FLAG: &str = "--onefile";

/// 需要整体收集的包
pub const COLLECT_SUBMODULES: &[&str] = &["ExcelExportTool"];

/// 动态导入导致静态分析收集不到的模块，需显式声明
pub const HIDDEN_IMPORTS: &[&str] = &[
    "ExcelExportTool.core.export_process",
    "ExcelExportTool.core.worksheet_data",
    "ExcelExportTool.generation.cs_generation",
    "ExcelExportTool.generation.enum_registry",
    "ExcelExportTool.parsing.data_processing",
    "ExcelExportTool.parsing.excel_processing",
    "ExcelExportTool.parsing.field_parser",
];

/// 内嵌为运行时数据的目录（源;目标），仅在目录存在时附带。
/// ProjectFolder 供打包后的程序做接口/类型检查，按原样内嵌。
pub const DATA_DIRS: &[(&str, &str)] = &[
    ("ProjectFolder", "ProjectFolder"),
    ("ExcelExportTool/config", "config"),
];

/// 工具缺失时的诊断信息
pub const MISSING_TOOL_MESSAGE: &str =
    "错误: pyinstaller not found，请先执行 `pip install pyinstaller` 安装后重试";

/// 打包环境接口：工具查找与子进程执行
///
/// 打包流程对环境的全部依赖都经过这里，测试用假实现替换。
#[cfg_attr(test, mockall::automock)]
pub trait IToolEnvironment {
    /// 在搜索路径上定位工具，找不到返回 None
    fn locate_tool(&self, name: &str) -> Option<PathBuf>;

    /// 判断相对目录是否存在（数据目录按存在与否可选内嵌）
    fn dir_exists(&self, path: &str) -> bool;

    /// 阻塞执行工具并返回退出码
    fn run_tool(&self, program: &Path, args: &[String]) -> AppResult<i32>;
}

/// 真实系统环境实现
pub struct SystemToolEnvironment;

impl IToolEnvironment for SystemToolEnvironment {
    fn locate_tool(&self, name: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            // Windows 下工具带 .exe 后缀
            let candidate_exe = dir.join(format!("{}.exe", name));
            if candidate_exe.is_file() {
                return Some(candidate_exe);
            }
        }
        None
    }

    fn dir_exists(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn run_tool(&self, program: &Path, args: &[String]) -> AppResult<i32> {
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| AppError::io_error(format!("启动 {} 失败: {}", program.display(), e), e.kind().to_string()))?;
        // 被信号终止等无退出码的情况按失败处理
        Ok(status.code().unwrap_or(1))
    }
}

/// 装配打包参数（顺序固定）
pub fn assemble_args(onefile: bool, env: &dyn IToolEnvironment) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--noconsole".to_string(),
        "--clean".to_string(),
        "--noconfirm".to_string(),
    ];

    for package in COLLECT_SUBMODULES {
        args.push("--collect-submodules".to_string());
        args.push((*package).to_string());
    }
    for module in HIDDEN_IMPORTS {
        args.push("--hidden-import".to_string());
        args.push((*module).to_string());
    }
    for (source, dest) in DATA_DIRS {
        if env.dir_exists(source) {
            args.push("--add-data".to_string());
            args.push(format!("{};{}", source, dest));
        }
    }

    if onefile {
        args.push(ONEFILE_FLAG.to_string());
    }

    args.push("--name".to_string());
    args.push(OUTPUT_NAME.to_string());
    args.push(ENTRY_POINT.to_string());
    args
}

/// 执行打包流程，返回进程退出码
///
/// 参数约定：零个或一个参数，首个参数为 `--onefile` 时选择单文件模式，
/// 其它取值或缺省为目录模式。工具缺失时输出诊断并返回 1。
pub fn run_bundle(env: &dyn IToolEnvironment, cli_args: &[String]) -> i32 {
    let tool = match env.locate_tool(PACKAGING_TOOL) {
        Some(tool) => tool,
        None => {
            println!("{}", MISSING_TOOL_MESSAGE);
            return 1;
        }
    };

    let onefile = cli_args
        .first()
        .map(|arg| arg == ONEFILE_FLAG)
        .unwrap_or(false);
    let args = assemble_args(onefile, env);

    println!("打包命令: {} {}", tool.display(), args.join(" "));
    match env.run_tool(&tool, &args) {
        Ok(0) => {
            println!(
                "打包完成: {} ({})",
                OUTPUT_NAME,
                if onefile { "单文件模式" } else { "目录模式" }
            );
            0
        }
        // 打包工具自身的失败不拦截不翻译，退出码原样传递
        Ok(code) => code,
        Err(e) => {
            println!("打包工具执行失败: {}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_tool() -> MockIToolEnvironment {
        let mut env = MockIToolEnvironment::new();
        env.expect_locate_tool()
            .returning(|_| Some(PathBuf::from("/usr/bin/pyinstaller")));
        env.expect_dir_exists().returning(|_| true);
        env
    }

    #[test]
    fn test_missing_tool_exits_with_1() {
        let mut env = MockIToolEnvironment::new();
        env.expect_locate_tool().returning(|_| None);
        // 工具缺失时不应调用 run_tool
        env.expect_run_tool().never();

        let code = run_bundle(&env, &[]);
        assert_eq!(code, 1);
        assert!(MISSING_TOOL_MESSAGE.contains("pyinstaller not found"));
    }

    #[test]
    fn test_onefile_argument_selects_onefile_mode() {
        let mut env = env_with_tool();
        env.expect_run_tool()
            .withf(|program, args| {
                program == Path::new("/usr/bin/pyinstaller")
                    && args.contains(&"--onefile".to_string())
                    && args.windows(2).any(|w| w[0] == "--name" && w[1] == "SheetEase")
            })
            .returning(|_, _| Ok(0));

        let code = run_bundle(&env, &["--onefile".to_string()]);
        assert_eq!(code, 0);
    }

    #[test]
    fn test_default_mode_omits_onefile() {
        let mut env = env_with_tool();
        env.expect_run_tool()
            .withf(|_, args| {
                !args.contains(&"--onefile".to_string())
                    && args.contains(&"--clean".to_string())
                    && args.contains(&"--noconfirm".to_string())
                    && args.contains(&"--noconsole".to_string())
                    && args.windows(2).any(|w| w[0] == "--name" && w[1] == "SheetEase")
                    && args.last() == Some(&ENTRY_POINT.to_string())
            })
            .returning(|_, _| Ok(0));

        let code = run_bundle(&env, &[]);
        assert_eq!(code, 0);
    }

    #[test]
    fn test_unknown_argument_falls_back_to_default_mode() {
        let mut env = env_with_tool();
        env.expect_run_tool()
            .withf(|_, args| !args.contains(&"--onefile".to_string()))
            .returning(|_, _| Ok(0));

        let code = run_bundle(&env, &["--whatever".to_string()]);
        assert_eq!(code, 0);
    }

    #[test]
    fn test_tool_failure_propagates_exit_code() {
        let mut env = env_with_tool();
        env.expect_run_tool().returning(|_, _| Ok(3));
        assert_eq!(run_bundle(&env, &[]), 3);

        let mut env = env_with_tool();
        env.expect_run_tool()
            .returning(|_, _| Err(AppError::io_error("spawn失败", "NotFound")));
        assert_eq!(run_bundle(&env, &[]), 1);
    }

    #[test]
    fn test_assemble_args_fixed_flags_and_data_dirs() {
        let mut env = MockIToolEnvironment::new();
        // 仅 ProjectFolder 存在时只内嵌一个数据目录
        env.expect_dir_exists()
            .returning(|path| path == "ProjectFolder");

        let args = assemble_args(false, &env);
        assert_eq!(&args[0..3], &["--noconsole", "--clean", "--noconfirm"]);
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--collect-submodules" && w[1] == "ExcelExportTool"));
        for module in HIDDEN_IMPORTS {
            assert!(args
                .windows(2)
                .any(|w| w[0] == "--hidden-import" && w[1] == *module));
        }
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--add-data" && w[1] == "ProjectFolder;ProjectFolder"));
        assert!(!args.iter().any(|a| a.contains("ExcelExportTool/config")));
    }

    #[test]
    fn test_assemble_args_idempotent() {
        let env1 = {
            let mut env = MockIToolEnvironment::new();
            env.expect_dir_exists().returning(|_| true);
            env
        };
        let env2 = {
            let mut env = MockIToolEnvironment::new();
            env.expect_dir_exists().returning(|_| true);
            env
        };
        assert_eq!(assemble_args(true, &env1), assemble_args(true, &env2));
    }
}
