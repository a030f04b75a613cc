use anyhow::Result;

use sheetease_lib::core::ExportPipeline;
use sheetease_lib::logging::init_logging;
use sheetease_lib::utils::config::resolve_config;

/// 命令行参数（保持简单的手工解析，不引入额外框架）
struct CliArgs {
    config_path: Option<String>,
    dry_run: bool,
    full: bool,
    no_cleanup: bool,
    assume_yes: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut parsed = CliArgs {
        config_path: None,
        dry_run: false,
        full: false,
        no_cleanup: false,
        assume_yes: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dry-run" => parsed.dry_run = true,
            "--full" => parsed.full = true,
            "--no-cleanup" => parsed.no_cleanup = true,
            "--yes" => parsed.assume_yes = true,
            "--config" => {
                parsed.config_path = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("--config 需要一个路径参数"))?,
                );
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                anyhow::bail!("未知参数: {}（使用 --help 查看用法）", other);
            }
        }
    }
    Ok(parsed)
}

fn print_usage() {
    println!("SheetEase 导表工具");
    println!();
    println!("用法: sheetease [选项]");
    println!();
    println!("选项:");
    println!("  --config <路径>   指定配置文件（默认 ./sheet_config.json）");
    println!("  --dry-run         只走流程不写出文件");
    println!("  --full            全量写出（关闭 diff-only）");
    println!("  --no-cleanup      跳过输出目录清理");
    println!("  --yes             所有确认询问自动同意");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args()?;

    let mut config = resolve_config(cli.config_path.as_deref()).await?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.full {
        config.diff_only = false;
    }
    if cli.no_cleanup {
        config.auto_cleanup = false;
    }
    if cli.assume_yes {
        config.assume_yes = true;
    }

    init_logging(&config.logging.log_level);

    let mut pipeline = ExportPipeline::new(config)?;
    match pipeline.run().await {
        Ok(_) => Ok(()),
        Err(e) => {
            sheetease_lib::log_export_failure!("导表失败: {}", e);
            std::process::exit(1);
        }
    }
}
