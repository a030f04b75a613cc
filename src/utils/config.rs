use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_config::{
    JSON_ID_FIRST, JSON_SORT_KEYS, JSON_WARN_RECORD_BYTES, JSON_WARN_TOTAL_BYTES,
};

/// 环境变量：直接提供配置 JSON 字符串
pub const CONFIG_JSON_ENV: &str = "SHEETEASE_CONFIG_JSON";
/// 环境变量：指定配置文件路径
pub const CONFIG_PATH_ENV: &str = "SHEETEASE_CONFIG_PATH";
/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "sheet_config.json";

/// 提供给 serde 的默认值
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_warn_total_bytes() -> usize {
    JSON_WARN_TOTAL_BYTES
}

fn default_warn_record_bytes() -> usize {
    JSON_WARN_RECORD_BYTES
}

fn default_id_first() -> bool {
    JSON_ID_FIRST
}

fn default_sort_keys() -> bool {
    JSON_SORT_KEYS
}

/// 导表主配置结构
/// 包含一次导表运行所需的全部配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Excel 源目录（递归扫描 *.xlsx）
    pub source_folder: String,
    /// 客户端 JSON 输出目录
    pub output_client_folder: Option<String>,
    /// 工程 JSON 输出目录
    pub output_project_folder: Option<String>,
    /// C# 数据类输出目录
    pub csfile_output_folder: Option<String>,
    /// C# 枚举输出目录
    pub enum_output_folder: Option<String>,
    /// 仅在内容变化时写文件
    #[serde(default = "default_true")]
    pub diff_only: bool,
    /// 只走流程不落盘
    #[serde(default)]
    pub dry_run: bool,
    /// 导出后清理输出目录中的陈旧文件
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,
    /// 所有确认询问自动同意（非交互运行）
    #[serde(default)]
    pub assume_yes: bool,
    /// JSON 输出形态
    #[serde(default)]
    pub json: JsonOptions,
    /// 资源校验配置
    #[serde(default)]
    pub yooasset: YooAssetConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// JSON 输出形态配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOptions {
    /// 每条记录是否把 id 放在首位
    #[serde(default = "default_id_first")]
    pub id_first: bool,
    /// 顶层键是否排序（默认保持 Excel 行顺序）
    #[serde(default = "default_sort_keys")]
    pub sort_keys: bool,
    /// 单表 JSON 总大小告警阈值（字节）
    #[serde(default = "default_warn_total_bytes")]
    pub warn_total_bytes: usize,
    /// 单条记录序列化大小告警阈值（字节）
    #[serde(default = "default_warn_record_bytes")]
    pub warn_record_bytes: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            id_first: JSON_ID_FIRST,
            sort_keys: JSON_SORT_KEYS,
            warn_total_bytes: JSON_WARN_TOTAL_BYTES,
            warn_record_bytes: JSON_WARN_RECORD_BYTES,
        }
    }
}

/// YooAsset 资源校验配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YooAssetConfig {
    /// 收集设置文件路径（缺省时跳过 [Asset] 校验）
    pub collector_setting: Option<String>,
    /// 严格模式：资源缺失直接报错中断
    #[serde(default)]
    pub strict: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别 (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            source_folder: "ExcelFolder".to_string(),
            output_client_folder: Some("Output/Client".to_string()),
            output_project_folder: Some("Output/Project".to_string()),
            csfile_output_folder: Some("Output/Scripts".to_string()),
            enum_output_folder: Some("Output/Enums".to_string()),
            diff_only: true,
            dry_run: false,
            auto_cleanup: true,
            assume_yes: false,
            json: JsonOptions::default(),
            yooasset: YooAssetConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SheetConfig {
    /// 已配置的输出目录集合（客户端/工程/脚本/枚举），保持固定顺序
    pub fn output_folders(&self) -> Vec<&str> {
        [
            self.output_client_folder.as_deref(),
            self.output_project_folder.as_deref(),
            self.csfile_output_folder.as_deref(),
            self.enum_output_folder.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// 配置管理器
/// 负责加载、保存和管理导表配置
pub struct ConfigManager {
    config: SheetConfig,
    config_file_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_file_path: PathBuf) -> Self {
        Self {
            config: SheetConfig::default(),
            config_file_path,
        }
    }

    /// 从文件加载配置
    pub async fn load_from_file(&mut self) -> AppResult<()> {
        if !self.config_file_path.exists() {
            // 如果配置文件不存在，创建默认配置文件
            self.save_to_file().await?;
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&self.config_file_path)
            .await
            .map_err(|e| AppError::io_error(format!("读取配置文件失败: {}", e), e.kind().to_string()))?;

        self.config = serde_json::from_str(&content)
            .map_err(|e| AppError::configuration_error(format!("解析配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 将配置保存到文件
    pub async fn save_to_file(&self) -> AppResult<()> {
        // 确保目录存在
        if let Some(parent) = self.config_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await
                    .map_err(|e| AppError::io_error(format!("创建配置目录失败: {}", e), e.kind().to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| AppError::json_error(format!("序列化配置失败: {}", e)))?;

        tokio::fs::write(&self.config_file_path, content)
            .await
            .map_err(|e| AppError::io_error(format!("写入配置文件失败: {}", e), e.kind().to_string()))?;

        Ok(())
    }

    /// 从环境变量覆盖配置
    pub fn override_from_env(&mut self) {
        if let Ok(source) = std::env::var("SHEETEASE_SOURCE_FOLDER") {
            self.config.source_folder = source;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.config.logging.log_level = level;
        }
        if let Ok(dry) = std::env::var("SHEETEASE_DRY_RUN") {
            self.config.dry_run = dry == "1" || dry.to_lowercase() == "true";
        }
        if std::env::var(crate::utils::user_utils::ASSUME_YES_ENV)
            .map(|v| v == "1")
            .unwrap_or(false)
        {
            self.config.assume_yes = true;
        }
    }

    /// 验证配置的有效性
    pub fn validate_config(&self) -> AppResult<()> {
        if self.config.source_folder.trim().is_empty() {
            return Err(AppError::configuration_error("Excel源目录不能为空"));
        }

        if self.config.output_folders().is_empty() {
            return Err(AppError::configuration_error(
                "至少需要配置一个输出目录 (client/project/csfile/enum)",
            ));
        }

        // 验证日志级别
        let valid_log_levels = ["debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.log_level.as_str()) {
            return Err(AppError::configuration_error(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.config.logging.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// 获取配置的只读引用
    pub fn get_config(&self) -> &SheetConfig {
        &self.config
    }

    /// 获取配置的可变引用
    pub fn get_config_mut(&mut self) -> &mut SheetConfig {
        &mut self.config
    }
}

/// 按优先级解析并加载配置：
/// 1) 环境变量 SHEETEASE_CONFIG_JSON（直接提供JSON字符串）
/// 2) 环境变量 SHEETEASE_CONFIG_PATH（指定配置文件路径）
/// 3) 显式传入的路径（命令行 --config）
/// 4) 当前目录下的 sheet_config.json（缺失时创建默认文件）
pub async fn resolve_config(explicit_path: Option<&str>) -> AppResult<SheetConfig> {
    if let Ok(env_json) = std::env::var(CONFIG_JSON_ENV) {
        if !env_json.trim().is_empty() {
            let config: SheetConfig = serde_json::from_str(&env_json)
                .map_err(|e| AppError::configuration_error(format!("解析 {} 失败: {}", CONFIG_JSON_ENV, e)))?;
            return Ok(config);
        }
    }

    let path = if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
        PathBuf::from(env_path)
    } else if let Some(p) = explicit_path {
        PathBuf::from(p)
    } else {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    };

    let mut manager = ConfigManager::new(path);
    manager.load_from_file().await?;
    manager.override_from_env();
    manager.validate_config()?;
    Ok(manager.get_config().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_valid() {
        let manager = ConfigManager::new(PathBuf::from("sheet_config.json"));
        assert!(manager.validate_config().is_ok());
        let config = manager.get_config();
        assert!(config.diff_only);
        assert!(!config.dry_run);
        assert!(config.auto_cleanup);
        assert_eq!(config.output_folders().len(), 4);
    }

    #[test]
    fn test_validate_rejects_empty_source() {
        let mut manager = ConfigManager::new(PathBuf::from("sheet_config.json"));
        manager.get_config_mut().source_folder = "  ".to_string();
        assert!(manager.validate_config().is_err());
    }

    #[test]
    fn test_validate_rejects_no_outputs() {
        let mut manager = ConfigManager::new(PathBuf::from("sheet_config.json"));
        {
            let config = manager.get_config_mut();
            config.output_client_folder = None;
            config.output_project_folder = None;
            config.csfile_output_folder = None;
            config.enum_output_folder = None;
        }
        assert!(manager.validate_config().is_err());
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet_config.json");
        let mut manager = ConfigManager::new(path.clone());
        manager.load_from_file().await.unwrap();
        assert!(path.exists());

        // 再次加载应读取刚写入的默认配置
        let mut manager2 = ConfigManager::new(path);
        manager2.load_from_file().await.unwrap();
        assert_eq!(
            manager2.get_config().source_folder,
            SheetConfig::default().source_folder
        );
    }

    #[tokio::test]
    async fn test_load_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet_config.json");
        tokio::fs::write(
            &path,
            r#"{"source_folder": "Tables", "output_client_folder": "Out/Client"}"#,
        )
        .await
        .unwrap();

        let mut manager = ConfigManager::new(path);
        manager.load_from_file().await.unwrap();
        let config = manager.get_config();
        assert_eq!(config.source_folder, "Tables");
        assert_eq!(config.output_client_folder.as_deref(), Some("Out/Client"));
        assert!(config.diff_only);
        assert!(config.json.id_first);
        assert!(config.yooasset.collector_setting.is_none());
    }
}
