//! 枚举注册表：管理一次导表运行中收集到的所有枚举定义
//!
//! 第一阶段从各 Excel 收集枚举并注册，第二阶段数据转换时
//! 通过注册表把枚举项名称解析为枚举值。注册表由导出流程
//! 显式创建并传递，不使用全局状态。

use std::collections::HashMap;

use crate::models::EnumSpec;
use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_utils::{is_valid_csharp_identifier, is_valid_enum_member_name};

/// 枚举注册表
#[derive(Debug, Default)]
pub struct EnumRegistry {
    /// 枚举名 -> 枚举项（保持收集顺序）
    enums: HashMap<String, Vec<(String, i64)>>,
    /// 枚举名 -> 命名空间
    namespaces: HashMap<String, String>,
    /// 枚举名 -> 来源信息（用于错误提示）
    sources: HashMap<String, String>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个枚举
    ///
    /// 重复定义即使枚举项相同也不允许，错误信息包含两处来源。
    pub fn register_enum(&mut self, spec: &EnumSpec) -> AppResult<()> {
        if !is_valid_csharp_identifier(&spec.name) {
            return Err(AppError::export_error(format!(
                "枚举类型名称不符合C#命名规范: {}",
                spec.name
            )));
        }

        if let Some(existing) = self.enums.get(&spec.name) {
            let existing_source = self
                .sources
                .get(&spec.name)
                .cloned()
                .unwrap_or_else(|| "未知来源".to_string());
            let mut existing_items: Vec<&str> =
                existing.iter().map(|(n, _)| n.as_str()).collect();
            let mut new_items: Vec<&str> = spec.members.iter().map(|(n, _)| n.as_str()).collect();
            existing_items.sort();
            new_items.sort();

            if existing_items != new_items {
                return Err(AppError::export_error(format!(
                    "枚举 {} 重复定义，但枚举项不一致。已有定义（来源: {}）: {:?}，新定义（来源: {}）: {:?}",
                    spec.name, existing_source, existing_items, spec.source, new_items
                )));
            }
            return Err(AppError::export_error(format!(
                "枚举 {} 重复定义。已有定义（来源: {}），重复定义（来源: {}）。即使枚举项相同，也不允许在不同位置重复定义同一个枚举。",
                spec.name, existing_source, spec.source
            )));
        }

        self.enums.insert(spec.name.clone(), spec.members.clone());
        self.namespaces
            .insert(spec.name.clone(), spec.namespace.clone());
        self.sources.insert(spec.name.clone(), spec.source.clone());
        Ok(())
    }

    /// 检查枚举是否存在
    pub fn has_enum(&self, enum_name: &str) -> bool {
        self.enums.contains_key(enum_name)
    }

    /// 获取枚举的所有项（保持定义顺序）
    pub fn get_enum_items(&self, enum_name: &str) -> AppResult<&[(String, i64)]> {
        self.enums
            .get(enum_name)
            .map(|v| v.as_slice())
            .ok_or_else(|| AppError::export_error(format!("枚举 {} 未定义", enum_name)))
    }

    /// 获取枚举项对应的枚举值（区分大小写）
    pub fn get_enum_value(&self, enum_name: &str, item_name: &str) -> AppResult<i64> {
        let items = self.get_enum_items(enum_name)?;
        items
            .iter()
            .find(|(n, _)| n == item_name)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                let mut available: Vec<&str> = items.iter().map(|(n, _)| n.as_str()).collect();
                available.sort();
                AppError::export_error(format!(
                    "枚举 {} 中不存在枚举项 '{}'。可用的枚举项: {:?}",
                    enum_name, item_name, available
                ))
            })
    }

    /// 验证枚举项名称是否符合C#命名规范（大写驼峰式）
    pub fn validate_enum_item_name(&self, item_name: &str) -> bool {
        is_valid_enum_member_name(item_name)
    }

    /// 获取所有已注册的枚举名称（排序后）
    pub fn all_enum_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.enums.keys().cloned().collect();
        names.sort();
        names
    }

    /// 获取枚举的命名空间
    pub fn get_namespace(&self, enum_name: &str) -> String {
        self.namespaces
            .get(enum_name)
            .cloned()
            .unwrap_or_else(|| crate::utils::naming_config::CS_NAMESPACE.to_string())
    }
}
