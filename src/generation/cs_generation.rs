//! C# 脚本生成与输出写入
//!
//! 负责生成数据类文件与枚举文件，所有落盘都经过 `OutputWriter`：
//! - dry-run 模式只记录不写入
//! - diff-only 模式内容未变化时跳过写入
//! - 记录本次产出的全部文件路径，供清理阶段比对

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tera::{Context, Tera};

use crate::models::{EnumSpec, KeyStrategy};
use crate::utils::error::{AppError, AppResult};
use crate::utils::naming_config::{
    CS_FILE_PATTERN, ENUM_FILE_PATTERN, ENUM_KEYS_SUFFIX, MULTIPLIER,
};
use crate::utils::path_utils::sanitize_filename;

/// 数据类模板：一个类型化的行类 + 一个按主键策略取数的静态表类
const DATA_CLASS_TEMPLATE: &str = r#"//------------------------------------------------------------------------------
// <auto-generated>
//     此代码由 SheetEase 导表工具生成，修改将在下次导表时被覆盖。
//     来源表: {{ sheet }}
// </auto-generated>
//------------------------------------------------------------------------------
using System.Collections.Generic;

namespace {{ namespace }}
{
    [System.Serializable]
    public class {{ sheet }}Info
    {
        /// <summary>{{ id_remark }}</summary>
        public int id;
{% for field in fields %}{% if field.remark %}        /// <summary>{{ field.remark }}</summary>
{% endif %}        public {{ field.cs_type }} {{ field.name }};
{% endfor %}    }

    public static class {{ sheet }}Table
    {
        public static readonly Dictionary<int, {{ sheet }}Info> Data = new Dictionary<int, {{ sheet }}Info>();

        public static {{ sheet }}Info Get(int id)
        {
            Data.TryGetValue(id, out var info);
            return info;
        }
{% if key_kind == "composite" %}
        public const int CombineMultiplier = {{ multiplier }};

        /// <summary>组合键取数：combined = {{ key1 }} * CombineMultiplier + {{ key2 }}</summary>
        public static {{ sheet }}Info Get(int {{ key1 }}, int {{ key2 }})
        {
            return Get({{ key1 }} * CombineMultiplier + {{ key2 }});
        }
{% elif key_kind == "enum" %}
        public static {{ sheet }}Info Get({{ enum_keys_name }} key)
        {
            return Get((int)key);
        }
{% endif %}    }
}
"#;

/// 枚举文件模板
const ENUM_FILE_TEMPLATE: &str = r#"//------------------------------------------------------------------------------
// <auto-generated>
//     此代码由 SheetEase 导表工具生成，修改将在下次导表时被覆盖。
//     来源: {{ source }}
// </auto-generated>
//------------------------------------------------------------------------------
namespace {{ namespace }}
{
    public enum {{ name }}
    {
{% for member in members %}{% if member.remark %}        /// <summary>{{ member.remark }}</summary>
{% endif %}        {{ member.name }} = {{ member.value }},
{% endfor %}    }
}
"#;

/// 输出写入器：统一落盘入口与产出台账
pub struct OutputWriter {
    /// 仅在内容变化时写文件
    diff_only: bool,
    /// 只走流程不落盘
    dry_run: bool,
    /// 本次运行产出的文件（绝对路径）
    created: Mutex<Vec<PathBuf>>,
}

impl OutputWriter {
    pub fn new(diff_only: bool, dry_run: bool) -> Self {
        Self {
            diff_only,
            dry_run,
            created: Mutex::new(Vec::new()),
        }
    }

    /// 写入文件内容
    ///
    /// 无论实际是否落盘（dry-run/diff 跳过），路径都会计入台账，
    /// 清理阶段据此识别陈旧文件。
    pub fn write_to_file(&self, content: &str, path: &Path) -> AppResult<()> {
        self.record(path);

        if self.dry_run {
            log::info!("[dry-run] 跳过写入: {}", path.display());
            return Ok(());
        }

        if self.diff_only && path.exists() {
            if let Ok(existing) = std::fs::read(path) {
                if existing == content.as_bytes() {
                    log::debug!("内容未变化，跳过写入: {}", path.display());
                    return Ok(());
                }
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::write_file_error(path.to_string_lossy(), e.to_string())
                })?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| AppError::write_file_error(path.to_string_lossy(), e.to_string()))?;
        log::debug!("写入: {}", path.display());
        Ok(())
    }

    /// 本次运行产出的全部文件路径（绝对化）
    pub fn created_files(&self) -> Vec<PathBuf> {
        self.created
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// 判断路径是否在产出台账中
    pub fn is_created(&self, path: &Path) -> bool {
        let abs = absolutize(path);
        self.created
            .lock()
            .map(|c| c.contains(&abs))
            .unwrap_or(false)
    }

    fn record(&self, path: &Path) {
        let abs = absolutize(path);
        if let Ok(mut created) = self.created.lock() {
            if !created.contains(&abs) {
                created.push(abs);
            }
        }
    }
}

/// 绝对化并逻辑规范化路径（不要求路径存在）
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    // 消去 . 与 .. 分量，保证台账内路径可比较
    use std::path::Component;
    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 模板上下文：数据类字段
#[derive(Serialize)]
struct FieldCtx {
    name: String,
    cs_type: String,
    remark: String,
}

/// 模板上下文：枚举项
#[derive(Serialize)]
struct MemberCtx {
    name: String,
    value: i64,
    remark: String,
}

/// C# 脚本生成器
pub struct ScriptGenerator {
    template_engine: Tera,
}

impl ScriptGenerator {
    /// 创建生成器并注册内置模板
    pub fn new() -> AppResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("data_class", DATA_CLASS_TEMPLATE)
            .map_err(|e| AppError::template_error(format!("注册数据类模板失败: {}", e)))?;
        tera.add_raw_template("enum_file", ENUM_FILE_TEMPLATE)
            .map_err(|e| AppError::template_error(format!("注册枚举模板失败: {}", e)))?;
        Ok(Self {
            template_engine: tera,
        })
    }

    /// 生成数据类文件 {Sheet}Info.cs
    ///
    /// `props` 为有效字段的 (真实字段名, C#类型)，保持 Excel 列顺序；
    /// `remarks` 为字段 -> 注释。首个字段即主键列，id 属性单独生成。
    pub fn generate_script_file(
        &self,
        writer: &OutputWriter,
        sheet_name: &str,
        namespace: &str,
        props: &[(String, String)],
        remarks: &HashMap<String, String>,
        key: &KeyStrategy,
        output_folder: &Path,
    ) -> AppResult<()> {
        // id 属性固定生成，键列本身命名为 id 时不重复声明
        let fields: Vec<FieldCtx> = props
            .iter()
            .filter(|(name, _)| name != "id")
            .map(|(name, cs_type)| FieldCtx {
                name: name.clone(),
                cs_type: cs_type.clone(),
                remark: remarks.get(name).cloned().unwrap_or_default(),
            })
            .collect();
        let id_remark = remarks
            .get("id")
            .cloned()
            .unwrap_or_else(|| "记录主键".to_string());

        let mut context = Context::new();
        context.insert("sheet", sheet_name);
        context.insert("id_remark", &id_remark);
        context.insert("namespace", namespace);
        context.insert("fields", &fields);
        context.insert("multiplier", &MULTIPLIER);
        context.insert(
            "enum_keys_name",
            &format!("{}{}", sheet_name, ENUM_KEYS_SUFFIX),
        );
        match key {
            KeyStrategy::CompositeInt { key1, key2 } => {
                context.insert("key_kind", "composite");
                context.insert("key1", key1);
                context.insert("key2", key2);
            }
            KeyStrategy::EnumKeys => {
                context.insert("key_kind", "enum");
            }
            KeyStrategy::SingleInt => {
                context.insert("key_kind", "single");
            }
        }

        let content = self
            .template_engine
            .render("data_class", &context)
            .map_err(|e| AppError::template_error(format!("渲染数据类模板失败: {}", e)))?;

        let file_name = sanitize_filename(&CS_FILE_PATTERN.replace("{name}", sheet_name))?;
        writer.write_to_file(&content, &output_folder.join(file_name))
    }

    /// 生成枚举文件 {Name}.cs
    pub fn generate_enum_file(
        &self,
        writer: &OutputWriter,
        spec: &EnumSpec,
        output_folder: &Path,
    ) -> AppResult<()> {
        let members: Vec<MemberCtx> = spec
            .members
            .iter()
            .enumerate()
            .map(|(i, (name, value))| MemberCtx {
                name: name.clone(),
                value: *value,
                remark: spec
                    .remarks
                    .get(i)
                    .and_then(|r| r.clone())
                    .unwrap_or_default(),
            })
            .collect();

        let mut context = Context::new();
        context.insert("name", &spec.name);
        context.insert("namespace", &spec.namespace);
        context.insert("source", &spec.source);
        context.insert("members", &members);

        let content = self
            .template_engine
            .render("enum_file", &context)
            .map_err(|e| AppError::template_error(format!("渲染枚举模板失败: {}", e)))?;

        let file_name = sanitize_filename(&ENUM_FILE_PATTERN.replace("{name}", &spec.name))?;
        writer.write_to_file(&content, &output_folder.join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_props() -> Vec<(String, String)> {
        vec![
            ("id".to_string(), "int".to_string()),
            ("name".to_string(), "string".to_string()),
            ("tags".to_string(), "List<int>".to_string()),
        ]
    }

    fn sample_remarks() -> HashMap<String, String> {
        let mut remarks = HashMap::new();
        remarks.insert("name".to_string(), "名称: 显示名".to_string());
        remarks
    }

    #[test]
    fn test_generate_script_file_single_key() {
        let dir = tempdir().unwrap();
        let writer = OutputWriter::new(false, false);
        let generator = ScriptGenerator::new().unwrap();
        generator
            .generate_script_file(
                &writer,
                "Item",
                "Data.TableScript",
                &sample_props(),
                &sample_remarks(),
                &KeyStrategy::SingleInt,
                dir.path(),
            )
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("ItemInfo.cs")).unwrap();
        assert!(content.contains("namespace Data.TableScript"));
        assert!(content.contains("public class ItemInfo"));
        assert!(content.contains("public string name;"));
        assert!(content.contains("public List<int> tags;"));
        assert!(content.contains("名称: 显示名"));
        assert!(content.contains("public static ItemInfo Get(int id)"));
        // 键列名为 id 时不重复声明字段
        assert_eq!(content.matches("public int id;").count(), 1);
        // 单键模式没有组合键/枚举键访问器
        assert!(!content.contains("CombineMultiplier"));
        assert!(!content.contains("ItemKeys"));
    }

    #[test]
    fn test_generate_script_file_composite_key() {
        let dir = tempdir().unwrap();
        let writer = OutputWriter::new(false, false);
        let generator = ScriptGenerator::new().unwrap();
        generator
            .generate_script_file(
                &writer,
                "Reward",
                "Data.TableScript",
                &sample_props(),
                &sample_remarks(),
                &KeyStrategy::CompositeInt {
                    key1: "stage".to_string(),
                    key2: "slot".to_string(),
                },
                dir.path(),
            )
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("RewardInfo.cs")).unwrap();
        assert!(content.contains("public const int CombineMultiplier = 46340;"));
        assert!(content.contains("Get(int stage, int slot)"));
        assert!(content.contains("stage * CombineMultiplier + slot"));
    }

    #[test]
    fn test_generate_script_file_enum_key() {
        let dir = tempdir().unwrap();
        let writer = OutputWriter::new(false, false);
        let generator = ScriptGenerator::new().unwrap();
        generator
            .generate_script_file(
                &writer,
                "Sample",
                "Data.TableScript",
                &sample_props(),
                &HashMap::new(),
                &KeyStrategy::EnumKeys,
                dir.path(),
            )
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("SampleInfo.cs")).unwrap();
        assert!(content.contains("Get(SampleKeys key)"));
        assert!(content.contains("(int)key"));
    }

    #[test]
    fn test_generate_enum_file() {
        let dir = tempdir().unwrap();
        let writer = OutputWriter::new(false, false);
        let generator = ScriptGenerator::new().unwrap();
        let spec = EnumSpec {
            name: "ItemType".to_string(),
            members: vec![("Sword".to_string(), 0), ("Shield".to_string(), 1)],
            remarks: vec![Some("武器".to_string()), None],
            namespace: "Data.TableScript".to_string(),
            source: "Item.xlsx/Enum-ItemType".to_string(),
        };
        generator
            .generate_enum_file(&writer, &spec, dir.path())
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("ItemType.cs")).unwrap();
        assert!(content.contains("public enum ItemType"));
        assert!(content.contains("Sword = 0,"));
        assert!(content.contains("Shield = 1,"));
        assert!(content.contains("武器"));
        assert!(content.contains("Item.xlsx/Enum-ItemType"));
    }

    #[test]
    fn test_writer_records_created_files() {
        let dir = tempdir().unwrap();
        let writer = OutputWriter::new(false, false);
        let path = dir.path().join("a.json");
        writer.write_to_file("{}", &path).unwrap();
        assert!(writer.is_created(&path));
        assert_eq!(writer.created_files().len(), 1);

        // 重复写入不重复记账
        writer.write_to_file("{}", &path).unwrap();
        assert_eq!(writer.created_files().len(), 1);
    }

    #[test]
    fn test_writer_dry_run_records_without_writing() {
        let dir = tempdir().unwrap();
        let writer = OutputWriter::new(false, true);
        let path = dir.path().join("a.json");
        writer.write_to_file("{}", &path).unwrap();
        assert!(!path.exists());
        assert!(writer.is_created(&path));
    }

    #[test]
    fn test_writer_diff_only_skips_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, "{}").unwrap();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let writer = OutputWriter::new(true, false);
        writer.write_to_file("{}", &path).unwrap();
        let after = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(before, after);

        // 内容变化时仍会写入
        writer.write_to_file("{\"a\":1}", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}");
    }
}
