//! 资源文件校验：处理 [Asset] 和 [Asset:ext] 标记的资源存在性检查
//!
//! 从 YooAsset 收集设置文件解析 CollectPath 列表，对路径下的资源
//! 建立一次性索引（忽略 .meta 文件），按文件名（不含扩展名）校验。
//! 文件名严格大小写匹配，扩展名忽略大小写。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::config::YooAssetConfig;

/// 匹配收集设置中的路径行：`- CollectPath: Assets/...`
static COLLECT_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CollectPath:\s*(Assets/[^\r\n]+)").unwrap());

/// 资源条目
#[derive(Debug, Clone)]
struct AssetEntry {
    /// 不含扩展名，保留实际大小写
    base: String,
    /// 不带点的小写扩展名（如 'png','prefab'）
    ext: String,
}

/// 资源文件校验器
pub struct AssetValidator {
    /// 严格模式：资源缺失直接报错中断
    pub strict: bool,
    roots: Vec<String>,
    project_root: PathBuf,
    /// base 名小写 -> 候选条目
    index: HashMap<String, Vec<AssetEntry>>,
}

impl AssetValidator {
    /// 从配置构建校验器
    ///
    /// 收集设置未配置、文件缺失或未解析出任何 CollectPath 时返回 None，
    /// 调用方跳过 [Asset] 校验并提示一次。
    pub fn from_config(config: &YooAssetConfig) -> Option<Self> {
        let collector = config.collector_setting.as_deref()?;
        if !Path::new(collector).is_file() {
            return None;
        }
        let validator = Self::new(collector, config.strict)?;
        if validator.roots.is_empty() {
            return None;
        }
        Some(validator)
    }

    /// 解析收集设置并建立资源索引
    fn new(collector_setting: &str, strict: bool) -> Option<Self> {
        let content = std::fs::read_to_string(collector_setting).ok()?;
        let roots = parse_collect_paths(&content);
        let project_root = infer_project_root(collector_setting);

        let mut validator = Self {
            strict,
            roots,
            project_root,
            index: HashMap::new(),
        };
        validator.build_index();
        Some(validator)
    }

    /// 构建资源文件索引
    fn build_index(&mut self) {
        for root in &self.roots {
            let abs_root = self.project_root.join(root);
            if !abs_root.is_dir() {
                continue;
            }
            let mut stack = vec![abs_root];
            while let Some(dir) = stack.pop() {
                let entries = match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(_) => continue,
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        stack.push(path);
                        continue;
                    }
                    let file_name = match path.file_name().and_then(|n| n.to_str()) {
                        Some(name) => name,
                        None => continue,
                    };
                    if file_name.ends_with(".meta") {
                        continue;
                    }
                    let (base, ext) = match file_name.rsplit_once('.') {
                        Some((b, e)) => (b.to_string(), e.to_lowercase()),
                        None => (file_name.to_string(), String::new()),
                    };
                    let key = base.to_lowercase();
                    self.index.entry(key).or_default().push(AssetEntry { base, ext });
                }
            }
        }
    }

    /// 检查是否存在指定文件名（不含扩展名）的资源文件
    ///
    /// 文件名严格大小写匹配；扩展名忽略大小写。
    pub fn exists_base_name(&self, base_name: &str, required_ext: Option<&str>) -> bool {
        if self.index.is_empty() {
            return false;
        }
        let key = base_name.trim().to_lowercase();
        let candidates = match self.index.get(&key) {
            Some(entries) => entries,
            None => return false,
        };
        match required_ext {
            Some(ext) => {
                let req = ext.trim().trim_start_matches('.').to_lowercase();
                candidates
                    .iter()
                    .any(|e| e.base == base_name && e.ext == req)
            }
            None => candidates.iter().any(|e| e.base == base_name),
        }
    }
}

/// 解析收集设置文件中的 CollectPath 路径（去重，去尾部斜杠）
fn parse_collect_paths(content: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for line in content.lines() {
        if let Some(caps) = COLLECT_PATH_RE.captures(line) {
            let mut path = caps[1].trim().to_string();
            if path.ends_with('/') {
                path.pop();
            }
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// 从收集设置文件路径推断项目根目录（Assets 的上一级）
fn infer_project_root(collector_setting: &str) -> PathBuf {
    let path = Path::new(collector_setting);
    let mut components: Vec<&std::ffi::OsStr> = Vec::new();
    for comp in path.components() {
        if comp.as_os_str() == "Assets" {
            let mut root = PathBuf::new();
            for c in &components {
                root.push(c);
            }
            if root.as_os_str().is_empty() {
                return PathBuf::from(".");
            }
            return root;
        }
        components.push(comp.as_os_str());
    }
    PathBuf::from(".")
}
