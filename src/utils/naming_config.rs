//! 命名与输出约定常量
//!
//! 导出文件命名、JSON 形态与各类告警阈值的集中定义，
//! 配置文件可以覆盖其中的 JSON 形态与阈值项。

/// JSON 输出文件名模式：`{表名}.json`
pub const JSON_FILE_PATTERN: &str = "{name}.json";

/// C# 数据类文件名模式：`{表名}Info.cs`
pub const CS_FILE_PATTERN: &str = "{name}Info.cs";

/// C# 枚举文件名模式：`{枚举名}.cs`
pub const ENUM_FILE_PATTERN: &str = "{name}.cs";

/// 字符串主键表自动生成的枚举类型后缀：`Sample` -> `SampleKeys`
pub const ENUM_KEYS_SUFFIX: &str = "Keys";

/// 生成的 C# 代码所属命名空间
pub const CS_NAMESPACE: &str = "Data.TableScript";

/// 枚举分表的 sheet 名前缀：`Enum-ItemType` -> 枚举 `ItemType`
pub const ENUM_SHEET_TAG: &str = "Enum-";

/// JSON 顶层键是否排序（默认保持 Excel 行顺序）
pub const JSON_SORT_KEYS: bool = false;

/// 每条记录是否把 id 放在首位
pub const JSON_ID_FIRST: bool = true;

/// 单表 JSON 总大小告警阈值（字节）
pub const JSON_WARN_TOTAL_BYTES: usize = 8 * 1024 * 1024;

/// 单条记录序列化大小告警阈值（字节）
pub const JSON_WARN_RECORD_BYTES: usize = 64 * 1024;

/// 引用检查允许的 int "空引用" 取值（命中则跳过存在性检查）
pub const REFERENCE_ALLOW_EMPTY_INT_VALUES: [i64; 2] = [0, -1];

/// 引用检查允许的 string "空引用" 取值
pub const REFERENCE_ALLOW_EMPTY_STRING_VALUES: [&str; 1] = [""];

/// 组合键参数（默认保证合并结果可装入 int32）
/// key2 的上限（exclusive）：0 <= key2 < MAX_KEY2
pub const MAX_KEY2: i64 = 46340;

/// 组合键乘数：combined = key1 * MULTIPLIER + key2
pub const MULTIPLIER: i64 = MAX_KEY2;

/// 数据行在 Excel 中的起始行号（1-based）
pub const DATA_START_ROW: usize = 7;

/// 输出目录最低可用空间要求（字节）
pub const MIN_FREE_DISK_BYTES: u64 = 10 * 1024 * 1024;
