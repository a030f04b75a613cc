//! C# 命名规范校验
//!
//! 字段名、枚举名与枚举项最终都会出现在生成的 C# 脚本里，
//! 这里统一校验标识符合法性，避免生成无法编译的代码。

/// C# 保留关键字（生成代码中不允许作为标识符）
const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char",
    "checked", "class", "const", "continue", "decimal", "default", "delegate",
    "do", "double", "else", "enum", "event", "explicit", "extern", "false",
    "finally", "fixed", "float", "for", "foreach", "goto", "if", "implicit",
    "in", "int", "interface", "internal", "is", "lock", "long", "namespace",
    "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte",
    "sealed", "short", "sizeof", "stackalloc", "static", "string", "struct",
    "switch", "this", "throw", "true", "try", "typeof", "uint", "ulong",
    "unchecked", "unsafe", "ushort", "using", "virtual", "void", "volatile",
    "while",
];

/// 检查是否为合法的 C# 标识符
///
/// 规则：非空、首字符为字母或下划线、其余字符为字母/数字/下划线、
/// 且不是 C# 保留关键字。
pub fn is_valid_csharp_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !CSHARP_KEYWORDS.contains(&name)
}

/// 检查是否为合法的 C# 枚举项名称（大写驼峰式）
pub fn is_valid_enum_member_name(name: &str) -> bool {
    if !is_valid_csharp_identifier(name) {
        return false;
    }
    name.chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
}
