//! Registry value payloads
//!
//! A `KeyEntry` vertex is a variant typed by the underlying registry value
//! type: integer, string, multi-string, binary or none.

use serde::{Deserialize, Serialize};

/// Registry value type codes (winnt.h)
pub mod reg_type {
    pub const REG_NONE: u32 = 0;
    pub const REG_SZ: u32 = 1;
    pub const REG_EXPAND_SZ: u32 = 2;
    pub const REG_BINARY: u32 = 3;
    pub const REG_DWORD: u32 = 4;
    pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
    pub const REG_LINK: u32 = 6;
    pub const REG_MULTI_SZ: u32 = 7;
    pub const REG_QWORD: u32 = 11;

    /// Parse either a numeric code or a symbolic `REG_*` name
    pub fn parse(raw: &str) -> Option<u32> {
        let raw = raw.trim();
        if let Ok(code) = raw.parse::<u32>() {
            return Some(code);
        }
        let code = match raw.to_ascii_uppercase().as_str() {
            "REG_NONE" => REG_NONE,
            "REG_SZ" => REG_SZ,
            "REG_EXPAND_SZ" => REG_EXPAND_SZ,
            "REG_BINARY" => REG_BINARY,
            "REG_DWORD" | "REG_DWORD_LITTLE_ENDIAN" => REG_DWORD,
            "REG_DWORD_BIG_ENDIAN" => REG_DWORD_BIG_ENDIAN,
            "REG_LINK" => REG_LINK,
            "REG_MULTI_SZ" => REG_MULTI_SZ,
            "REG_QWORD" | "REG_QWORD_LITTLE_ENDIAN" => REG_QWORD,
            _ => return None,
        };
        Some(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RegValue {
    Int(i64),
    String(String),
    MultiString(Vec<String>),
    Binary(Vec<u8>),
    None,
}

impl RegValue {
    /// Decode a logged value according to its registry type code
    ///
    /// Values are logged as JSON; strings holding numbers are accepted for
    /// integer types, and binary payloads may be hex strings or byte arrays.
    pub fn decode(type_code: Option<u32>, raw: Option<&serde_json::Value>) -> Self {
        use reg_type::*;
        use serde_json::Value;

        let Some(raw) = raw else {
            return Self::None;
        };
        match type_code {
            Some(REG_DWORD) | Some(REG_DWORD_BIG_ENDIAN) | Some(REG_QWORD) => match raw {
                Value::Number(n) => n.as_i64().map(Self::Int).unwrap_or(Self::None),
                Value::String(s) => parse_int(s).map(Self::Int).unwrap_or(Self::None),
                _ => Self::None,
            },
            Some(REG_MULTI_SZ) => match raw {
                Value::Array(items) => Self::MultiString(
                    items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect(),
                ),
                Value::String(s) => Self::MultiString(
                    s.split('\0')
                        .filter(|part| !part.is_empty())
                        .map(str::to_string)
                        .collect(),
                ),
                _ => Self::None,
            },
            Some(REG_BINARY) => match raw {
                Value::Array(items) => Self::Binary(
                    items
                        .iter()
                        .filter_map(|v| v.as_u64().map(|b| b as u8))
                        .collect(),
                ),
                Value::String(s) => decode_hex(s)
                    .map(Self::Binary)
                    .unwrap_or_else(|| Self::Binary(s.as_bytes().to_vec())),
                _ => Self::None,
            },
            Some(REG_NONE) => Self::None,
            // REG_SZ, REG_EXPAND_SZ, REG_LINK and unknown types
            _ => match raw {
                Value::String(s) => Self::String(s.trim_end_matches('\0').to_string()),
                Value::Null => Self::None,
                Value::Number(n) => n.as_i64().map(Self::Int).unwrap_or(Self::None),
                other => Self::String(other.to_string()),
            },
        }
    }

    /// String contents, for the path cross-linking pass
    pub fn strings(&self) -> Vec<&str> {
        match self {
            Self::String(s) => vec![s.as_str()],
            Self::MultiString(items) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::String(_) => "string",
            Self::MultiString(_) => "multi-string",
            Self::Binary(_) => "binary",
            Self::None => "none",
        }
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() || s.len() % 2 != 0 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
