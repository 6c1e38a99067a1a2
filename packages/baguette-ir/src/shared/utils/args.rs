//! Call argument access
//!
//! Reports log arguments under names that differ between the native and the
//! Win32 layer (`FileHandle` vs `file_handle` vs `hFile`), and log integers
//! either as JSON numbers or as `0x`-prefixed strings. Handlers ask for a list
//! of aliases and get the first one present.

use serde_json::Value;

use crate::features::trace_source::CallRecord;

pub trait CallArgs {
    /// First argument present among `names` (exact match first, then
    /// case-insensitive)
    fn arg(&self, names: &[&str]) -> Option<&Value>;

    /// Flag logged alongside the arguments (decoded access masks, ...)
    fn flag(&self, names: &[&str]) -> Option<&Value>;

    fn arg_str(&self, names: &[&str]) -> Option<String> {
        self.arg(names).and_then(value_as_string)
    }

    fn arg_int(&self, names: &[&str]) -> Option<u64> {
        self.arg(names).and_then(value_as_u64)
    }
}

impl CallArgs for CallRecord {
    fn arg(&self, names: &[&str]) -> Option<&Value> {
        lookup(&self.arguments, names)
    }

    fn flag(&self, names: &[&str]) -> Option<&Value> {
        lookup(&self.flags, names)
    }
}

fn lookup<'a>(
    map: &'a std::collections::BTreeMap<String, Value>,
    names: &[&str],
) -> Option<&'a Value> {
    let present = |value: &&Value| !value.is_null();
    names
        .iter()
        .find_map(|name| map.get(*name).filter(present))
        .or_else(|| {
            names.iter().find_map(|name| {
                map.iter()
                    .find(|(key, value)| key.eq_ignore_ascii_case(name) && present(value))
                    .map(|(_, value)| value)
            })
        })
}

/// String form of a scalar argument
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer form of an argument: JSON number, decimal string or hex string
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_i64().map(|i| i as u64)),
        Value::String(s) => parse_u64(s),
        _ => None,
    }
}

pub fn parse_u64(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw
            .parse::<u64>()
            .ok()
            .or_else(|| raw.parse::<i64>().ok().map(|i| i as u64)),
    }
}
