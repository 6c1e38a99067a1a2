//! Registry key paths
//!
//! Paths are kept as a hive name plus components. Abbreviated hive names
//! (`HKLM`) and native object paths (`\REGISTRY\MACHINE`) map to the long
//! hive names; identity is case-insensitive.

pub const HKEY_CLASSES_ROOT: &str = "HKEY_CLASSES_ROOT";
pub const HKEY_CURRENT_USER: &str = "HKEY_CURRENT_USER";
pub const HKEY_LOCAL_MACHINE: &str = "HKEY_LOCAL_MACHINE";
pub const HKEY_USERS: &str = "HKEY_USERS";
pub const HKEY_PERFORMANCE_DATA: &str = "HKEY_PERFORMANCE_DATA";
pub const HKEY_CURRENT_CONFIG: &str = "HKEY_CURRENT_CONFIG";

/// Hive behind a predefined root handle (`0x80000000` ..= `0x80000005`),
/// also when logged sign-extended to 64 bits
pub fn predefined_root(handle: u64) -> Option<&'static str> {
    let handle = if handle >> 32 == 0xffff_ffff {
        handle & 0xffff_ffff
    } else {
        handle
    };
    match handle {
        0x8000_0000 => Some(HKEY_CLASSES_ROOT),
        0x8000_0001 => Some(HKEY_CURRENT_USER),
        0x8000_0002 => Some(HKEY_LOCAL_MACHINE),
        0x8000_0003 => Some(HKEY_USERS),
        0x8000_0004 => Some(HKEY_PERFORMANCE_DATA),
        0x8000_0005 => Some(HKEY_CURRENT_CONFIG),
        _ => None,
    }
}

fn hive_alias(name: &str) -> Option<&'static str> {
    let hive = match name.to_ascii_uppercase().as_str() {
        "HKCR" | "HKEY_CLASSES_ROOT" => HKEY_CLASSES_ROOT,
        "HKCU" | "HKEY_CURRENT_USER" => HKEY_CURRENT_USER,
        "HKLM" | "HKEY_LOCAL_MACHINE" => HKEY_LOCAL_MACHINE,
        "HKU" | "HKEY_USERS" => HKEY_USERS,
        "HKEY_PERFORMANCE_DATA" => HKEY_PERFORMANCE_DATA,
        "HKCC" | "HKEY_CURRENT_CONFIG" => HKEY_CURRENT_CONFIG,
        _ => return None,
    };
    Some(hive)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    hive: &'static str,
    parts: Vec<String>,
}

impl KeyPath {
    pub fn hive(hive: &'static str) -> Self {
        Self {
            hive,
            parts: Vec::new(),
        }
    }

    /// Absolute key path; `None` when the root is not a known hive
    pub fn parse(raw: &str) -> Option<Self> {
        let mut components = raw
            .trim()
            .split(['\\', '/'])
            .filter(|c| !c.is_empty())
            .peekable();

        let first = components.next()?;
        let hive = if first.eq_ignore_ascii_case("REGISTRY") {
            match components.next()?.to_ascii_uppercase().as_str() {
                "MACHINE" => HKEY_LOCAL_MACHINE,
                "USER" => HKEY_USERS,
                _ => return None,
            }
        } else {
            hive_alias(first)?
        };
        Some(Self {
            hive,
            parts: components.map(str::to_string).collect(),
        })
    }

    /// Append a relative sub key path
    pub fn join(&self, sub_key: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.extend(
            sub_key
                .split('\\')
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        );
        Self {
            hive: self.hive,
            parts,
        }
    }

    pub fn hive_name(&self) -> &'static str {
        self.hive
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    #[inline]
    pub fn is_hive(&self) -> bool {
        self.parts.is_empty()
    }

    /// The hive plus the first `depth` components
    pub fn prefix(&self, depth: usize) -> Self {
        Self {
            hive: self.hive,
            parts: self.parts[..depth.min(self.parts.len())].to_vec(),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_hive() {
            None
        } else {
            Some(self.prefix(self.parts.len() - 1))
        }
    }

    /// Split off the last component, for paths naming a value
    pub fn split_last(&self) -> Option<(Self, String)> {
        let name = self.parts.last()?.clone();
        Some((self.prefix(self.parts.len() - 1), name))
    }

    pub fn display(&self) -> String {
        if self.parts.is_empty() {
            self.hive.to_string()
        } else {
            format!("{}\\{}", self.hive, self.parts.join("\\"))
        }
    }

    pub fn folded(&self) -> String {
        self.display().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_and_native_paths() {
        let short = KeyPath::parse("HKLM\\Software\\X").unwrap();
        let native = KeyPath::parse("\\REGISTRY\\MACHINE\\SOFTWARE\\x").unwrap();
        assert_eq!(short.display(), "HKEY_LOCAL_MACHINE\\Software\\X");
        assert_eq!(short.folded(), native.folded());
        assert_eq!(
            KeyPath::parse("\\Registry\\User\\S-1-5-18").unwrap().display(),
            "HKEY_USERS\\S-1-5-18"
        );
        assert!(KeyPath::parse("Software\\X").is_none());
    }

    #[test]
    fn test_predefined_roots() {
        assert_eq!(predefined_root(0x8000_0002), Some(HKEY_LOCAL_MACHINE));
        assert_eq!(predefined_root(0xffff_ffff_8000_0001), Some(HKEY_CURRENT_USER));
        assert_eq!(predefined_root(0x44), None);
    }

    #[test]
    fn test_join_and_split() {
        let key = KeyPath::hive(HKEY_CURRENT_USER).join("Software\\\\Run\\");
        assert_eq!(key.display(), "HKEY_CURRENT_USER\\Software\\Run");
        let (parent, name) = key.split_last().unwrap();
        assert_eq!(parent.display(), "HKEY_CURRENT_USER\\Software");
        assert_eq!(name, "Run");
        assert!(KeyPath::hive(HKEY_USERS).split_last().is_none());
    }
}
