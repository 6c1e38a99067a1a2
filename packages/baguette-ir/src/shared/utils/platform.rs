use serde::{Deserialize, Serialize};

/// Path syntax family of the traced machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    /// Anything that does not look like a Unix flavour is treated as Windows
    pub fn detect(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        let posix = ["linux", "android", "darwin", "macos", "osx", "unix", "freebsd", "posix"];
        if posix.iter().any(|name| raw.contains(name)) {
            Self::Posix
        } else {
            Self::Windows
        }
    }

    #[inline]
    pub fn is_case_insensitive(&self) -> bool {
        matches!(self, Self::Windows)
    }

    #[inline]
    pub fn separator(&self) -> char {
        match self {
            Self::Windows => '\\',
            Self::Posix => '/',
        }
    }

    /// Identity form of a path or name
    pub fn fold(&self, raw: &str) -> String {
        if self.is_case_insensitive() {
            raw.to_lowercase()
        } else {
            raw.to_string()
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::Windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Platform::detect("windows"), Platform::Windows);
        assert_eq!(Platform::detect("Linux x86_64"), Platform::Posix);
        assert_eq!(Platform::detect(""), Platform::Windows);
        assert_eq!(Platform::Posix.fold("/Tmp/A"), "/Tmp/A");
        assert_eq!(Platform::Windows.fold("C:\\A"), "c:\\a");
    }
}
