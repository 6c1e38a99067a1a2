//! Filesystem path normalization
//!
//! Windows paths lose their native prefixes (`\??\`, `\\?\`, `\\.\`), use
//! `\` throughout, get an upper-case drive letter and compare
//! case-insensitively. UNC paths are rooted at `\\server\share`. POSIX paths
//! must be absolute. `.` and `..` components are resolved lexically.
//! Relative paths and device paths do not normalize.

use crate::shared::models::PathData;
use crate::shared::utils::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsPath {
    platform: Platform,
    /// `C:`, `\\server\share` or `/`
    root: String,
    parts: Vec<String>,
}

impl FsPath {
    pub fn parse(raw: &str, platform: Platform) -> Option<Self> {
        let raw = raw.trim().trim_matches('"');
        if raw.is_empty() {
            return None;
        }
        match platform {
            Platform::Windows => Self::parse_windows(raw),
            Platform::Posix => Self::parse_posix(raw),
        }
    }

    fn parse_windows(raw: &str) -> Option<Self> {
        let mut path = raw.replace('/', "\\");
        for prefix in ["\\??\\UNC\\", "\\\\?\\UNC\\"] {
            let matched = path
                .get(..prefix.len())
                .map(|head| head.eq_ignore_ascii_case(prefix))
                .unwrap_or(false);
            if matched {
                path = format!("\\\\{}", &path[prefix.len()..]);
            }
        }
        for prefix in ["\\??\\", "\\\\?\\", "\\\\.\\"] {
            if let Some(rest) = path.strip_prefix(prefix) {
                path = rest.to_string();
                break;
            }
        }

        let bytes = path.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            let root = format!("{}:", (bytes[0] as char).to_ascii_uppercase());
            let parts = resolve(path[2..].split('\\'));
            return Some(Self {
                platform: Platform::Windows,
                root,
                parts,
            });
        }

        if let Some(rest) = path.strip_prefix("\\\\") {
            let mut components = rest.split('\\').filter(|c| !c.is_empty());
            let server = components.next()?;
            let share = components.next()?;
            if server == "." || server == "?" {
                return None;
            }
            return Some(Self {
                platform: Platform::Windows,
                root: format!("\\\\{}\\{}", server, share),
                parts: resolve(components),
            });
        }
        None
    }

    fn parse_posix(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix('/')?;
        Some(Self {
            platform: Platform::Posix,
            root: "/".to_string(),
            parts: resolve(rest.split('/')),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// Last component; the root has none
    pub fn name(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    pub fn display(&self) -> String {
        match self.platform {
            Platform::Posix => format!("/{}", self.parts.join("/")),
            Platform::Windows if self.root.ends_with(':') => {
                format!("{}\\{}", self.root, self.parts.join("\\"))
            }
            Platform::Windows if self.parts.is_empty() => self.root.clone(),
            Platform::Windows => format!("{}\\{}", self.root, self.parts.join("\\")),
        }
    }

    /// Identity form
    pub fn folded(&self) -> String {
        self.platform.fold(&self.display())
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            platform: self.platform,
            root: self.root.clone(),
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// The first `depth` components below the root
    pub fn prefix(&self, depth: usize) -> Self {
        Self {
            platform: self.platform,
            root: self.root.clone(),
            parts: self.parts[..depth.min(self.parts.len())].to_vec(),
        }
    }

    /// Proper ancestors, nearest first, root last
    pub fn ancestors(&self) -> impl Iterator<Item = FsPath> {
        std::iter::successors(self.parent(), FsPath::parent)
    }

    /// Whether the last component is a search pattern (`*`, `?`)
    pub fn has_wildcard(&self) -> bool {
        self.name()
            .map(|name| name.contains(['*', '?']))
            .unwrap_or(false)
    }

    pub fn to_path_data(&self, exists: Option<bool>) -> PathData {
        PathData {
            path: self.display(),
            folded: self.folded(),
            exists,
        }
    }
}

fn resolve<'a>(components: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in components {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name.to_string()),
        }
    }
    parts
}
