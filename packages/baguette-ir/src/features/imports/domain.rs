//! Module name resolution

use crate::features::filesystem::FsPath;
use crate::shared::utils::Platform;

/// Absolute module path for a logged module name
///
/// Bare Windows names (`kernel32`, `USER32.dll`) resolve under
/// `system_directory`, with `.dll` appended when there is no extension.
/// Relative paths with directories stay unresolved.
pub fn resolve_module(raw: &str, platform: Platform, system_directory: &str) -> Option<FsPath> {
    let raw = raw.trim().trim_matches('"');
    if let Some(path) = FsPath::parse(raw, platform) {
        return Some(path);
    }
    if platform != Platform::Windows || raw.is_empty() || raw.contains(['\\', '/']) {
        return None;
    }
    let name = if raw.contains('.') {
        raw.to_string()
    } else {
        format!("{}.dll", raw)
    };
    FsPath::parse(
        &format!("{}\\{}", system_directory.trim_end_matches('\\'), name),
        platform,
    )
}
