//! Shared utility functions for addonctl crates

use anyhow::anyhow;
use std::path::PathBuf;

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that a
/// relocated HOME (containers, CI sandboxes) is honoured.
pub fn get_home_dir() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Expand `~` and `$VAR` references in a configured path
pub fn expand_path(raw: &str) -> String {
    match shellexpand::full(raw) {
        Ok(expanded) => expanded.into_owned(),
        Err(_) => shellexpand::tilde(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_home_dir_from_env() {
        if std::env::var("HOME").is_ok() {
            let home = get_home_dir().unwrap();
            assert!(!home.as_os_str().is_empty());
        }
    }

    #[test]
    fn test_expand_path_leaves_plain_paths() {
        assert_eq!(expand_path("/opt/addons"), "/opt/addons");
        assert_eq!(expand_path("relative/addons"), "relative/addons");
    }

    #[test]
    fn test_expand_path_tilde() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_path("~/addons"), format!("{}/addons", home));
        }
    }
}
