use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Expands `path` and anchors it at `base` when it is still relative.
pub fn resolve_against(base: Option<&Path>, path: &str) -> PathBuf {
    let expanded = expand_tilde(path);
    match base {
        Some(base) if expanded.is_relative() => base.join(expanded),
        _ => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_trimmed_only() {
        assert_eq!(expand_tilde("  /etc/flowref.json "), PathBuf::from("/etc/flowref.json"));
        assert_eq!(expand_tilde("relative/file"), PathBuf::from("relative/file"));
    }

    #[test]
    fn tilde_prefix_uses_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_tilde("~"), home);
            assert_eq!(expand_tilde("~/catalog.yaml"), home.join("catalog.yaml"));
        }
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/flowref");
        assert_eq!(resolve_against(Some(base), "catalog.yaml"), PathBuf::from("/srv/flowref/catalog.yaml"));
        assert_eq!(resolve_against(Some(base), "/abs/catalog.yaml"), PathBuf::from("/abs/catalog.yaml"));
        assert_eq!(resolve_against(None, "catalog.yaml"), PathBuf::from("catalog.yaml"));
    }
}
