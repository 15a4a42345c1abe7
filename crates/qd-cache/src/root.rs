//! Cache-root directory resolution (§6): `QD_CACHE_ROOT`/`TI_CACHE_ROOT`
//! override it outright; otherwise the platform default follows
//! `XDG_CACHE_HOME`/`HOME` on Unix (via `directories-next`, the same crate
//! `wasmtime-cache` resolves its config directory with) and a fixed path
//! on Windows.

use std::path::PathBuf;

pub fn default_cache_root() -> PathBuf {
    if let Ok(root) = std::env::var("QD_CACHE_ROOT").or_else(|_| std::env::var("TI_CACHE_ROOT")) {
        return PathBuf::from(root);
    }

    if cfg!(windows) {
        return PathBuf::from("C:/quadrants_cache/");
    }

    directories_next::ProjectDirs::from("", "", "quadrants")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cache/quadrants"))
}

/// The subdirectory `.qdc`/`qdcache.tcb` files live under, relative to the
/// cache root (§4.7 "Layout").
pub fn kernel_compilation_manager_dir(root: &std::path::Path) -> PathBuf {
    root.join("kernel_compilation_manager")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        std::env::set_var("QD_CACHE_ROOT", "/tmp/qd-cache-test-override");
        assert_eq!(
            default_cache_root(),
            PathBuf::from("/tmp/qd-cache-test-override")
        );
        std::env::remove_var("QD_CACHE_ROOT");
    }
}
