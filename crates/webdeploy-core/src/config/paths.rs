//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "webdeploy.toml";

/// Default global config directory (`~/.config/webdeploy` on Linux).
pub fn default_config_dir(home_dir: &Path) -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("webdeploy"))
        .unwrap_or_else(|| home_dir.join(".config").join("webdeploy"))
}

pub fn config_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}
