// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the PATHMENTOR_HOME environment variable for isolation.
// When PATHMENTOR_HOME is set, config and data live under that directory.
// When unset, config uses ~/.pathmentor/ and data uses XDG_DATA_HOME/pathmentor.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the PATHMENTOR_HOME override, if set.
fn pathmentor_home() -> Option<PathBuf> {
    std::env::var_os("PATHMENTOR_HOME").map(PathBuf::from)
}

/// Home directory, falling back to the working directory on exotic platforms.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $PATHMENTOR_HOME/ or ~/.pathmentor/
pub fn config_dir() -> PathBuf {
    if let Some(home) = pathmentor_home() {
        return home;
    }
    dirs_home().join(".pathmentor")
}

/// Data directory: $PATHMENTOR_HOME/data/ or ~/.local/share/pathmentor/
pub fn data_dir() -> PathBuf {
    if let Some(home) = pathmentor_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "pathmentor") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Database path
pub fn db_path() -> PathBuf {
    data_dir().join("pathmentor.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure config and data directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
