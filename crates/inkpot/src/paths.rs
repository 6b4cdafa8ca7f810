use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "INKPOT_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "INKPOT_DATA_DIR";

const APPLICATION: &str = "inkpot";
const CONFIG_FILE: &str = "inkpot.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    /// Platform directories, each overridable through its environment variable.
    pub fn discover() -> Result<Self> {
        let config_override = env_dir(ENV_CONFIG_DIR);
        let data_override = env_dir(ENV_DATA_DIR);
        if let (Some(config_dir), Some(data_dir)) = (&config_override, &data_override) {
            return Ok(Self::new(config_dir, data_dir));
        }

        let project_dirs = ProjectDirs::from("", "", APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: data_override.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn new(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Where interactive PNG snapshots are written.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }
}

fn env_dir(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_their_roots() {
        let paths = AppPaths::new(Path::new("/cfg"), Path::new("/data"));
        assert_eq!(paths.config_file(), PathBuf::from("/cfg/inkpot.toml"));
        assert_eq!(paths.snapshot_dir(), PathBuf::from("/data/snapshots"));
    }
}
