use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::{config::StoreConfig, error::AppError};

const APP_DIR_NAME: &str = "chatsync";
const SNAPSHOT_FILE_NAME: &str = "store.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub data_dir: PathBuf,
}

impl StorageLayout {
    pub fn resolve() -> Result<Self, AppError> {
        let data_base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .ok_or_else(|| AppError::StoragePathResolution {
                details: "unable to resolve data directory (XDG_DATA_HOME/HOME)".into(),
            })?;

        Ok(Self {
            data_dir: data_base.join(APP_DIR_NAME),
        })
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| AppError::StorageDirCreate {
            path: self.data_dir.clone(),
            source,
        })
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE_NAME)
    }
}

/// Picks the snapshot file: command-line override, then config, then the
/// default under the data directory.
pub fn resolve_snapshot_path(
    config: &StoreConfig,
    cli_override: Option<&Path>,
) -> Result<PathBuf, AppError> {
    if let Some(path) = cli_override.or(config.snapshot_path.as_deref()) {
        return Ok(path.to_path_buf());
    }

    let layout = StorageLayout::resolve()?;
    layout.ensure_dirs()?;
    Ok(layout.snapshot_file())
}
