use anyhow::Result;

use crate::{infra::config::AppConfig, store::memory::Collections};

pub trait ConfigAdapter {
    fn load(&self) -> Result<AppConfig>;
}

/// Durable copy of the document store's collections between runs.
pub trait SnapshotAdapter {
    fn load(&self) -> Result<Collections>;
    fn save(&self, collections: &Collections) -> Result<()>;
}
