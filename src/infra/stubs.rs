use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::{
    infra::{
        config::AppConfig,
        contracts::{ConfigAdapter, SnapshotAdapter},
    },
    store::memory::Collections,
};

#[derive(Debug, Clone, Default)]
pub struct StubConfigAdapter {
    pub config: AppConfig,
}

impl ConfigAdapter for StubConfigAdapter {
    fn load(&self) -> Result<AppConfig> {
        Ok(self.config.clone())
    }
}

/// Snapshot kept in memory; records every save.
#[derive(Debug, Default)]
pub struct StubSnapshot {
    pub initial: Collections,
    pub saved: Mutex<Vec<Collections>>,
}

impl StubSnapshot {
    pub fn save_count(&self) -> usize {
        self.saved.lock().map(|saved| saved.len()).unwrap_or(0)
    }

    pub fn last_saved(&self) -> Option<Collections> {
        self.saved.lock().ok().and_then(|saved| saved.last().cloned())
    }
}

impl SnapshotAdapter for StubSnapshot {
    fn load(&self) -> Result<Collections> {
        Ok(self.initial.clone())
    }

    fn save(&self, collections: &Collections) -> Result<()> {
        self.saved
            .lock()
            .map_err(|_| anyhow::anyhow!("stub snapshot lock poisoned"))?
            .push(collections.clone());
        Ok(())
    }
}

impl SnapshotAdapter for Arc<StubSnapshot> {
    fn load(&self) -> Result<Collections> {
        (**self).load()
    }

    fn save(&self, collections: &Collections) -> Result<()> {
        (**self).save(collections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_config_returns_configured_values() {
        let mut config = AppConfig::default();
        config.chat.user_id = "u1".to_owned();
        let adapter = StubConfigAdapter {
            config: config.clone(),
        };

        assert_eq!(adapter.load().expect("stub config must load"), config);
    }

    #[test]
    fn stub_snapshot_records_saves() {
        let snapshot = StubSnapshot::default();

        snapshot.save(&Collections::new()).expect("save");

        assert_eq!(snapshot.save_count(), 1);
        assert_eq!(snapshot.last_saved(), Some(Collections::new()));
    }
}
