use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    infra::{
        self,
        config::{AppConfig, FileConfigAdapter},
        contracts::{ConfigAdapter, SnapshotAdapter},
        snapshot_file::SnapshotFile,
        storage_layout::resolve_snapshot_path,
    },
    store::InMemoryStore,
    usecases::context::AppContext,
};

/// Loaded application plus the logging guard that must outlive it.
pub struct Bootstrapped {
    pub context: AppContext,
    pub log_guard: Option<WorkerGuard>,
}

pub fn bootstrap(config_path: Option<&Path>, store_path: Option<&Path>) -> Result<Bootstrapped> {
    let config = FileConfigAdapter::new(config_path).load()?;
    let log_guard = infra::logging::init(&config.logging)?;

    let snapshot_path = resolve_snapshot_path(&config.store, store_path)?;
    tracing::debug!(path = %snapshot_path.display(), "using store snapshot");
    let context = build_context(config, Box::new(SnapshotFile::new(snapshot_path)))?;

    Ok(Bootstrapped { context, log_guard })
}

pub fn build_context(config: AppConfig, snapshot: Box<dyn SnapshotAdapter>) -> Result<AppContext> {
    let store = InMemoryStore::from_collections(snapshot.load()?);
    Ok(AppContext::new(config, store, snapshot))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        infra::stubs::StubSnapshot,
        store::{DocumentStore, CHATS},
        test_support::fields,
    };

    #[test]
    fn builds_store_from_snapshot_contents() {
        let seed = InMemoryStore::new();
        seed.set(CHATS, "c1", fields(json!({"type": "group"})))
            .expect("seed");
        let snapshot = StubSnapshot {
            initial: seed.export().expect("export"),
            ..StubSnapshot::default()
        };

        let context = build_context(AppConfig::default(), Box::new(snapshot))
            .expect("context should build");

        assert!(context.store.get(CHATS, "c1").expect("read").is_some());
    }

    #[test]
    fn persist_writes_current_store() {
        let snapshot = Arc::new(StubSnapshot::default());
        let context = build_context(AppConfig::default(), Box::new(Arc::clone(&snapshot)))
            .expect("context should build");
        context
            .store
            .set(CHATS, "c1", fields(json!({"type": "group"})))
            .expect("write");

        context.persist().expect("persist");

        let saved = snapshot.last_saved().expect("snapshot saved");
        assert!(saved.get(CHATS).is_some_and(|chats| chats.contains_key("c1")));
    }
}
