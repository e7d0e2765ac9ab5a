use crate::{
    infra::{config::AppConfig, contracts::SnapshotAdapter},
    store::InMemoryStore,
};

/// Identity of the signed-in participant, passed to every component that
/// needs to know "who am I".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user_id: String,
}

impl SessionContext {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.trim().to_owned(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_current_user(&self, other: &str) -> bool {
        !self.user_id.is_empty() && other.trim() == self.user_id
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub store: InMemoryStore,
    snapshot: Box<dyn SnapshotAdapter>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: InMemoryStore,
        snapshot: Box<dyn SnapshotAdapter>,
    ) -> Self {
        Self {
            config,
            store,
            snapshot,
        }
    }

    /// Saves the store's current collections to the snapshot.
    pub fn persist(&self) -> anyhow::Result<()> {
        let collections = self.store.export()?;
        self.snapshot.save(&collections)
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_user_comparison_trims_both_sides() {
        let session = SessionContext::new("  u123 ");

        assert_eq!(session.user_id(), "u123");
        assert!(session.is_current_user("u123  "));
        assert!(!session.is_current_user("u1234"));
    }

    #[test]
    fn blank_session_matches_nobody() {
        let session = SessionContext::new("   ");

        assert!(!session.is_current_user(""));
    }
}
