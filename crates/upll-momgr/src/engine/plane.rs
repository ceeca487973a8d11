//! Whole-plane maintenance: save, clear and load.

use super::MoMgrImpl;
use crate::UpllResult;
use tracing::info;
use upll_dal::ConfigStore;
use upll_types::DataType;

impl MoMgrImpl {
    fn copy_plane(
        &self,
        store: &mut dyn ConfigStore,
        from: DataType,
        to: DataType,
    ) -> UpllResult<()> {
        for mgr in self.managers() {
            for table in mgr.tables() {
                store.copy_table(mgr.key_type(), *table, from, to)?;
            }
        }
        info!(from = %from, to = %to, "plane copied");
        Ok(())
    }

    /// Saves RUNNING as the startup configuration.
    pub fn copy_running_to_startup(&self, store: &mut dyn ConfigStore) -> UpllResult<()> {
        self.copy_plane(store, DataType::Running, DataType::Startup)
    }

    pub fn clear_startup(&self, store: &mut dyn ConfigStore) -> UpllResult<()> {
        for mgr in self.managers() {
            for table in mgr.tables() {
                store.clear_table(mgr.key_type(), *table, DataType::Startup)?;
            }
        }
        info!("startup configuration cleared");
        Ok(())
    }

    /// Loads the startup configuration into CANDIDATE and RUNNING.
    pub fn load_startup(&self, store: &mut dyn ConfigStore) -> UpllResult<()> {
        self.copy_plane(store, DataType::Startup, DataType::Candidate)?;
        self.copy_plane(store, DataType::Startup, DataType::Running)
    }

    /// Discards uncommitted CANDIDATE changes.
    pub fn copy_running_to_candidate(&self, store: &mut dyn ConfigStore) -> UpllResult<()> {
        self.copy_plane(store, DataType::Running, DataType::Candidate)
    }
}
