//! Shared server state handed to every handler.

use std::sync::Arc;

use sylva_cst::TreeRegistry;
use sylva_db::{IntegrityGate, NoWorkers, StoreHandle};
use sylva_error::Result;
use sylva_io::{BackupManager, GitCli, Vcs};

use crate::config::ServerConfig;

pub struct ServerContext {
    pub config: ServerConfig,
    pub registry: TreeRegistry,
    pub store: StoreHandle,
    pub gate: IntegrityGate,
    pub backups: BackupManager,
    pub vcs: Box<dyn Vcs>,
}

impl ServerContext {
    /// Open the store, wire the gate, and build the registry. The caller
    /// decides what to do when the gate reports a frozen store.
    pub fn bootstrap(config: ServerConfig) -> Result<Arc<Self>> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| sylva_error::Error::file_op("mkdir", parent, e))?;
        }
        let store = StoreHandle::open(&config.db_path)?;
        let gate = IntegrityGate::new(&config.db_path, &config.backup_dir, Arc::new(NoWorkers));
        let backups = BackupManager::new(&config.backup_dir);
        Ok(Arc::new(Self {
            registry: TreeRegistry::new(),
            store,
            gate,
            backups,
            vcs: Box::new(GitCli),
            config,
        }))
    }
}
