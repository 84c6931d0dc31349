//! Configuration Session
//!
//! Outer boundary of the shim. Each step returns `true` on success; on
//! failure the error is logged, its message is kept for [`ConfigSession::error`]
//! and the step returns `false`. State produced before a failure is kept.
//!
//! The usual flow is `load → parse → migrate → build → save`.

use std::path::Path;
use std::sync::Arc;

use shim_types::{SchemaVersion, Setting};
use tracing::{error, info};

use crate::error::{Result, ShimError};
use crate::io;
use crate::mapper::{DecodeSummary, TreeMapper};
use crate::migrate::{MigrationReport, Migrator};
use crate::store::ObjectStore;

pub struct ConfigSession {
    store: Arc<ObjectStore>,
    mapper: TreeMapper,
    migrator: Migrator,
    tree: Option<Setting>,
    decoded: Option<DecodeSummary>,
    report: Option<MigrationReport>,
    error: Option<String>,
}

impl ConfigSession {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self {
            mapper: TreeMapper::new(store.clone()),
            migrator: Migrator::new(store.clone()),
            store,
            tree: None,
            decoded: None,
            report: None,
            error: None,
        }
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    /// Current tree: the loaded one, or the built one after [`build`](Self::build)
    pub fn tree(&self) -> Option<&Setting> {
        self.tree.as_ref()
    }

    pub fn decoded(&self) -> Option<&DecodeSummary> {
        self.decoded.as_ref()
    }

    pub fn report(&self) -> Option<&MigrationReport> {
        self.report.as_ref()
    }

    /// Message of the last failed step
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Read a settings file
    pub fn load(&mut self, path: impl AsRef<Path>) -> bool {
        let result = io::read_tree(path.as_ref());
        self.capture("load", result).map(|tree| self.tree = Some(tree)).is_some()
    }

    /// Decode the loaded tree into the store
    pub fn parse(&mut self) -> bool {
        let result = self.loaded_tree().and_then(|tree| self.mapper.decode(tree));
        self.capture("parse", result)
            .map(|summary| self.decoded = Some(summary))
            .is_some()
    }

    /// Port every stored entity to `target`
    pub fn migrate(&mut self, target: SchemaVersion) -> bool {
        let result = self.migrator.migrate(target);
        self.capture("migrate", result)
            .map(|report| self.report = Some(report))
            .is_some()
    }

    /// Encode the store into a fresh tree, replacing the current one
    pub fn build(&mut self) -> bool {
        let result = self.mapper.encode();
        self.capture("build", result).map(|tree| self.tree = Some(tree)).is_some()
    }

    /// Write the current tree
    pub fn save(&mut self, path: impl AsRef<Path>) -> bool {
        let result = self
            .loaded_tree()
            .and_then(|tree| io::write_tree(path.as_ref(), tree));
        self.capture("save", result).is_some()
    }

    fn loaded_tree(&self) -> Result<&Setting> {
        self.tree
            .as_ref()
            .ok_or_else(|| ShimError::Config("no settings tree loaded".to_string()))
    }

    fn capture<T>(&mut self, step: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                info!(step, "step completed");
                self.error = None;
                Some(value)
            }
            Err(e) => {
                error!(step, "{e}");
                self.error = Some(e.to_string());
                None
            }
        }
    }
}
