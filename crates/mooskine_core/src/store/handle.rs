//! Store handle: owns the persistent store and its two contexts.
//!
//! # Responsibility
//! - Open (and migrate) the named store, in memory or on disk.
//! - Hand out the main and background contexts.
//! - Run background work and the autosave loop.
//!
//! # Invariants
//! - Both contexts share one connection and merge each other's saves.
//! - The main context prefers stored values on conflict; the background
//!   context prefers its own edits.

use crate::autosave::{start_autosave, AutosaveHandle, DEFAULT_AUTOSAVE_INTERVAL_SECS};
use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory};
use crate::model::lifecycle::advance_past;
use crate::store::context::{ContextKind, ObjectContext, StoreCoordinator};
use crate::store::merge::MergePolicy;
use crate::store::records;
use crate::store::{StoreError, StoreResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

/// Where the store's rows live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

/// Entry point to a Mooskine store.
#[derive(Clone)]
pub struct StoreHandle {
    location: StoreLocation,
    autosave_interval_secs: f64,
    main: ObjectContext,
    background: ObjectContext,
}

impl StoreHandle {
    /// Opens the store described by `config`, creating its directory when
    /// needed and applying pending migrations.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let handle = match config.store_path() {
            Some(path) => Self::open_file(&path)?,
            None => Self::open_in_memory()?,
        };
        Ok(Self {
            autosave_interval_secs: config.autosave_interval_secs,
            ..handle
        })
    }

    /// Opens (or creates) a store file at `path`.
    pub fn open_file(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = open_db(path)?;
        Self::from_connection(conn, StoreLocation::File(path.to_path_buf()))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = open_db_in_memory()?;
        Self::from_connection(conn, StoreLocation::Memory)
    }

    /// Opens the store or terminates the process.
    ///
    /// A store that cannot be opened or migrated is unrecoverable.
    pub fn open_or_exit(config: &StoreConfig) -> Self {
        match Self::open(config) {
            Ok(handle) => handle,
            Err(err) => {
                error!(
                    "event=store_open module=store status=fatal model={} error={}",
                    config.model_name, err
                );
                eprintln!("fatal: cannot open store `{}`: {err}", config.model_name);
                log::logger().flush();
                std::process::exit(1);
            }
        }
    }

    fn from_connection(conn: Connection, location: StoreLocation) -> StoreResult<Self> {
        if let Some(newest) = records::max_creation_date(&conn)? {
            advance_past(newest);
        }

        let coordinator = StoreCoordinator::new(conn);
        let main = ObjectContext::new(
            coordinator.clone(),
            ContextKind::Main,
            MergePolicy::StoreTrump,
        )?;
        let background = ObjectContext::new(
            coordinator,
            ContextKind::Background,
            MergePolicy::ObjectTrump,
        )?;

        info!(
            "event=store_open module=store status=ok location={}",
            match &location {
                StoreLocation::Memory => "memory".to_string(),
                StoreLocation::File(path) => path.display().to_string(),
            }
        );

        Ok(Self {
            location,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            main,
            background,
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Autosave cadence from the opening config (default 30 s).
    pub fn autosave_interval_secs(&self) -> f64 {
        self.autosave_interval_secs
    }

    /// Context bound to the UI thread.
    pub fn main_context(&self) -> &ObjectContext {
        &self.main
    }

    /// Context for off-main edits.
    pub fn background_context(&self) -> &ObjectContext {
        &self.background
    }

    /// Runs `task` against the background context on the blocking pool.
    ///
    /// Must be called from a tokio runtime context.
    pub fn perform_background_task<F, T>(&self, task: F) -> JoinHandle<T>
    where
        F: FnOnce(&ObjectContext) -> T + Send + 'static,
        T: Send + 'static,
    {
        let context = self.background.clone();
        tokio::task::spawn_blocking(move || task(&context))
    }

    /// Starts the periodic flush of the main context at the configured
    /// cadence.
    ///
    /// Returns `None` when the interval is `<= 0` or no runtime is active.
    pub fn start_autosave(&self) -> Option<AutosaveHandle> {
        self.start_autosave_every(self.autosave_interval_secs)
    }

    /// Like [`StoreHandle::start_autosave`] with an explicit cadence.
    pub fn start_autosave_every(&self, interval_secs: f64) -> Option<AutosaveHandle> {
        start_autosave(self.main.clone(), interval_secs)
    }
}
