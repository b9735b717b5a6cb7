#![forbid(unsafe_code)]

//! SQLite storage for the Refmint affiliate platform.
//!
//! The interesting part lives in [`bootstrap`]: a schema
//! reconciliation pass that runs on every open and converges whatever
//! database it finds (fresh, half-migrated, current) to the compiled-in
//! target without a migration ledger. The rest of the application
//! queries the converged schema through the connection this crate
//! hands out.

pub mod bootstrap;

pub use bootstrap::{BootstrapError, BootstrapReport, StepFailure, bootstrap};

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "refmint.db";

#[derive(Debug)]
pub struct Store {
    conn: Connection,
    storage_dir: PathBuf,
    report: BootstrapReport,
}

impl Store {
    /// Opens (creating if needed) the database under `storage_dir` and
    /// runs the bootstrap pass. A fatal bootstrap error means the
    /// schema cannot be guaranteed; callers must treat it as a reason
    /// not to serve traffic.
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let mut conn = Connection::open(db_path).map_err(BootstrapError::Connection)?;
        configure(&conn)?;

        let report = bootstrap(&mut conn)?;
        Ok(Self {
            conn,
            storage_dir,
            report,
        })
    }

    /// In-memory variant for tests and tooling.
    pub fn open_in_memory() -> Result<Self, BootstrapError> {
        let mut conn = Connection::open_in_memory().map_err(BootstrapError::Connection)?;
        configure(&conn)?;

        let report = bootstrap(&mut conn)?;
        Ok(Self {
            conn,
            storage_dir: PathBuf::new(),
            report,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// What the opening bootstrap pass changed.
    pub fn bootstrap_report(&self) -> &BootstrapReport {
        &self.report
    }

    /// The live connection. Borrowed by the rest of the application;
    /// the bootstrap engine never closes it.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Re-runs the reconciliation pass on the open connection. Safe to
    /// call any number of times; a converged database reports zero
    /// mutations.
    pub fn reconcile(&mut self) -> Result<BootstrapReport, BootstrapError> {
        bootstrap(&mut self.conn)
    }
}

fn configure(conn: &Connection) -> Result<(), BootstrapError> {
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(BootstrapError::Connection)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(BootstrapError::Connection)?;
    Ok(())
}
