//! Database connection and initialization

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;
use crate::error::DiscoveryError;

/// Database wrapper with a thread-safe connection
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Opens (or creates) the database file at `path` and ensures the schema
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        db.initialize()?;

        Ok(db)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };

        db.initialize()?;

        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned during initialization"))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        schema::create_tables(&conn)?;
        Ok(())
    }

    /// Get a reference to the connection
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Locks the connection, mapping a poisoned mutex to a crate error
    pub fn lock(&self) -> crate::error::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DiscoveryError::Other(anyhow!("Database connection lock poisoned")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// `RACKSCAN_DB_PATH` if set, else the platform data directory
    pub fn default_path() -> PathBuf {
        if let Some(path) = crate::config::database_path() {
            return path;
        }

        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("rackscan").join("inventory.db")
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            path: self.path.clone(),
        }
    }
}
