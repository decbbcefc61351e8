//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations::{self, Migration};

/// Database wrapper for libSQL connections
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it (and its parent
    /// directory) if it doesn't exist.
    ///
    /// Runs the given migrations automatically.
    pub async fn open(path: impl AsRef<Path>, migrations: &[Migration]) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::initialize(db, migrations, true).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory(migrations: &[Migration]) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::initialize(db, migrations, false).await
    }

    async fn initialize(
        db: LibSqlDatabase,
        migrations: &[Migration],
        on_disk: bool,
    ) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self { _db: db, conn };
        database.configure(on_disk).await?;
        migrations::run(&database.conn, migrations).await?;
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    async fn configure(&self, on_disk: bool) -> Result<()> {
        if on_disk {
            // journal_mode returns a row; some builds reject it through execute
            self.conn
                .query("PRAGMA journal_mode = WAL;", ())
                .await
                .ok();
            self.conn
                .execute("PRAGMA synchronous = NORMAL;", ())
                .await
                .ok();
        }
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LOCAL_STORE_MIGRATIONS;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory(LOCAL_STORE_MIGRATIONS)
            .await
            .unwrap();
        let version = migrations::get_version(db.connection()).await.unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("till.db");

        let db = Database::open(&db_path, LOCAL_STORE_MIGRATIONS).await.unwrap();
        drop(db);

        assert!(db_path.exists());
    }
}
