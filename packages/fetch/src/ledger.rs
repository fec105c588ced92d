//! Crash recovery ledger.
//!
//! Rows of completed units of work are appended to a local database as
//! a run progresses. A run that aborts mid-way (sampling failure, crash)
//! leaves the ledger behind so the completed portion is not lost; a run
//! that completes cleanly discards it.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::FetchError;

/// Default ledger location, relative to the working directory.
pub const DEFAULT_LEDGER_PATH: &str = "partial_results.db";

/// Append-only store of fetched rows, keyed by query name.
#[derive(Debug)]
pub struct RecoveryLedger {
    conn: Connection,
    path: Option<PathBuf>,
}

impl RecoveryLedger {
    /// Opens (or creates) the ledger at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the location cannot be created or the
    /// database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, FetchError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// An in-memory ledger, for tests. Nothing survives a crash.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the database cannot be created.
    pub fn open_in_memory() -> Result<Self, FetchError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// The on-disk location, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends the rows of one completed unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the insert fails.
    pub fn append_rows(&mut self, query_name: &str, rows: &[Vec<String>]) -> Result<(), FetchError> {
        let tx = self.conn.transaction()?;
        {
            let mut statement =
                tx.prepare("INSERT INTO partial_results (query_name, row) VALUES (?1, ?2)")?;
            for row in rows {
                statement.execute((query_name, serde_json::to_string(row)?))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All retained rows for `query_name`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the query fails or a stored row cannot
    /// be decoded.
    pub fn rows(&self, query_name: &str) -> Result<Vec<Vec<String>>, FetchError> {
        let mut statement = self
            .conn
            .prepare("SELECT row FROM partial_results WHERE query_name = ?1 ORDER BY id")?;
        let stored = statement
            .query_map([query_name], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        stored
            .iter()
            .map(|row| Ok(serde_json::from_str(row)?))
            .collect()
    }

    /// Whether any rows have been retained, across all queries.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the query fails.
    pub fn has_rows(&self) -> Result<bool, FetchError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM partial_results", [], |r| r.get(0))?;
        Ok(count > 0)
    }

    /// Deletes the ledger after a clean completion.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the file cannot be removed.
    pub fn discard(self) -> Result<(), FetchError> {
        let Self { conn, path } = self;
        drop(conn);
        if let Some(path) = path
            && path.exists()
        {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS partial_results (
            id INTEGER PRIMARY KEY,
            query_name TEXT NOT NULL,
            row TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn rows_come_back_in_insertion_order() {
        let mut ledger = RecoveryLedger::open_in_memory().unwrap();
        ledger
            .append_rows("Query 0", &[row(&["2024-01-02", "5"])])
            .unwrap();
        ledger
            .append_rows("Query 0", &[row(&["2024-01-01", "3"])])
            .unwrap();

        assert!(ledger.has_rows().unwrap());
        assert_eq!(
            ledger.rows("Query 0").unwrap(),
            vec![row(&["2024-01-02", "5"]), row(&["2024-01-01", "3"])]
        );
    }

    #[test]
    fn rows_are_partitioned_by_query_name() {
        let mut ledger = RecoveryLedger::open_in_memory().unwrap();
        ledger.append_rows("a", &[row(&["1"])]).unwrap();
        ledger.append_rows("b", &[row(&["2"])]).unwrap();
        assert_eq!(ledger.rows("a").unwrap(), vec![row(&["1"])]);
        assert_eq!(ledger.rows("b").unwrap(), vec![row(&["2"])]);
    }

    #[test]
    fn discard_removes_the_backing_file() {
        let path = std::env::temp_dir().join(format!(
            "ga_query_ledger_discard_{}.db",
            std::process::id()
        ));
        let mut ledger = RecoveryLedger::open(&path).unwrap();
        ledger.append_rows("a", &[row(&["1"])]).unwrap();
        assert!(path.exists());

        ledger.discard().unwrap();
        assert!(!path.exists());
    }
}
