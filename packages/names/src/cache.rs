//! Persistent variable name cache stored in `SQLite`.
//!
//! A single `vars` table of `{name, kind, apicode}` rows, queried by
//! exact case-insensitive match on either side. Created if absent;
//! appended to when an account's custom fields are pulled in.

use std::path::Path;
use std::str::FromStr as _;

use ga_query_models::{ResolvedVariable, VariableKind};
use rusqlite::Connection;

use crate::NameError;

/// Handle to the local name cache table.
#[derive(Debug)]
pub struct NameCache {
    conn: Connection,
}

impl NameCache {
    /// Opens (or creates) the cache at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, NameError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory cache, used by tests and throwaway lookups.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, NameError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// `true` when the cache holds no entries at all (never seeded).
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the query fails.
    pub fn is_empty(&self) -> Result<bool, NameError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vars", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Appends records to the cache.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the insert fails.
    pub fn insert(&self, records: &[ResolvedVariable]) -> Result<(), NameError> {
        let mut stmt = self
            .conn
            .prepare("INSERT INTO vars (name, kind, apicode) VALUES (?1, ?2, ?3)")?;
        for record in records {
            stmt.execute(rusqlite::params![
                record.name,
                record.kind.to_string(),
                record.api_code
            ])?;
        }
        Ok(())
    }

    /// Replaces the entire cache contents with the given records.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the delete or insert fails.
    pub fn replace_all(&self, records: &[ResolvedVariable]) -> Result<(), NameError> {
        self.conn.execute("DELETE FROM vars", [])?;
        self.insert(records)
    }

    /// Looks up a record by exact case-insensitive API code.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the query fails.
    pub fn lookup_by_api_code(&self, code: &str) -> Result<Option<ResolvedVariable>, NameError> {
        self.lookup("SELECT name, kind, apicode FROM vars WHERE LOWER(apicode) = LOWER(?1)", code)
    }

    /// Looks up a record by exact case-insensitive display name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the query fails.
    pub fn lookup_by_name(&self, name: &str) -> Result<Option<ResolvedVariable>, NameError> {
        self.lookup("SELECT name, kind, apicode FROM vars WHERE LOWER(name) = LOWER(?1)", name)
    }

    /// `true` when any account-specific custom entries are present.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the query fails.
    pub fn has_custom_entries(&self) -> Result<bool, NameError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM vars WHERE kind IN (?1, ?2)",
            rusqlite::params![
                VariableKind::CustomDimension.to_string(),
                VariableKind::CustomMetric.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Removes all account-specific custom entries, keeping the standard
    /// catalog intact.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the delete fails.
    pub fn remove_custom_entries(&self) -> Result<(), NameError> {
        self.conn.execute(
            "DELETE FROM vars WHERE kind IN (?1, ?2)",
            rusqlite::params![
                VariableKind::CustomDimension.to_string(),
                VariableKind::CustomMetric.to_string()
            ],
        )?;
        Ok(())
    }

    fn lookup(&self, sql: &str, key: &str) -> Result<Option<ResolvedVariable>, NameError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map([key], |row| {
            let kind: String = row.get(1)?;
            Ok(ResolvedVariable {
                name: row.get(0)?,
                kind: VariableKind::from_str(&kind).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                api_code: row.get(2)?,
            })
        })?;
        rows.next().transpose().map_err(NameError::from)
    }
}

fn create_schema(conn: &Connection) -> Result<(), NameError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS vars (
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            apicode TEXT NOT NULL
        );",
    )?;
    Ok(())
}
