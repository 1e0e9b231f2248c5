use std::path::{Path, PathBuf};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params, OptionalExtension};
use rusqlite::types::Value;
use shared::types::{PortRecord, StoreStatus};
use crate::error::{Result, StoreError};
use crate::query::Predicate;

const META_IMPORTED_AT: &str = "imported_at";
const META_SOURCE: &str = "source";

/// Tables every port database carries
const REQUIRED_TABLES: [&str; 2] = ["ports", "meta"];

pub struct PortDb {
    conn: Connection,
}

impl PortDb {
    /// Open or create the SQLite database for writing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ports (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL,
                port        INTEGER NOT NULL CHECK (port BETWEEN 0 AND 65535),
                protocol    TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_ports_port ON ports(port);
            CREATE INDEX IF NOT EXISTS idx_ports_name ON ports(name);
            CREATE INDEX IF NOT EXISTS idx_ports_protocol ON ports(protocol);

            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        tracing::debug!("Opened port database at {}", path.display());
        Ok(Self { conn })
    }

    /// Open an already imported database read-only.
    ///
    /// A missing file is reported as `StoreError::Missing` instead of being
    /// created, and a SQLite file without the port tables as
    /// `StoreError::Schema`. The file is never modified.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !Self::exists(path) {
            return Err(StoreError::Missing(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        check_schema(&conn, path)?;

        tracing::debug!("Opened port database at {} read-only", path.display());
        Ok(Self { conn })
    }

    /// Whether a database file has been created at `path`
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Replace the whole record set in one transaction. Returns the number of
    /// records written. Insertion order is kept as the natural result order.
    pub fn replace_all(&mut self, records: &[PortRecord], source: Option<&Path>) -> Result<usize> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM ports", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ports (name, port, protocol, description) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                stmt.execute(params![
                    &record.name,
                    record.port,
                    &record.protocol,
                    &record.description,
                ])?;
            }
        }

        upsert_meta(&tx, META_IMPORTED_AT, &Utc::now().to_rfc3339())?;
        match source {
            Some(source) => upsert_meta(&tx, META_SOURCE, &source.to_string_lossy())?,
            None => {
                tx.execute("DELETE FROM meta WHERE key = ?1", params![META_SOURCE])?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    /// Get raw records matching a predicate, in insertion order
    pub fn filter(&self, predicate: &Predicate) -> Result<Vec<PortRecord>> {
        let (clause, value) = match predicate {
            Predicate::PortEquals(port) => ("port = ?1", Value::Integer(i64::from(*port))),
            Predicate::NameEquals(name) => ("name = ?1", Value::Text(name.clone())),
            Predicate::PortContains(fragment) => (
                "(?1 = '' OR instr(CAST(port AS TEXT), ?1) > 0)",
                Value::Text(fragment.clone()),
            ),
            Predicate::NameContains(fragment) => (
                "(?1 = '' OR instr(name, ?1) > 0)",
                Value::Text(fragment.clone()),
            ),
        };

        self.select_where(clause, value)
    }

    /// Get raw records whose protocol equals `protocol` exactly, in insertion order
    pub fn filter_protocol(&self, protocol: &str) -> Result<Vec<PortRecord>> {
        self.select_where("protocol = ?1", Value::Text(protocol.to_string()))
    }

    /// Record count and import metadata
    pub fn status(&self) -> Result<StoreStatus> {
        let records: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ports", [], |row| row.get(0))?;

        let imported_at = self
            .meta(META_IMPORTED_AT)?
            .map(|value| {
                chrono::DateTime::parse_from_rfc3339(&value)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    ))
            })
            .transpose()?;

        let source = self.meta(META_SOURCE)?.map(PathBuf::from);

        Ok(StoreStatus {
            records: records as u64,
            imported_at,
            source,
        })
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// `clause` is always one of the fixed fragments above, never caller input
    fn select_where(&self, clause: &str, value: Value) -> Result<Vec<PortRecord>> {
        let sql = format!(
            "SELECT name, port, protocol, description FROM ports WHERE {} ORDER BY id",
            clause
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let records = stmt
            .query_map(params![value], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Helper to convert a database row to PortRecord
    fn row_to_record(row: &rusqlite::Row) -> std::result::Result<PortRecord, rusqlite::Error> {
        Ok(PortRecord {
            name: row.get(0)?,
            port: row.get::<_, u16>(1)?,
            protocol: row.get(2)?,
            description: row.get(3)?,
        })
    }
}

fn check_schema(conn: &Connection, path: &Path) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for table in REQUIRED_TABLES {
        if !tables.iter().any(|name| name == table) {
            return Err(StoreError::Schema {
                path: path.to_path_buf(),
                table,
            });
        }
    }
    Ok(())
}

fn upsert_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}
