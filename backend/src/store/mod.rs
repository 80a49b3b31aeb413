//! SQLite-backed record store.
//!
//! Opens a connection per operation, like the rest of the backend, and creates the
//! `records` table on first use. Read failures (missing file permissions, a file that
//! is not a database, a row with the wrong column types) are logged and read as empty.

use common::model::record::Record;
use common::store::{RecordStore, StoreError};
use log::warn;
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY NOT NULL,
    student_name TEXT NOT NULL,
    email TEXT NOT NULL,
    mobile_number TEXT NOT NULL,
    address TEXT NOT NULL,
    batch_number TEXT NOT NULL,
    course_name TEXT NOT NULL,
    course_start_date TEXT NOT NULL,
    course_end_date TEXT NOT NULL,
    certificate_issue_date TEXT NOT NULL,
    is_valid INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    certificate_url TEXT
)";

const SELECT_COLUMNS: &str = "SELECT id, student_name, email, mobile_number, address, batch_number,
    course_name, course_start_date, course_end_date, certificate_issue_date, is_valid, created_at,
    certificate_url FROM records";

#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn read_error(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
            StoreError::Corrupted(e.to_string())
        }
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == rusqlite::ErrorCode::NotADatabase =>
        {
            StoreError::Corrupted(e.to_string())
        }
        other => unavailable(other),
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        student_name: row.get(1)?,
        email: row.get(2)?,
        mobile_number: row.get(3)?,
        address: row.get(4)?,
        batch_number: row.get(5)?,
        course_name: row.get(6)?,
        course_start_date: row.get(7)?,
        course_end_date: row.get(8)?,
        certificate_issue_date: row.get(9)?,
        is_valid: row.get::<_, i64>(10)? != 0,
        created_at: row.get(11)?,
        certificate_url: row.get(12)?,
    })
}

impl SqliteRecordStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SqliteRecordStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(unavailable)?;
        conn.execute_batch(SCHEMA).map_err(read_error)?;
        Ok(conn)
    }

    fn try_list(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY rowid", SELECT_COLUMNS))
            .map_err(read_error)?;
        let rows = stmt.query_map([], record_from_row).map_err(read_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(read_error)
    }

    fn try_get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .map_err(read_error)?;
        let mut rows = stmt.query_map(params![id], record_from_row).map_err(read_error)?;
        rows.next().transpose().map_err(read_error)
    }
}

impl RecordStore for SqliteRecordStore {
    fn list(&self) -> Vec<Record> {
        self.try_list().unwrap_or_else(|e| {
            warn!("Reading records from {} failed: {}", self.path.display(), e);
            Vec::new()
        })
    }

    fn insert(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut conn = self.open()?;
        let tx = conn.transaction().map_err(unavailable)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO records (id, student_name, email, mobile_number, address,
                     batch_number, course_name, course_start_date, course_end_date,
                     certificate_issue_date, is_valid, created_at, certificate_url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(unavailable)?;
            for r in records {
                stmt.execute(params![
                    r.id,
                    r.student_name,
                    r.email,
                    r.mobile_number,
                    r.address,
                    r.batch_number,
                    r.course_name,
                    r.course_start_date,
                    r.course_end_date,
                    r.certificate_issue_date,
                    r.is_valid as i64,
                    r.created_at,
                    r.certificate_url,
                ])
                .map_err(unavailable)?;
            }
        }
        tx.commit().map_err(unavailable)
    }

    fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute("DELETE FROM records WHERE id = ?1", params![id])
            .map_err(unavailable)?;
        Ok(())
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute("DELETE FROM records", []).map_err(unavailable)?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Option<Record> {
        self.try_get(id).unwrap_or_else(|e| {
            warn!("Looking up record {} failed: {}", id, e);
            None
        })
    }
}
