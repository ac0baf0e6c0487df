use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HistoryError, HistoryResult};

pub type PrintId = i64;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS prints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    print_date TEXT NOT NULL,
    file_name TEXT NOT NULL,
    print_type TEXT NOT NULL,
    image_file TEXT
);
CREATE TABLE IF NOT EXISTS filament_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    print_id INTEGER NOT NULL,
    spool_id INTEGER,
    filament_type TEXT NOT NULL,
    color TEXT NOT NULL,
    grams_used REAL NOT NULL,
    ams_slot INTEGER NOT NULL,
    FOREIGN KEY (print_id) REFERENCES prints (id) ON DELETE CASCADE
);
";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrint {
    pub file_name: String,
    pub print_type: String,
    pub image_file: Option<String>,
    /// Defaults to the current local time.
    pub print_date: Option<String>,
}

impl NewPrint {
    pub fn new(file_name: impl Into<String>, print_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            print_type: print_type.into(),
            image_file: None,
            print_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFilamentUsage {
    pub slot: u32,
    pub filament_type: String,
    pub color: String,
    pub grams_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentUsageRecord {
    pub spool_id: Option<i64>,
    pub filament_type: String,
    pub color: String,
    pub grams_used: f64,
    pub ams_slot: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRecord {
    pub id: PrintId,
    pub print_date: String,
    pub file_name: String,
    pub print_type: String,
    pub image_file: Option<String>,
    pub filament: Vec<FilamentUsageRecord>,
}

/// SQLite-backed print history.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> HistoryResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HistoryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> HistoryResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> HistoryResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn insert_print(&self, print: &NewPrint) -> HistoryResult<PrintId> {
        let date = print
            .print_date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format(DATE_FORMAT).to_string());
        self.conn.execute(
            "INSERT INTO prints (print_date, file_name, print_type, image_file)
             VALUES (?1, ?2, ?3, ?4)",
            params![date, print.file_name, print.print_type, print.image_file],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(print = id, file = %print.file_name, "print recorded");
        Ok(id)
    }

    pub fn insert_filament_usage(
        &self,
        print_id: PrintId,
        usage: &NewFilamentUsage,
    ) -> HistoryResult<()> {
        self.conn.execute(
            "INSERT INTO filament_usage (print_id, filament_type, color, grams_used, ams_slot)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                print_id,
                usage.filament_type,
                usage.color,
                usage.grams_used,
                usage.slot
            ],
        )?;
        Ok(())
    }

    /// Attach the supplying spool to a slot's usage row. Returns the number of
    /// rows updated.
    pub fn update_filament_spool(
        &self,
        print_id: PrintId,
        slot: u32,
        spool_id: i64,
    ) -> HistoryResult<usize> {
        let updated = self.conn.execute(
            "UPDATE filament_usage SET spool_id = ?1 WHERE ams_slot = ?2 AND print_id = ?3",
            params![spool_id, slot, print_id],
        )?;
        Ok(updated)
    }

    /// All prints, newest first, with their filament usage.
    pub fn prints_with_filament(&self) -> HistoryResult<Vec<PrintRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, print_date, file_name, print_type, image_file
             FROM prints ORDER BY print_date DESC, id DESC",
        )?;
        let prints = stmt
            .query_map([], print_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.with_usage(prints)
    }

    /// Prints that consumed filament from `spool_id`.
    pub fn prints_by_spool(&self, spool_id: i64) -> HistoryResult<Vec<PrintRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT p.id, p.print_date, p.file_name, p.print_type, p.image_file
             FROM prints p JOIN filament_usage f ON p.id = f.print_id
             WHERE f.spool_id = ?1
             ORDER BY p.print_date DESC, p.id DESC",
        )?;
        let prints = stmt
            .query_map([spool_id], print_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.with_usage(prints)
    }

    pub fn filament_for_slot(
        &self,
        print_id: PrintId,
        slot: u32,
    ) -> HistoryResult<Option<FilamentUsageRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT spool_id, filament_type, color, grams_used, ams_slot
                 FROM filament_usage WHERE print_id = ?1 AND ams_slot = ?2",
                params![print_id, slot],
                usage_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Remove a print; its usage rows go with it.
    pub fn delete_print(&self, print_id: PrintId) -> HistoryResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM prints WHERE id = ?1", [print_id])?;
        Ok(deleted > 0)
    }

    fn usage_for(&self, print_id: PrintId) -> HistoryResult<Vec<FilamentUsageRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT spool_id, filament_type, color, grams_used, ams_slot
             FROM filament_usage WHERE print_id = ?1 ORDER BY ams_slot, id",
        )?;
        let rows = stmt
            .query_map([print_id], usage_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn with_usage(&self, mut prints: Vec<PrintRecord>) -> HistoryResult<Vec<PrintRecord>> {
        for print in prints.iter_mut() {
            print.filament = self.usage_for(print.id)?;
        }
        Ok(prints)
    }
}

fn print_from_row(row: &Row<'_>) -> rusqlite::Result<PrintRecord> {
    Ok(PrintRecord {
        id: row.get(0)?,
        print_date: row.get(1)?,
        file_name: row.get(2)?,
        print_type: row.get(3)?,
        image_file: row.get(4)?,
        filament: Vec::new(),
    })
}

fn usage_from_row(row: &Row<'_>) -> rusqlite::Result<FilamentUsageRecord> {
    Ok(FilamentUsageRecord {
        spool_id: row.get(0)?,
        filament_type: row.get(1)?,
        color: row.get(2)?,
        grams_used: row.get(3)?,
        ams_slot: row.get(4)?,
    })
}
