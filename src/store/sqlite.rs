use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use super::{window, Store, StoreStats};
use crate::error::StoreError;
use crate::record::{Record, HEADER};

static REGION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Row 1 of a region is its header, so data starts at row 2.
const FIRST_DATA_ROW: i64 = 2;

/// A store region kept as one SQLite table. The store identifier is the file path.
pub struct SqliteStore {
    conn: Connection,
    region: String,
}

impl SqliteStore {
    pub fn open(path: &str, region: &str) -> Result<Self, StoreError> {
        check_region(region)?;
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Directory {
                path: dir.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_string(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(StoreError::Read)?;
        Ok(SqliteStore { conn, region: region.to_string() })
    }

    #[cfg(test)]
    pub fn open_in_memory(region: &str) -> Result<Self, StoreError> {
        check_region(region)?;
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Ok(SqliteStore { conn, region: region.to_string() })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Take the write lock up front so the region cannot change under us.
    fn begin_write(&self) -> Result<Transaction<'_>, StoreError> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate).map_err(StoreError::Write)
    }

    fn exists(&self) -> Result<bool, StoreError> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.region],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(StoreError::Read)
    }

    /// Fail with `Uninitialized` or `Schema` unless the region is usable.
    fn check_region_ready(&self) -> Result<(), StoreError> {
        if !self.exists()? {
            return Err(StoreError::Uninitialized { region: self.region.clone() });
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{}\")", self.region))
            .map_err(StoreError::Read)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(StoreError::Read)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Read)?;

        match HEADER.iter().find(|h| !columns.iter().any(|c| c == *h)) {
            Some(missing) => Err(StoreError::Schema {
                region: self.region.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn check_region(region: &str) -> Result<(), StoreError> {
    if REGION_RE.is_match(region) {
        Ok(())
    } else {
        Err(StoreError::InvalidRegion(region.to_string()))
    }
}

impl Store for SqliteStore {
    fn read_all(&self) -> Result<Vec<Record>, StoreError> {
        self.check_region_ready()?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT date, title, url, source FROM \"{}\" ORDER BY row",
                self.region
            ))
            .map_err(StoreError::Read)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Record {
                    date: row.get(0)?,
                    title: row.get(1)?,
                    url: row.get(2)?,
                    source: row.get(3)?,
                })
            })
            .map_err(StoreError::Read)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Read)?;
        Ok(rows)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&format!(
                "
                CREATE TABLE IF NOT EXISTS \"{region}\" (
                    row     INTEGER PRIMARY KEY,
                    date    TEXT NOT NULL,
                    title   TEXT NOT NULL,
                    url     TEXT NOT NULL,
                    source  TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS \"uniq_{region}_url\" ON \"{region}\"(url);
                ",
                region = self.region
            ))
            .map_err(StoreError::Write)
    }

    fn append_many(&self, records: &[Record]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.begin_write()?;
        let mut count = 0;
        {
            // A url stored by an overlapping run since our snapshot is skipped.
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO \"{region}\" (row, date, title, url, source)
                     SELECT COALESCE(MAX(row), ?1 - 1) + 1, ?2, ?3, ?4, ?5 FROM \"{region}\" WHERE true
                     ON CONFLICT(url) DO NOTHING",
                    region = self.region
                ))
                .map_err(StoreError::Write)?;
            for r in records {
                count += stmt
                    .execute(params![FIRST_DATA_ROW, r.date, r.title, r.url, r.source])
                    .map_err(StoreError::Write)?;
            }
        }
        tx.commit().map_err(StoreError::Write)?;
        debug!(region = %self.region, count, skipped = records.len() - count, "appended rows");
        Ok(count)
    }

    fn replace_window(
        &self,
        records: &[Record],
        existing_tail: &[Record],
        max_size: usize,
    ) -> Result<usize, StoreError> {
        let rows = window(records, existing_tail, max_size);

        let tx = self.begin_write()?;
        let mut count = 0;
        {
            let mut current_stmt = tx
                .prepare(&format!("SELECT url FROM \"{}\" ORDER BY row", self.region))
                .map_err(StoreError::Read)?;
            let current = current_stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(StoreError::Read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::Read)?;
            if !current.iter().eq(existing_tail.iter().map(|r| &r.url)) {
                return Err(StoreError::Conflict { region: self.region.clone() });
            }

            tx.execute(&format!("DELETE FROM \"{}\"", self.region), [])
                .map_err(StoreError::Write)?;
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO \"{}\" (row, date, title, url, source) VALUES (?1, ?2, ?3, ?4, ?5)",
                    self.region
                ))
                .map_err(StoreError::Write)?;
            for (i, r) in rows.iter().enumerate() {
                count += stmt
                    .execute(params![FIRST_DATA_ROW + i as i64, r.date, r.title, r.url, r.source])
                    .map_err(StoreError::Write)?;
            }
        }
        tx.commit().map_err(StoreError::Write)?;
        debug!(region = %self.region, count, max_size, "rewrote window");
        Ok(count)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        self.check_region_ready()?;
        self.conn
            .query_row(
                &format!(
                    "SELECT COUNT(*), COUNT(DISTINCT url), MIN(date), MAX(date) FROM \"{}\"",
                    self.region
                ),
                [],
                |r| {
                    Ok(StoreStats {
                        rows: r.get(0)?,
                        distinct_urls: r.get(1)?,
                        oldest: r.get(2)?,
                        newest: r.get(3)?,
                    })
                },
            )
            .map_err(StoreError::Read)
    }
}
