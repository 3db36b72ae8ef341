//! Persisted record store.
//!
//! A store holds one *region*: a table whose first row is the header
//! [`HEADER`](crate::record::HEADER) and whose data rows follow in stored
//! order. The pipeline only needs the operations of [`Store`]; any backend
//! that can read a range, overwrite a range and append rows will do.

pub mod sqlite;

use std::collections::HashSet;

use tracing::info;

use crate::error::StoreError;
use crate::record::Record;

/// Rows and identity keys as they were before this run wrote anything.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub rows: Vec<Record>,
    pub keys: HashSet<String>,
}

impl Snapshot {
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let keys = rows.iter().map(|r| r.url.clone()).collect();
        Snapshot { rows, keys }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rows: usize,
    pub distinct_urls: usize,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

pub trait Store {
    /// All data rows in stored order. `Uninitialized` if the region is absent.
    fn read_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Create the region with its header. No-op when it already exists.
    fn initialize(&self) -> Result<(), StoreError>;

    /// Add rows after the existing ones, skipping urls already stored.
    /// Returns the number written.
    fn append_many(&self, records: &[Record]) -> Result<usize, StoreError>;

    /// Overwrite the whole data region with `records` followed by
    /// `existing_tail`, cut to `max_size` rows, atomically. `existing_tail`
    /// must be what the region holds now, otherwise `Conflict`.
    fn replace_window(
        &self,
        records: &[Record],
        existing_tail: &[Record],
        max_size: usize,
    ) -> Result<usize, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Read the run-start snapshot, creating the region on first use.
    fn read_snapshot(&self) -> Result<Snapshot, StoreError> {
        match self.read_all() {
            Ok(rows) => Ok(Snapshot::from_rows(rows)),
            Err(StoreError::Uninitialized { region }) => {
                info!(region = %region, "store region missing, creating it");
                self.initialize()?;
                Ok(Snapshot::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Stored rows without touching the store. A missing region reads as empty.
    fn read_existing(&self) -> Result<Vec<Record>, StoreError> {
        match self.read_all() {
            Err(StoreError::Uninitialized { .. }) => Ok(Vec::new()),
            other => other,
        }
    }
}

impl<S: Store + ?Sized> Store for &S {
    fn read_all(&self) -> Result<Vec<Record>, StoreError> {
        (**self).read_all()
    }

    fn initialize(&self) -> Result<(), StoreError> {
        (**self).initialize()
    }

    fn append_many(&self, records: &[Record]) -> Result<usize, StoreError> {
        (**self).append_many(records)
    }

    fn replace_window(
        &self,
        records: &[Record],
        existing_tail: &[Record],
        max_size: usize,
    ) -> Result<usize, StoreError> {
        (**self).replace_window(records, existing_tail, max_size)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        (**self).stats()
    }
}

/// `take(concat(records, existing_tail), max_size)`.
pub fn window<'a>(records: &'a [Record], existing_tail: &'a [Record], max_size: usize) -> Vec<&'a Record> {
    records.iter().chain(existing_tail).take(max_size).collect()
}
