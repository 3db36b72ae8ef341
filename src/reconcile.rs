use crate::error::StoreError;
use crate::record::Record;
use crate::store::{window, Snapshot, Store};

/// How new records are merged into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Append at the end; the store grows without bound.
    Append,
    /// Newest first, capped at `max_size` rows; the oldest rows fall off.
    RollingWindow { max_size: usize },
}

/// The single write a run will perform.
#[derive(Debug, PartialEq, Eq)]
pub enum WritePlan {
    Nothing,
    Append(Vec<Record>),
    ReplaceWindow {
        records: Vec<Record>,
        existing: Vec<Record>,
        max_size: usize,
    },
}

pub fn plan(new_records: Vec<Record>, snapshot: Snapshot, policy: Policy) -> WritePlan {
    if new_records.is_empty() {
        return WritePlan::Nothing;
    }
    match policy {
        Policy::Append => WritePlan::Append(new_records),
        Policy::RollingWindow { max_size } => WritePlan::ReplaceWindow {
            records: new_records,
            existing: snapshot.rows,
            max_size,
        },
    }
}

impl WritePlan {
    /// New rows that will be in the store once the plan is applied.
    pub fn new_rows(&self) -> usize {
        match self {
            WritePlan::Nothing => 0,
            WritePlan::Append(records) => records.len(),
            WritePlan::ReplaceWindow { records, max_size, .. } => records.len().min(*max_size),
        }
    }

    /// Total rows the store will hold afterwards, when the plan decides it.
    pub fn resulting_rows(&self) -> Option<usize> {
        match self {
            WritePlan::ReplaceWindow { records, existing, max_size } => {
                Some(window(records, existing, *max_size).len())
            }
            _ => None,
        }
    }
}

/// Perform the plan. Returns how many of this run's records were persisted.
pub fn apply<S: Store>(plan: &WritePlan, store: &S) -> Result<usize, StoreError> {
    match plan {
        WritePlan::Nothing => Ok(0),
        WritePlan::Append(records) => store.append_many(records),
        WritePlan::ReplaceWindow { records, existing, max_size } => {
            store.replace_window(records, existing, *max_size)?;
            Ok(plan.new_rows())
        }
    }
}
