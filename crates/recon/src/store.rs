use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::column::cell_address;
use crate::error::StoreError;

/// One read of a store: the tab the rows came from, header row first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Empty for stores without named tabs.
    pub sheet: String,
    pub rows: Vec<Vec<String>>,
}

/// Tabular row store: the sheet the engine reads from and writes back to.
///
/// `fetch_all` returns every row of the sheet. Rows may be ragged; trailing
/// empty cells are commonly omitted by remote stores. `write_cell` is a
/// single mutation of one cell in `sheet`, the tab named by the snapshot the
/// run is working from; `row_position` is 1-based and `column_index` 0-based.
pub trait RowStore: Send + Sync {
    fn fetch_all(&self) -> Result<Snapshot, StoreError>;

    fn write_cell(
        &self,
        sheet: &str,
        row_position: usize,
        column_index: usize,
        value: &str,
    ) -> Result<(), StoreError>;
}

/// In-memory [`RowStore`]. Writes land in the held rows, so a second run
/// observes the first run's completion markers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
    writes: Mutex<Vec<(usize, usize, String)>>,
    rejected_rows: Mutex<HashSet<usize>>,
    unavailable: Mutex<Option<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Convenience constructor from string literals.
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    /// Make every write to `row_position` fail with `WriteRejected`.
    pub fn reject_writes_to(&self, row_position: usize) {
        lock(&self.rejected_rows).insert(row_position);
    }

    /// Make `fetch_all` fail with `Unavailable`.
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *lock(&self.unavailable) = Some(reason.into());
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        lock(&self.rows).clone()
    }

    /// Successful writes as `(row_position, column_index, value)`, in order.
    pub fn writes(&self) -> Vec<(usize, usize, String)> {
        lock(&self.writes).clone()
    }

    /// Current value of a cell, `""` when absent.
    pub fn cell(&self, row_position: usize, column_index: usize) -> String {
        lock(&self.rows)
            .get(row_position.wrapping_sub(1))
            .and_then(|r| r.get(column_index))
            .cloned()
            .unwrap_or_default()
    }
}

impl RowStore for MemoryStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        if let Some(reason) = lock(&self.unavailable).clone() {
            return Err(StoreError::Unavailable(reason));
        }
        Ok(Snapshot { sheet: String::new(), rows: self.rows() })
    }

    fn write_cell(
        &self,
        sheet: &str,
        row_position: usize,
        column_index: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        if row_position == 0 || lock(&self.rejected_rows).contains(&row_position) {
            return Err(StoreError::WriteRejected {
                range: cell_address(sheet, column_index, row_position),
                reason: "rejected by store".to_string(),
            });
        }

        let mut rows = lock(&self.rows);
        if rows.len() < row_position {
            rows.resize_with(row_position, Vec::new);
        }
        let row = &mut rows[row_position - 1];
        if row.len() <= column_index {
            row.resize(column_index + 1, String::new());
        }
        row[column_index] = value.to_string();
        drop(rows);

        lock(&self.writes).push((row_position, column_index, value.to_string()));
        Ok(())
    }
}
