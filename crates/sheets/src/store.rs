use autoreply_recon::column::{cell_range, columns_range};
use autoreply_recon::{RowStore, Snapshot, StoreError};

use crate::client::{SheetsClient, SheetsError};

/// [`RowStore`] over one tab of a Google spreadsheet.
///
/// With no configured tab name, the first tab is looked up on every
/// `fetch_all`. Writes go to the tab named by the caller's snapshot, never
/// to whatever a later read resolved.
pub struct SheetStore {
    client: SheetsClient,
    sheet_name: Option<String>,
    read_columns: String,
}

impl SheetStore {
    pub fn new(client: SheetsClient, sheet_name: Option<String>, read_columns: &str) -> Self {
        Self {
            client,
            sheet_name: sheet_name.filter(|s| !s.trim().is_empty()),
            read_columns: read_columns.to_string(),
        }
    }

    fn resolve_sheet(&self) -> Result<String, SheetsError> {
        match &self.sheet_name {
            Some(name) => Ok(name.clone()),
            None => self.client.first_sheet_title(),
        }
    }
}

impl RowStore for SheetStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        let sheet = self
            .resolve_sheet()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let range = columns_range(&sheet, &self.read_columns);
        log::debug!("reading {} from spreadsheet {}", range, self.client.spreadsheet_id());

        let rows = self
            .client
            .get_values(&range)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        log::debug!("read {} row(s)", rows.len());
        Ok(Snapshot { sheet, rows })
    }

    fn write_cell(
        &self,
        sheet: &str,
        row_position: usize,
        column_index: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        let range = cell_range(sheet, column_index, row_position);

        self.client
            .update_values(&range, &[vec![value.to_string()]])
            .map_err(|e| StoreError::WriteRejected {
                range: range.clone(),
                reason: e.to_string(),
            })
    }
}
