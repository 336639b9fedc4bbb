//! Preview and execute: the two operations the outer surfaces call.

use std::sync::{Arc, Mutex, TryLockError};

use serde::Serialize;

use crate::engine::{self, RunContext, COMPLETION_MARKER};
use crate::error::ReconError;
use crate::model::{records_from_rows, BatchResult, Record, Schema};
use crate::notify::{Notifier, Template};
use crate::schema::{resolve, FieldNames};
use crate::store::RowStore;

/// Message returned with a completed run.
pub const RUN_COMPLETE_MESSAGE: &str = "執行完成";

/// Point-in-time snapshot of the sheet for display.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub headers: Vec<String>,
    pub data: Vec<Record>,
}

/// Short answer for a completed run: `{"message": ..., "processed": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteReport {
    pub message: String,
    pub processed: usize,
}

impl From<&BatchResult> for ExecuteReport {
    fn from(result: &BatchResult) -> Self {
        Self {
            message: RUN_COMPLETE_MESSAGE.to_string(),
            processed: result.processed,
        }
    }
}

/// Auto-reply service over an injected store and transport.
///
/// Every call reads the store afresh; nothing is cached between runs.
/// At most one `execute` runs at a time per instance.
pub struct AutoReply {
    store: Arc<dyn RowStore>,
    notifier: Arc<dyn Notifier>,
    fields: FieldNames,
    template: Template,
    completion_marker: String,
    run_lock: Mutex<()>,
}

impl AutoReply {
    pub fn new(store: Arc<dyn RowStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            fields: FieldNames::default(),
            template: Template::default(),
            completion_marker: COMPLETION_MARKER.to_string(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn with_completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.completion_marker = marker.into();
        self
    }

    pub fn fields(&self) -> &FieldNames {
        &self.fields
    }

    /// Read the whole sheet for display. No schema check.
    pub fn preview(&self) -> Result<Preview, ReconError> {
        let snapshot = self.store.fetch_all()?;
        let (headers, data) = records_from_rows(&snapshot.rows);
        Ok(Preview { headers, data })
    }

    /// Run one reconciliation pass.
    ///
    /// Fatal errors (unreadable store, missing columns, concurrent run)
    /// surface before any send. Per-row failures are only in the result.
    pub fn execute(&self) -> Result<BatchResult, ReconError> {
        let _guard = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(ReconError::RunInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let Some(loaded) = self.load()? else {
            return Ok(BatchResult::default());
        };

        let ctx = RunContext {
            store: self.store.as_ref(),
            sheet: &loaded.sheet,
            notifier: self.notifier.as_ref(),
            template: &self.template,
            completion_marker: &self.completion_marker,
        };
        Ok(engine::run(&loaded.records, &loaded.schema, &ctx))
    }

    /// Screen rows like `execute` without sending or writing.
    pub fn dry_run(&self) -> Result<BatchResult, ReconError> {
        let Some(loaded) = self.load()? else {
            return Ok(BatchResult::default());
        };
        Ok(engine::plan(&loaded.records, &loaded.schema))
    }

    /// Fetch and resolve. `None` for a sheet with no rows at all.
    fn load(&self) -> Result<Option<Loaded>, ReconError> {
        let snapshot = self.store.fetch_all()?;
        if snapshot.rows.is_empty() {
            log::info!("sheet is empty, nothing to do");
            return Ok(None);
        }

        let (headers, records) = records_from_rows(&snapshot.rows);
        log::info!("headers found: {:?}", headers);
        let schema = resolve(&headers, &self.fields)?;
        log::info!(
            "indices: name={}, email={}, status={}",
            schema.name_index,
            schema.email_index,
            schema.status_index,
        );
        Ok(Some(Loaded {
            sheet: snapshot.sheet,
            schema,
            records,
        }))
    }
}

/// A resolved read that one run works from.
struct Loaded {
    sheet: String,
    schema: Schema,
    records: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::store::MemoryStore;

    fn service(store: &Arc<MemoryStore>, notifier: &Arc<RecordingNotifier>) -> AutoReply {
        AutoReply::new(store.clone(), notifier.clone())
    }

    #[test]
    fn preview_carries_row_positions() {
        let store = Arc::new(MemoryStore::from_strs(&[
            &["姓名", "Email"],
            &["Alice", "a@x.com"],
            &["Bob"],
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        let preview = service(&store, &notifier).preview().unwrap();

        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["headers"], serde_json::json!(["姓名", "Email"]));
        assert_eq!(json["data"][0]["_rowIndex"], 2);
        assert_eq!(json["data"][1]["_rowIndex"], 3);
        assert_eq!(json["data"][1]["Email"], "");
    }

    #[test]
    fn preview_of_empty_sheet() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let preview = service(&store, &notifier).preview().unwrap();
        assert!(preview.headers.is_empty());
        assert!(preview.data.is_empty());
    }

    #[test]
    fn execute_on_empty_sheet_processes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let result = service(&store, &notifier).execute().unwrap();
        assert_eq!(ExecuteReport::from(&result).processed, 0);
    }

    #[test]
    fn unavailable_store_is_fatal() {
        let store = Arc::new(MemoryStore::from_strs(&[&["姓名", "Email", "是否自動回覆"]]));
        store.set_unavailable("connection refused");
        let notifier = Arc::new(RecordingNotifier::new());
        let err = service(&store, &notifier).execute().unwrap_err();
        assert_eq!(err, ReconError::SourceUnavailable("connection refused".into()));
        assert!(notifier.attempts().is_empty());
    }

    #[test]
    fn held_lock_rejects_second_run() {
        let store = Arc::new(MemoryStore::from_strs(&[&["姓名", "Email", "是否自動回覆"]]));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(&store, &notifier);

        let _held = svc.run_lock.lock().unwrap();
        assert_eq!(svc.execute().unwrap_err(), ReconError::RunInProgress);
    }

    #[test]
    fn report_shape() {
        let report = ExecuteReport {
            message: RUN_COMPLETE_MESSAGE.into(),
            processed: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"message": "執行完成", "processed": 3}));
    }
}
