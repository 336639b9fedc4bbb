use crate::classify::classify;
use crate::column::cell_address;
use crate::model::{BatchResult, Record, RowOutcome, RowResult, Schema, SkipReason};
use crate::notify::{Notifier, Template};
use crate::store::RowStore;

/// Default completion marker written to the status column.
pub const COMPLETION_MARKER: &str = "Y";

/// Collaborators for one live run.
pub struct RunContext<'a> {
    pub store: &'a dyn RowStore,
    /// Tab the records were read from; every write of the run goes here.
    pub sheet: &'a str,
    pub notifier: &'a dyn Notifier,
    pub template: &'a Template,
    pub completion_marker: &'a str,
}

/// A row that passed screening.
struct Candidate<'r> {
    name: &'r str,
    email: &'r str,
}

/// Decide whether a record needs a send. Name and email are trimmed
/// before the emptiness check.
fn screen<'r>(record: &'r Record, schema: &Schema) -> Result<Candidate<'r>, SkipReason> {
    let name = record.cell(schema.name_index).trim();
    let email = record.cell(schema.email_index).trim();
    let status = record.cell(schema.status_index);

    log::debug!(
        "checking row {}: name={}, email={}, status=\"{}\"",
        record.row_position,
        name,
        email,
        status.trim(),
    );

    if !classify(status).is_eligible() {
        return Err(SkipReason::AlreadyCompleted);
    }
    if name.is_empty() {
        return Err(SkipReason::MissingName);
    }
    if email.is_empty() {
        return Err(SkipReason::MissingEmail);
    }
    Ok(Candidate { name, email })
}

/// Run reconciliation over `records` in row order.
///
/// Per eligible row: send, then write the completion marker. A failed send
/// leaves the status cell untouched. A failed write after a successful send
/// still counts as processed; the row stays eligible for the next run.
/// No per-row error escapes the loop.
pub fn run(records: &[Record], schema: &Schema, ctx: &RunContext<'_>) -> BatchResult {
    let mut result = BatchResult::default();

    for record in records {
        let candidate = match screen(record, schema) {
            Ok(c) => c,
            Err(reason) => {
                result.push(RowResult {
                    row_position: record.row_position,
                    recipient: record.cell(schema.email_index).trim().to_string(),
                    outcome: RowOutcome::Skipped { reason },
                });
                continue;
            }
        };

        let message = ctx.template.render(candidate.email, candidate.name);
        let outcome = match ctx.notifier.send(&message) {
            Err(e) => {
                log::warn!("row {} send to {} failed: {}", record.row_position, candidate.email, e);
                RowOutcome::Failed { reason: e.to_string() }
            }
            Ok(()) => {
                let target = cell_address(ctx.sheet, schema.status_index, record.row_position);
                log::info!("updating {} to '{}'", target, ctx.completion_marker);
                match ctx.store.write_cell(
                    ctx.sheet,
                    record.row_position,
                    schema.status_index,
                    ctx.completion_marker,
                ) {
                    Ok(()) => RowOutcome::Sent,
                    Err(e) => {
                        log::warn!(
                            "row {} was sent but its completion write failed: {}",
                            record.row_position,
                            e,
                        );
                        RowOutcome::SentUnrecorded { reason: e.to_string() }
                    }
                }
            }
        };

        result.push(RowResult {
            row_position: record.row_position,
            recipient: candidate.email.to_string(),
            outcome,
        });
    }

    log::info!(
        "run finished: {} scanned, {} processed, {} skipped, {} failed",
        result.scanned,
        result.processed,
        result.skipped,
        result.failed,
    );
    result
}

/// Screen `records` exactly like [`run`] without sending or writing.
pub fn plan(records: &[Record], schema: &Schema) -> BatchResult {
    let mut result = BatchResult::default();
    for record in records {
        let (recipient, outcome) = match screen(record, schema) {
            Ok(c) => (c.email.to_string(), RowOutcome::WouldSend),
            Err(reason) => (
                record.cell(schema.email_index).trim().to_string(),
                RowOutcome::Skipped { reason },
            ),
        };
        result.push(RowResult {
            row_position: record.row_position,
            recipient,
            outcome,
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::records_from_rows;
    use crate::notify::RecordingNotifier;
    use crate::schema::{resolve, FieldNames};
    use crate::store::MemoryStore;

    fn load(store: &MemoryStore) -> (Schema, Vec<Record>) {
        let snapshot = store.fetch_all().unwrap();
        let (headers, records) = records_from_rows(&snapshot.rows);
        (resolve(&headers, &FieldNames::default()).unwrap(), records)
    }

    fn ctx<'a>(store: &'a MemoryStore, notifier: &'a RecordingNotifier, template: &'a Template) -> RunContext<'a> {
        RunContext {
            store,
            sheet: "",
            notifier,
            template,
            completion_marker: COMPLETION_MARKER,
        }
    }

    #[test]
    fn sends_only_to_eligible_rows() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["Alice", "a@x.com", ""],
            &["Bob", "b@x.com", "Y"],
            &["Carol", "c@x.com", "n"],
        ]);
        let notifier = RecordingNotifier::new();
        let template = Template::default();
        let (schema, records) = load(&store);

        let result = run(&records, &schema, &ctx(&store, &notifier, &template));

        assert_eq!(result.processed, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(notifier.attempts(), vec!["a@x.com", "c@x.com"]);
        assert_eq!(store.writes(), vec![(2, 2, "Y".into()), (4, 2, "Y".into())]);
    }

    #[test]
    fn blank_name_or_email_is_skipped_without_failure() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["", "a@x.com", ""],
            &["Bob", "   ", "n"],
            &["Carol"],
        ]);
        let notifier = RecordingNotifier::new();
        let template = Template::default();
        let (schema, records) = load(&store);

        let result = run(&records, &schema, &ctx(&store, &notifier, &template));

        assert_eq!(result.processed, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, 3);
        assert_eq!(
            result.rows[0].outcome,
            RowOutcome::Skipped { reason: SkipReason::MissingName }
        );
        assert_eq!(
            result.rows[1].outcome,
            RowOutcome::Skipped { reason: SkipReason::MissingEmail }
        );
        assert!(notifier.attempts().is_empty());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn email_is_trimmed_before_send() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["Alice", "  a@x.com ", ""],
        ]);
        let notifier = RecordingNotifier::new();
        let template = Template::default();
        let (schema, records) = load(&store);

        run(&records, &schema, &ctx(&store, &notifier, &template));
        assert_eq!(notifier.sent()[0].to, "a@x.com");
        assert!(notifier.sent()[0].body.contains("Hi Alice,"));
    }

    #[test]
    fn send_failure_is_isolated() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["A", "a@x.com", ""],
            &["B", "b@x.com", ""],
            &["C", "c@x.com", ""],
        ]);
        let notifier = RecordingNotifier::new();
        notifier.fail_for("b@x.com");
        let template = Template::default();
        let (schema, records) = load(&store);

        let result = run(&records, &schema, &ctx(&store, &notifier, &template));

        assert_eq!(result.processed, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(store.cell(2, 2), "Y");
        assert_eq!(store.cell(3, 2), "");
        assert_eq!(store.cell(4, 2), "Y");
        let failure = result.failures().next().unwrap();
        assert_eq!(failure.row_position, 3);
        assert!(matches!(failure.outcome, RowOutcome::Failed { .. }));
    }

    #[test]
    fn rejected_write_still_counts_as_processed() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["A", "a@x.com", ""],
            &["B", "b@x.com", ""],
        ]);
        store.reject_writes_to(2);
        let notifier = RecordingNotifier::new();
        let template = Template::default();
        let (schema, records) = load(&store);

        let result = run(&records, &schema, &ctx(&store, &notifier, &template));

        assert_eq!(result.processed, 2);
        assert_eq!(result.failed, 1);
        assert!(matches!(result.rows[0].outcome, RowOutcome::SentUnrecorded { .. }));
        assert_eq!(store.cell(2, 2), "");
        assert_eq!(store.cell(3, 2), "Y");
    }

    #[test]
    fn custom_marker_is_written() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["A", "a@x.com", "N"],
        ]);
        let notifier = RecordingNotifier::new();
        let template = Template::default();
        let (schema, records) = load(&store);
        let ctx = RunContext {
            store: &store,
            sheet: "",
            notifier: &notifier,
            template: &template,
            completion_marker: "done",
        };

        run(&records, &schema, &ctx);
        assert_eq!(store.cell(2, 2), "done");
    }

    #[test]
    fn plan_has_no_side_effects() {
        let store = MemoryStore::from_strs(&[
            &["姓名", "Email", "是否自動回覆"],
            &["A", "a@x.com", ""],
            &["B", "b@x.com", "y"],
        ]);
        let (schema, records) = load(&store);

        let result = plan(&records, &schema);

        assert_eq!(result.scanned, 2);
        assert_eq!(result.processed, 0);
        assert_eq!(result.rows[0].outcome, RowOutcome::WouldSend);
        assert_eq!(
            result.rows[1].outcome,
            RowOutcome::Skipped { reason: SkipReason::AlreadyCompleted }
        );
        assert!(store.writes().is_empty());
    }
}
