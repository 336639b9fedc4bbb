use std::sync::Arc;

use autoreply_recon::{
    AutoReply, ExecuteReport, FieldNames, MemoryStore, ReconError, RecordingNotifier, RowOutcome,
    Template,
};

const HEADERS: &[&str] = &["姓名", "Email", "是否自動回覆"];

fn setup(rows: &[&[&str]]) -> (Arc<MemoryStore>, Arc<RecordingNotifier>, AutoReply) {
    let store = Arc::new(MemoryStore::from_strs(rows));
    let notifier = Arc::new(RecordingNotifier::new());
    let service = AutoReply::new(store.clone(), notifier.clone());
    (store, notifier, service)
}

// -------------------------------------------------------------------------
// End-to-end
// -------------------------------------------------------------------------

#[test]
fn sends_to_untouched_row_and_marks_it() {
    let (store, notifier, service) = setup(&[
        HEADERS,
        &["Alice", "a@x.com", ""],
        &["Bob", "b@x.com", "Y"],
    ]);

    let result = service.execute().unwrap();

    assert_eq!(result.processed, 1);
    assert_eq!(notifier.attempts(), vec!["a@x.com"]);
    // Row 2, column C
    assert_eq!(store.writes(), vec![(2, 2, "Y".to_string())]);
    assert_eq!(
        ExecuteReport::from(&result),
        ExecuteReport {
            message: "執行完成".into(),
            processed: 1,
        }
    );
}

#[test]
fn missing_status_column_touches_nothing() {
    let (store, notifier, service) = setup(&[
        &["Name", "Email"],
        &["Alice", "a@x.com"],
    ]);
    let service = service.with_fields(FieldNames {
        name: "Name".into(),
        email: "Email".into(),
        status: "Replied".into(),
    });

    let err = service.execute().unwrap_err();

    assert_eq!(
        err,
        ReconError::MissingRequiredField {
            fields: vec!["Replied".into()],
        }
    );
    assert!(notifier.attempts().is_empty());
    assert!(store.writes().is_empty());
}

#[test]
fn any_missing_required_header_blocks_the_run() {
    let cases: &[&[&str]] = &[
        &["Email", "是否自動回覆"],
        &["姓名", "是否自動回覆"],
        &["姓名", "Email"],
        &["姓名 ", "email", "是否自動回覆"],
        &[],
    ];
    for header_row in cases {
        let (store, notifier, service) = setup(&[*header_row, &["Alice", "a@x.com", ""]]);
        assert!(
            matches!(service.execute(), Err(ReconError::MissingRequiredField { .. })),
            "headers {header_row:?} should fail"
        );
        assert!(notifier.attempts().is_empty());
        assert!(store.writes().is_empty());
    }
}

// -------------------------------------------------------------------------
// Idempotence + retry
// -------------------------------------------------------------------------

#[test]
fn second_run_processes_nothing() {
    let (_store, notifier, service) = setup(&[
        HEADERS,
        &["Alice", "a@x.com", ""],
        &["Bob", "b@x.com", "n"],
        &["Carol", "c@x.com", "N"],
    ]);

    assert_eq!(service.execute().unwrap().processed, 3);
    assert_eq!(service.execute().unwrap().processed, 0);
    assert_eq!(notifier.sent().len(), 3);
}

#[test]
fn rerun_after_partial_failure_retries_only_failed_row() {
    let (store, notifier, service) = setup(&[
        HEADERS,
        &["A", "a@x.com", ""],
        &["B", "b@x.com", ""],
        &["C", "c@x.com", ""],
        &["D", "d@x.com", ""],
    ]);
    notifier.fail_for("c@x.com");

    let first = service.execute().unwrap();
    assert_eq!(first.processed, 3);
    assert_eq!(first.failed, 1);
    assert_eq!(store.cell(4, 2), "");
    for row in [2, 3, 5] {
        assert_eq!(store.cell(row, 2), "Y", "row {row}");
    }

    let second = service.execute().unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.failed, 1);
    assert_eq!(notifier.attempts().iter().filter(|a| *a == "c@x.com").count(), 2);
}

#[test]
fn unrecorded_send_is_sent_again_next_run() {
    let (store, notifier, service) = setup(&[HEADERS, &["A", "a@x.com", ""]]);
    store.reject_writes_to(2);

    let first = service.execute().unwrap();
    assert_eq!(first.processed, 1);
    assert!(matches!(first.rows[0].outcome, RowOutcome::SentUnrecorded { .. }));

    let second = service.execute().unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(notifier.sent().len(), 2);
}

// -------------------------------------------------------------------------
// Layout variations
// -------------------------------------------------------------------------

#[test]
fn status_column_far_right_and_ragged_rows() {
    let mut header: Vec<&str> = vec!["Timestamp", "姓名", "Email"];
    header.extend(std::iter::repeat("x").take(25));
    header.push("是否自動回覆");
    let (store, notifier, service) = setup(&[&header, &["t", "Alice", "a@x.com"]]);

    let result = service.execute().unwrap();

    assert_eq!(result.processed, 1);
    assert_eq!(notifier.sent().len(), 1);
    // index 28 -> column AC
    assert_eq!(store.writes(), vec![(2, 28, "Y".to_string())]);
}

#[test]
fn custom_template_and_marker() {
    let (store, notifier, service) = setup(&[HEADERS, &["Alice", "a@x.com", ""]]);
    let service = service
        .with_template(Template {
            subject: "Thanks, {name}".into(),
            body: "Dear {name}".into(),
        })
        .with_completion_marker("sent");

    service.execute().unwrap();

    let sent = notifier.sent();
    assert_eq!(sent[0].subject, "Thanks, Alice");
    assert_eq!(sent[0].body, "Dear Alice");
    assert_eq!(store.cell(2, 2), "sent");
}

#[test]
fn dry_run_reports_without_side_effects() {
    let (store, notifier, service) = setup(&[
        HEADERS,
        &["Alice", "a@x.com", ""],
        &["Bob", "b@x.com", "Y"],
    ]);

    let result = service.dry_run().unwrap();

    assert_eq!(result.rows[0].outcome, RowOutcome::WouldSend);
    assert_eq!(result.processed, 0);
    assert!(notifier.attempts().is_empty());
    assert!(store.writes().is_empty());
}
