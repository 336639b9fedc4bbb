use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One data row of the sheet, keyed by header name.
///
/// `fields` is positionally aligned with the header row it was built from:
/// every header is present, and cells missing from a short row are `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based row number in the store (the header row is row 1).
    pub row_position: usize,
    fields: Vec<(String, String)>,
}

impl Record {
    /// Build a record from a raw row, padding missing cells with `""`.
    /// Cells beyond the header row are dropped.
    pub fn from_row(row_position: usize, headers: &[String], cells: &[String]) -> Self {
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), cells.get(i).cloned().unwrap_or_default()))
            .collect();
        Self { row_position, fields }
    }

    /// Value at a column index, `""` when out of range.
    pub fn cell(&self, index: usize) -> &str {
        self.fields.get(index).map(|(_, v)| v.as_str()).unwrap_or("")
    }

    /// Value under a header name. On duplicate headers the last column wins.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    /// `(header, value)` pairs in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// JSON key carrying the row position in preview output.
pub const ROW_INDEX_KEY: &str = "_rowIndex";

/// Serializes as a flat object: `{"_rowIndex": n, "<header>": "<value>", ...}`.
/// Duplicate headers collapse to one key holding the last column's value.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut obj = serde_json::Map::new();
        obj.insert(ROW_INDEX_KEY.to_string(), self.row_position.into());
        for (header, value) in self.fields() {
            obj.insert(header.to_string(), serde_json::Value::String(value.to_string()));
        }
        obj.serialize(serializer)
    }
}

/// Header row plus resolved positions of the three required fields.
/// Built once per run by [`crate::schema::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub headers: Vec<String>,
    pub name_index: usize,
    pub email_index: usize,
    pub status_index: usize,
}

/// Split raw store rows into the header row and its data records.
/// Row positions start at 2 because row 1 holds the headers.
pub fn records_from_rows(rows: &[Vec<String>]) -> (Vec<String>, Vec<Record>) {
    let Some((header_row, data)) = rows.split_first() else {
        return (Vec::new(), Vec::new());
    };
    let records = data
        .iter()
        .enumerate()
        .map(|(i, cells)| Record::from_row(i + 2, header_row, cells))
        .collect();
    (header_row.clone(), records)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    /// Status cell is blank: never touched.
    Empty,
    /// Explicit "n" marker.
    Pending,
    /// "y" or any other non-empty value.
    Completed,
}

impl EligibilityStatus {
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Empty | Self::Pending)
    }
}

// ---------------------------------------------------------------------------
// Per-row outcome + batch summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingName,
    MissingEmail,
    AlreadyCompleted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "missing name"),
            Self::MissingEmail => write!(f, "missing email"),
            Self::AlreadyCompleted => write!(f, "already completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    /// Sent and completion marker written.
    Sent,
    /// Sent, but the completion write was rejected. The row stays eligible
    /// and will be sent again on the next run.
    SentUnrecorded { reason: String },
    /// Send failed; status cell untouched.
    Failed { reason: String },
    /// Not eligible; no side effect.
    Skipped { reason: SkipReason },
    /// Dry run: would have been sent.
    WouldSend,
}

impl RowOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::SentUnrecorded { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub row_position: usize,
    pub recipient: String,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

/// Aggregate of one run. `processed` counts sends, independent of whether
/// the completion write landed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub scanned: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows: Vec<RowResult>,
}

impl BatchResult {
    pub(crate) fn push(&mut self, row: RowResult) {
        self.scanned += 1;
        match &row.outcome {
            RowOutcome::Sent => self.processed += 1,
            RowOutcome::SentUnrecorded { .. } => {
                self.processed += 1;
                self.failed += 1;
            }
            RowOutcome::Failed { .. } => self.failed += 1,
            RowOutcome::Skipped { .. } => self.skipped += 1,
            RowOutcome::WouldSend => {}
        }
        self.rows.push(row);
    }

    /// Rows whose send or completion write failed.
    pub fn failures(&self) -> impl Iterator<Item = &RowResult> {
        self.rows.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
