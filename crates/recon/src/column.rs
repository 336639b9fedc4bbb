//! A1-style addressing helpers.

/// Convert a 0-based column index to its letter label
/// (0 -> A, 25 -> Z, 26 -> AA, 701 -> ZZ). Bijective base-26, no zero digit.
pub fn column_label(index: usize) -> String {
    let mut label = Vec::new();
    let mut n = index;
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    // Only ASCII uppercase bytes were pushed.
    String::from_utf8(label).unwrap_or_default()
}

/// Single-cell range: `<sheet>!<Col><Row>`. `row_position` is 1-based.
pub fn cell_range(sheet: &str, column_index: usize, row_position: usize) -> String {
    format!("{}!{}{}", sheet, column_label(column_index), row_position)
}

/// Cell address for logs and errors: `A1` when the store has no tab names,
/// `<sheet>!A1` otherwise.
pub fn cell_address(sheet: &str, column_index: usize, row_position: usize) -> String {
    if sheet.is_empty() {
        format!("{}{}", column_label(column_index), row_position)
    } else {
        cell_range(sheet, column_index, row_position)
    }
}

/// Whole-column range used for bulk reads, e.g. `Sheet1!A:Z`.
pub fn columns_range(sheet: &str, columns: &str) -> String {
    format!("{sheet}!{columns}")
}
