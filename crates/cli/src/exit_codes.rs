//! CLI Exit Code Registry
//!
//! Single source of truth for `autoreply` exit codes.
//! Exit codes are part of the shell contract; cron jobs and scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error or invalid configuration                 |
//! | 3    | Sheet could not be read                              |
//! | 4    | Required column missing from the header row          |
//! | 5    | Run finished, but some rows failed to send or record |
//! | 6    | Another run is already in progress                   |
//! | 7    | Required secret not configured                       |

use autoreply_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid settings.
pub const EXIT_USAGE: u8 = 2;

/// Row store unreachable, unauthorized, or returned garbage.
pub const EXIT_SOURCE_UNAVAILABLE: u8 = 3;

/// Header row lacks a configured field name.
pub const EXIT_MISSING_COLUMN: u8 = 4;

/// At least one row ended in `failed` or `sent_unrecorded`.
/// The run itself completed; rerunning retries exactly those rows.
pub const EXIT_ROW_FAILURES: u8 = 5;

/// `execute` refused because a run holds the lock.
pub const EXIT_RUN_IN_PROGRESS: u8 = 6;

/// Mail password or Sheets token not found in keychain or environment.
pub const EXIT_MISSING_SECRET: u8 = 7;

/// Map a fatal run error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::SourceUnavailable(_) => EXIT_SOURCE_UNAVAILABLE,
        ReconError::MissingRequiredField { .. } => EXIT_MISSING_COLUMN,
        ReconError::RunInProgress => EXIT_RUN_IN_PROGRESS,
    }
}
