use crate::model::EligibilityStatus;

/// Classify a raw status cell.
///
/// Trimmed and case-folded: `""` -> Empty, `"n"` -> Pending, anything
/// else -> Completed. Blank and "n" are eligible, so an ambiguous cell
/// leads to a send rather than a silent skip.
pub fn classify(status: &str) -> EligibilityStatus {
    let status = status.trim();
    if status.is_empty() {
        EligibilityStatus::Empty
    } else if status.eq_ignore_ascii_case("n") {
        EligibilityStatus::Pending
    } else {
        EligibilityStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_values() {
        assert_eq!(classify(""), EligibilityStatus::Empty);
        assert_eq!(classify("   "), EligibilityStatus::Empty);
        assert_eq!(classify("n"), EligibilityStatus::Pending);
        assert_eq!(classify("N"), EligibilityStatus::Pending);
        assert_eq!(classify("  n  "), EligibilityStatus::Pending);
        for v in ["", "n", "N", "  n  "] {
            assert!(classify(v).is_eligible(), "{v:?} should be eligible");
        }
    }

    #[test]
    fn completed_values() {
        for v in ["y", "Y", "done", "x", " Y ", "no", "nn"] {
            assert_eq!(classify(v), EligibilityStatus::Completed, "{v:?}");
            assert!(!classify(v).is_eligible());
        }
    }
}
