use serde::Serialize;

use crate::error::ReconError;
use crate::model::Schema;

/// Header names of the three required columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldNames {
    pub name: String,
    pub email: String,
    pub status: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            name: "姓名".to_string(),
            email: "Email".to_string(),
            status: "是否自動回覆".to_string(),
        }
    }
}

/// Resolve the required columns against the header row.
///
/// Exact, case-sensitive match; the first matching column wins. Every
/// missing field is reported, in name/email/status order.
pub fn resolve(header_row: &[String], fields: &FieldNames) -> Result<Schema, ReconError> {
    let position = |wanted: &str| header_row.iter().position(|h| h == wanted);

    let name = position(&fields.name);
    let email = position(&fields.email);
    let status = position(&fields.status);

    match (name, email, status) {
        (Some(name_index), Some(email_index), Some(status_index)) => Ok(Schema {
            headers: header_row.to_vec(),
            name_index,
            email_index,
            status_index,
        }),
        _ => {
            let missing = [(name, &fields.name), (email, &fields.email), (status, &fields.status)]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, field)| field.clone())
                .collect();
            Err(ReconError::MissingRequiredField { fields: missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_default_headers() {
        let schema = resolve(&row(&["時間", "姓名", "Email", "是否自動回覆"]), &FieldNames::default())
            .unwrap();
        assert_eq!(schema.name_index, 1);
        assert_eq!(schema.email_index, 2);
        assert_eq!(schema.status_index, 3);
        assert_eq!(schema.headers.len(), 4);
    }

    #[test]
    fn reports_every_missing_field() {
        let err = resolve(&row(&["Name", "Email"]), &FieldNames::default()).unwrap_err();
        assert_eq!(
            err,
            ReconError::MissingRequiredField {
                fields: vec!["姓名".to_string(), "是否自動回覆".to_string()],
            }
        );
    }

    #[test]
    fn match_is_case_sensitive() {
        let fields = FieldNames {
            name: "Name".into(),
            email: "Email".into(),
            status: "Replied".into(),
        };
        let err = resolve(&row(&["name", "email", "replied"]), &fields).unwrap_err();
        match err {
            ReconError::MissingRequiredField { fields } => assert_eq!(fields.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_duplicate_wins() {
        let fields = FieldNames {
            name: "n".into(),
            email: "e".into(),
            status: "s".into(),
        };
        let schema = resolve(&row(&["s", "n", "e", "s"]), &fields).unwrap();
        assert_eq!(schema.status_index, 0);
    }

    #[test]
    fn empty_header_row_is_missing_everything() {
        let err = resolve(&[], &FieldNames::default()).unwrap_err();
        assert!(err.to_string().contains("姓名"));
    }
}
