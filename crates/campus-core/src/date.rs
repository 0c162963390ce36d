use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::MigrationError;

const OUTPUT_FORMAT: &str = "%Y-%m-%d";

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Normalize the date spellings found in the legacy corpus to `YYYY-MM-DD`.
pub fn normalize_date(field: &str, raw: &str) -> Result<String, MigrationError> {
    let value = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, OUTPUT_FORMAT) {
        return Ok(date.format(OUTPUT_FORMAT).to_string());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.date_naive().format(OUTPUT_FORMAT).to_string());
    }
    for pattern in DATE_TIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(ts.date().format(OUTPUT_FORMAT).to_string());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d.%m.%Y") {
        return Ok(date.format(OUTPUT_FORMAT).to_string());
    }

    Err(MigrationError::invalid_field(
        field,
        format!("unrecognized date `{value}`"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_legacy_spellings() {
        for raw in [
            "2021-03-04",
            " 2021-03-04 ",
            "2021-03-04T10:00:00Z",
            "2021-03-04T10:00:00.000+01:00",
            "2021-03-04T10:00:00",
            "2021-03-04 10:00:00",
            "04.03.2021",
        ] {
            assert_eq!(normalize_date("date", raw).unwrap(), "2021-03-04", "{raw}");
        }
    }

    #[test]
    fn rejects_garbage() {
        let err = normalize_date("date", "last spring").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidField { ref field, .. } if field == "date"));
        assert!(normalize_date("date", "2021-02-30").is_err());
    }
}
