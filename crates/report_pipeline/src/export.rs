use chrono::NaiveDate;
use models::Table;

use crate::error::{PipelineError, Result};

/// Writes `table` as CSV with a header row. Unnamed columns get an empty header.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let header: Vec<&str> = table
        .columns()
        .iter()
        .map(|c| c.as_deref().unwrap_or(""))
        .collect();
    writer
        .write_record(&header)
        .map_err(|e| PipelineError::Internal(format!("failed to write report header: {e}")))?;

    for row in table.rows() {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .map_err(|e| PipelineError::Internal(format!("failed to write report row: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Internal(format!("failed to flush report: {e}")))
}

/// Download name for the report of `date`, e.g. `jainam_2025-07-01.csv`.
pub fn report_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::Cell;

    #[test]
    fn test_csv_layout() {
        let table = Table::from_rows(
            vec![Some("User ID".into()), None, Some("MTM".into())],
            vec![
                vec!["U1".into(), Cell::Empty, 12.5.into()],
                vec![Cell::text("a,b"), "|".into(), Cell::Empty],
            ],
        );
        let csv = String::from_utf8(to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(csv, "User ID,,MTM\nU1,,12.5\n\"a,b\",|,\n");
    }

    #[test]
    fn test_report_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(report_file_name("jainam", date), "jainam_2025-07-01.csv");
    }
}
