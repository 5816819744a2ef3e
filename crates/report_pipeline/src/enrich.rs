use chrono::NaiveDate;
use models::dates::{cell_to_datetime, excel_serial_to_datetime, DateOrder};
use models::{Cell, Table};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

pub const USER_ID: &str = "UserID";
pub const DATE: &str = "Date";
pub const MTM_ALL: &str = "MTM (All)";
pub const ALLOCATION: &str = "ALLOCATION";
pub const MAX_LOSS: &str = "MAX LOSS";

/// Figures taken from the master sheet for one account on the target date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationRecord {
    pub mtm: Cell,
    /// Fraction as stored in the master sheet (not yet scaled).
    pub allocation: Cell,
    pub max_loss: Cell,
}

/// Master sheet rows for the referenced accounts, indexed on `UserID`.
///
/// If an account appears more than once on the target date, the last row wins.
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    records: HashMap<String, AllocationRecord>,
}

impl AccountBook {
    pub fn record(&self, account: &str) -> Option<&AllocationRecord> {
        self.records.get(account)
    }

    pub fn mtm(&self, account: &str) -> Option<&Cell> {
        self.record(account).map(|r| &r.mtm)
    }

    pub fn allocation(&self, account: &str) -> Option<&Cell> {
        self.record(account).map(|r| &r.allocation)
    }

    pub fn max_loss(&self, account: &str) -> Option<&Cell> {
        self.record(account).map(|r| &r.max_loss)
    }
}

fn master_date(cell: &Cell) -> Option<Option<chrono::NaiveDateTime>> {
    match cell {
        Cell::Empty => Some(None),
        Cell::Number(n) => excel_serial_to_datetime(*n).map(Some),
        other => cell_to_datetime(other, DateOrder::MonthFirst).map(Some),
    }
}

/// Filters the master sheet (file1) down to `ids` on `target` and indexes the
/// MTM, allocation and max-loss figures per account.
///
/// `target_label` is the date as the caller typed it, used in messages.
pub fn enrich_accounts<S: AsRef<str>>(
    master: &Table,
    ids: &[String],
    target: NaiveDate,
    target_label: &str,
    drop_columns: &[S],
) -> Result<AccountBook> {
    let user_col = master
        .column_index(USER_ID)
        .ok_or_else(|| PipelineError::missing_column(USER_ID, "file1"))?;
    let date_col = master
        .column_index(DATE)
        .ok_or_else(|| PipelineError::missing_column(DATE, "file1"))?;

    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut matched = master.clone();
    matched.retain_rows(|row| {
        row[user_col]
            .key()
            .is_some_and(|k| wanted.contains(k.as_str()))
    });

    // Only rows for referenced accounts have their dates checked.
    let mut dates = Vec::with_capacity(matched.len());
    for row in matched.rows() {
        let cell = &row[date_col];
        let parsed = master_date(cell)
            .ok_or_else(|| PipelineError::DateParse(format!("unrecognised date '{cell}'")))?;
        dates.push(parsed);
    }
    let mut on_date = dates.into_iter();
    matched.retain_rows(|_| {
        on_date
            .next()
            .flatten()
            .is_some_and(|dt| dt.date() == target)
    });

    if matched.is_empty() {
        return Err(PipelineError::NoDataForDate {
            date: target_label.to_string(),
            input: "file1".to_string(),
        });
    }

    matched.drop_columns(drop_columns);

    let user_col = matched
        .column_index(USER_ID)
        .ok_or_else(|| PipelineError::missing_column(USER_ID, "file1"))?;
    let mtm_col = matched
        .column_index(MTM_ALL)
        .ok_or_else(|| PipelineError::missing_column(MTM_ALL, "file1"))?;
    let alloc_col = matched
        .column_index(ALLOCATION)
        .ok_or_else(|| PipelineError::missing_column(ALLOCATION, "file1"))?;
    let loss_col = matched
        .column_index(MAX_LOSS)
        .ok_or_else(|| PipelineError::missing_column(MAX_LOSS, "file1"))?;

    let mut records = HashMap::new();
    for row in matched.rows() {
        let Some(account) = row[user_col].key() else {
            continue;
        };
        let record = AllocationRecord {
            mtm: row[mtm_col].clone(),
            allocation: row[alloc_col].clone(),
            max_loss: row[loss_col].clone(),
        };
        if records.insert(account.clone(), record).is_some() {
            warn!(%account, "account listed twice in file1 for the target date, last row wins");
        }
    }
    debug!(accounts = records.len(), "matched master accounts");

    Ok(AccountBook { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::Settings;

    fn master() -> Table {
        Table::with_names(
            &["SNO", "UserID", "Date", "MTM (All)", "ALLOCATION", "MAX LOSS", "Broker"],
            vec![
                vec![1.0.into(), "U1".into(), "2025-07-01".into(), 1000.0.into(), 0.5.into(), 200.0.into(), "X".into()],
                vec![2.0.into(), "U2".into(), "07/01/2025".into(), (-50.0).into(), 0.25.into(), 80.0.into(), "X".into()],
                vec![3.0.into(), "U1".into(), "2025-07-02".into(), 7.0.into(), 0.1.into(), 1.0.into(), "X".into()],
                vec![4.0.into(), "U9".into(), "not a date".into(), 1.0.into(), 0.1.into(), 1.0.into(), "X".into()],
            ],
        )
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    #[test]
    fn test_enrich_filters_by_id_and_date() {
        let drop = Settings::default().master_drop_columns;
        let book = enrich_accounts(&master(), &ids(&["U1", "U2"]), target(), "2025-07-01", &drop).unwrap();
        assert_eq!(book.mtm("U1"), Some(&Cell::Number(1000.0)));
        assert_eq!(book.allocation("U1"), Some(&Cell::Number(0.5)));
        assert_eq!(book.max_loss("U2"), Some(&Cell::Number(80.0)));
        assert!(book.record("U9").is_none());
    }

    #[test]
    fn test_pruned_columns_are_not_read() {
        let err = enrich_accounts(&master(), &ids(&["U1"]), target(), "2025-07-01", &["MAX LOSS"]).unwrap_err();
        assert_eq!(err.to_string(), "Error: 'MAX LOSS' column not found in file1.");
    }

    #[test]
    fn test_unreferenced_rows_are_not_date_checked() {
        // U9 carries an unparseable date but is not requested.
        let empty: [&str; 0] = [];
        assert!(enrich_accounts(&master(), &ids(&["U1"]), target(), "2025-07-01", &empty).is_ok());
    }

    #[test]
    fn test_bad_date_on_referenced_row() {
        let empty: [&str; 0] = [];
        let err = enrich_accounts(&master(), &ids(&["U9"]), target(), "2025-07-01", &empty).unwrap_err();
        assert_eq!(err.kind(), "DateParseError");
    }

    #[test]
    fn test_out_of_range_serial_date_is_parse_error() {
        let m = Table::with_names(
            &["UserID", "Date", "MTM (All)", "ALLOCATION", "MAX LOSS"],
            vec![vec!["U1".into(), 1.0e12.into(), 5.0.into(), 0.1.into(), 2.0.into()]],
        );
        let empty: [&str; 0] = [];
        let err = enrich_accounts(&m, &ids(&["U1"]), target(), "2025-07-01", &empty).unwrap_err();
        assert_eq!(err.kind(), "DateParseError");
    }

    #[test]
    fn test_no_rows_on_date() {
        let empty: [&str; 0] = [];
        let other = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let err = enrich_accounts(&master(), &ids(&["U1"]), other, "2025-08-01", &empty).unwrap_err();
        assert_eq!(err.to_string(), "No data found for date 2025-08-01 in file1.");
    }

    #[test]
    fn test_missing_required_column() {
        let mut m = master();
        m.drop_columns(&["MAX LOSS"]);
        let empty: [&str; 0] = [];
        let err = enrich_accounts(&m, &ids(&["U1"]), target(), "2025-07-01", &empty).unwrap_err();
        assert_eq!(err.to_string(), "Error: 'MAX LOSS' column not found in file1.");
    }

    #[test]
    fn test_missing_userid() {
        let mut m = master();
        m.drop_columns(&["UserID"]);
        let empty: [&str; 0] = [];
        let err = enrich_accounts(&m, &ids(&["U1"]), target(), "2025-07-01", &empty).unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
    }

    #[test]
    fn test_duplicate_account_last_row_wins() {
        let mut m = master();
        m.push_row(vec![5.0.into(), "U1".into(), "2025-07-01".into(), 1111.0.into(), 0.5.into(), 200.0.into()]);
        let empty: [&str; 0] = [];
        let book = enrich_accounts(&m, &ids(&["U1"]), target(), "2025-07-01", &empty).unwrap();
        assert_eq!(book.mtm("U1"), Some(&Cell::Number(1111.0)));
    }

    #[test]
    fn test_numeric_ids_and_serial_dates() {
        let m = Table::with_names(
            &["UserID", "Date", "MTM (All)", "ALLOCATION", "MAX LOSS"],
            vec![vec![1001.0.into(), 45839.0.into(), 5.0.into(), 0.1.into(), 2.0.into()]],
        );
        let empty: [&str; 0] = [];
        let book = enrich_accounts(&m, &ids(&["1001"]), target(), "2025-07-01", &empty).unwrap();
        assert_eq!(book.mtm("1001"), Some(&Cell::Number(5.0)));
    }
}
