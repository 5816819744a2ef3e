//! Parser for the allocation sheet (file2, sheet "Record").
//!
//! The sheet repeats one block per trading day:
//!
//! ```text
//! Daily Allocation   01-07-2025          <- optional date row
//! UserID  User Alias  Algo  VT ... MAX LOSS   <- block header
//! U1      ...                            <- data rows
//! Total   ...                            <- trailing total, dropped after filtering
//!                                        <- blank row (or the next header) ends the block
//! ```

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use models::dates::{cell_to_datetime, DateOrder};
use models::{Alias, Cell, Table};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

pub const BLOCK_HEADER: [&str; 10] = [
    "UserID",
    "User Alias",
    "Algo",
    "VT",
    "GB",
    "PS",
    "RD",
    "RM",
    "ALLOCATION",
    "MAX LOSS",
];

/// Template columns not needed once blocks are assembled.
pub const DROPPED_COLUMNS: [&str; 2] = ["Algo", "MAX LOSS"];

pub const DATE_COLUMN: &str = "Date";

#[derive(Debug, Clone, PartialEq)]
pub struct DatedBlock {
    pub date: Option<NaiveDateTime>,
    /// Rows already fitted to [`BLOCK_HEADER`].
    pub rows: Vec<Vec<Cell>>,
}

enum ScanState {
    Seeking,
    InBlock(DatedBlock),
}

fn is_block_header(row: &[Cell]) -> bool {
    row.iter()
        .any(|c| c.to_string().to_lowercase().contains("userid"))
}

fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_empty)
}

/// First cell of the row before `header_row` that reads as a day-first date
/// no older than `min_year`. Cells that do not parse are skipped.
fn block_date(table: &Table, header_row: usize, min_year: i32) -> Option<NaiveDateTime> {
    let prev = header_row.checked_sub(1)?;
    table.rows()[prev]
        .iter()
        .filter_map(|c| cell_to_datetime(c, DateOrder::DayFirst))
        .find(|dt| dt.year() >= min_year)
}

fn fit_to_template(row: &[Cell], row_idx: usize) -> Result<Vec<Cell>> {
    if let Some(extra) = row.iter().skip(BLOCK_HEADER.len()).find(|c| !c.is_empty()) {
        return Err(PipelineError::BlockShape {
            row: row_idx,
            reason: format!(
                "expected {} columns, found value '{}' beyond them",
                BLOCK_HEADER.len(),
                extra
            ),
        });
    }
    let mut fitted: Vec<Cell> = row.iter().take(BLOCK_HEADER.len()).cloned().collect();
    fitted.resize(BLOCK_HEADER.len(), Cell::Empty);
    Ok(fitted)
}

/// Splits the allocation sheet into dated blocks.
///
/// A block opens on any row containing "UserID" (any case) and collects rows
/// until a fully blank row or the next header. Blocks without data rows are
/// discarded.
pub fn split_blocks(table: &Table, min_year: i32) -> Result<Vec<DatedBlock>> {
    let mut blocks = Vec::new();
    let mut header_seen = false;
    let mut state = ScanState::Seeking;

    for (idx, row) in table.rows().iter().enumerate() {
        state = match state {
            ScanState::Seeking => {
                if is_block_header(row) {
                    header_seen = true;
                    open_block(table, idx, min_year)
                } else {
                    ScanState::Seeking
                }
            }
            ScanState::InBlock(mut block) => {
                if is_blank_row(row) {
                    close_block(block, &mut blocks);
                    ScanState::Seeking
                } else if is_block_header(row) {
                    close_block(block, &mut blocks);
                    open_block(table, idx, min_year)
                } else {
                    block.rows.push(fit_to_template(row, idx)?);
                    ScanState::InBlock(block)
                }
            }
        };
    }
    if let ScanState::InBlock(block) = state {
        close_block(block, &mut blocks);
    }

    if !header_seen {
        return Err(PipelineError::Schema(
            "'UserID' column not found in file2 (Jainam Daily Allocation). Please ensure the 'Record' sheet contains a 'UserID' header.".to_string(),
        ));
    }
    if blocks.is_empty() {
        return Err(PipelineError::Schema(
            "No valid data blocks found in file2.".to_string(),
        ));
    }
    debug!(blocks = blocks.len(), "split allocation sheet");
    Ok(blocks)
}

fn open_block(table: &Table, header_row: usize, min_year: i32) -> ScanState {
    let date = block_date(table, header_row, min_year);
    if date.is_none() {
        debug!(header_row, "allocation block has no date row");
    }
    ScanState::InBlock(DatedBlock {
        date,
        rows: Vec::new(),
    })
}

fn close_block(block: DatedBlock, blocks: &mut Vec<DatedBlock>) {
    if !block.rows.is_empty() {
        blocks.push(block);
    }
}

/// One table with the fixed template columns plus `Date`.
pub fn assemble_blocks(blocks: &[DatedBlock]) -> Table {
    let mut names: Vec<&str> = BLOCK_HEADER.to_vec();
    names.push(DATE_COLUMN);
    let rows = blocks
        .iter()
        .flat_map(|block| {
            let date = block.date.map(Cell::DateTime).unwrap_or_default();
            block.rows.iter().map(move |row| {
                let mut row = row.clone();
                row.push(date.clone());
                row
            })
        })
        .collect();
    Table::with_names(&names, rows)
}

/// Per-component allocation fractions for the target date.
#[derive(Debug, Clone)]
pub struct AllocationTable {
    table: Table,
    index: HashMap<String, usize>,
}

impl AllocationTable {
    /// Indexes `table` on `UserID`; the first row per account wins.
    pub fn new(table: Table) -> Result<Self> {
        let user_col = table
            .column_index("UserID")
            .ok_or_else(|| PipelineError::missing_column("UserID", "file2"))?;

        let mut index = HashMap::new();
        for (idx, cell) in table.column(user_col).enumerate() {
            let Some(key) = cell.key() else { continue };
            if index.contains_key(&key) {
                warn!(account = %key, row = idx, "duplicate account in allocation block, keeping first");
                continue;
            }
            index.insert(key, idx);
        }
        Ok(Self { table, index })
    }

    /// Fraction allocated to `alias` for `account`; `None` when the account
    /// is absent or the value is not numeric.
    pub fn component(&self, account: &str, alias: Alias) -> Option<f64> {
        let row = *self.index.get(account)?;
        let col = self.table.column_index(alias.as_str())?;
        self.table.get(row, col).as_f64()
    }
}

/// Full BlockParser stage: split, assemble, keep the target day, drop its
/// trailing total row.
pub fn parse_allocation(table: &Table, target: NaiveDate, min_year: i32) -> Result<AllocationTable> {
    let blocks = split_blocks(table, min_year)?;
    let mut assembled = assemble_blocks(&blocks);
    assembled.drop_columns(&DROPPED_COLUMNS);

    let target_dt = target.and_time(chrono::NaiveTime::MIN);
    let date_col = assembled
        .column_index(DATE_COLUMN)
        .ok_or_else(|| PipelineError::Internal("assembled blocks lost their Date column".to_string()))?;
    assembled.retain_rows(|row| row[date_col] == Cell::DateTime(target_dt));

    if assembled.is_empty() {
        return Err(PipelineError::NoDataForDate {
            date: target.to_string(),
            input: "file2".to_string(),
        });
    }
    assembled.pop_row();
    debug!(rows = assembled.len(), %target, "allocation rows for target date");

    AllocationTable::new(assembled)
}
