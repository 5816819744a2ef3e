use models::{AlignmentMode, Cell, RowKey, Table};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::alias::{ALIAS, IDS};
use crate::error::{PipelineError, Result};
use crate::join::{row_keys, ALLOCATION, MAX_LOSS_FIGURE, MTM};

pub const REPORT_COLUMNS: [&str; 8] = [
    "User ID",
    "Component",
    "Capital Deployed",
    "MTM",
    "|",
    "User ID (SL)",
    "Component (SL)",
    "Max Loss",
];

pub const SEPARATOR: &str = "|";

struct Columns {
    ids: usize,
    alias: Option<usize>,
    value: usize,
}

fn max_loss_columns(max_loss: &Table) -> Result<Columns> {
    let section = "Max SL section of file3";
    Ok(Columns {
        ids: max_loss
            .column_index(IDS)
            .ok_or_else(|| PipelineError::missing_column(IDS, section))?,
        alias: max_loss.column_index(ALIAS),
        value: max_loss
            .column_index(MAX_LOSS_FIGURE)
            .ok_or_else(|| PipelineError::missing_column(MAX_LOSS_FIGURE, section))?,
    })
}

fn max_loss_cells(max_loss: &Table, cols: &Columns, row: Option<usize>) -> [Cell; 3] {
    match row {
        Some(r) => [
            max_loss.get(r, cols.ids).clone(),
            cols.alias.map(|c| max_loss.get(r, c).clone()).unwrap_or_default(),
            max_loss.get(r, cols.value).clone(),
        ],
        None => Default::default(),
    }
}

/// Row of `max_loss` to show beside each row of `capital`.
fn pair_rows(capital: &Table, max_loss: &Table, mode: AlignmentMode) -> Result<Vec<Option<usize>>> {
    match mode {
        AlignmentMode::Positional => {
            if capital.len() != max_loss.len() {
                return Err(PipelineError::Misaligned {
                    capital: capital.len(),
                    max_loss: max_loss.len(),
                });
            }
            Ok((0..capital.len()).map(Some).collect())
        }
        AlignmentMode::Keyed => {
            let mut index: HashMap<RowKey, usize> = HashMap::new();
            for (idx, key) in row_keys(max_loss).into_iter().enumerate() {
                let Some(key) = key else { continue };
                if index.contains_key(&key) {
                    warn!(account = %key.account, "account repeated in Max SL section, keeping first row");
                    continue;
                }
                index.insert(key, idx);
            }
            Ok(row_keys(capital)
                .into_iter()
                .map(|key| key.and_then(|k| index.get(&k).copied()))
                .collect())
        }
    }
}

/// Lays Capital Deployed and Max SL side by side in the report's fixed
/// column order.
pub fn assemble_report(capital: &Table, max_loss: &Table, mode: AlignmentMode) -> Result<Table> {
    let section = "Capital Deployed section of file3";
    let column = |name: &str| {
        capital
            .column_index(name)
            .ok_or_else(|| PipelineError::missing_column(name, section))
    };
    let left = [column(IDS)?, column(ALIAS)?, column(ALLOCATION)?, column(MTM)?];
    let right = max_loss_columns(max_loss)?;

    let pairs = pair_rows(capital, max_loss, mode)?;
    let rows: Vec<Vec<Cell>> = pairs
        .iter()
        .enumerate()
        .map(|(idx, paired)| {
            let mut row: Vec<Cell> = left.iter().map(|&c| capital.get(idx, c).clone()).collect();
            row.push(Cell::text(SEPARATOR));
            row.extend(max_loss_cells(max_loss, &right, *paired));
            row
        })
        .collect();

    let matched = pairs.iter().filter(|p| p.is_some()).count();
    debug!(rows = rows.len(), matched, ?mode, "assembled report");
    Ok(Table::with_names(&REPORT_COLUMNS, rows))
}
