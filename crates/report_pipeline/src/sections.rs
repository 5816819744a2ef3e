//! Carves the daily sheet (file3) into its MTM, Capital Deployed and Max SL
//! sub-tables.
//!
//! The sheet is a stack of sections. Each starts with a sentinel label in the
//! key column, followed by its own header row and its data rows. A section's
//! slice runs up to and including the next sentinel, which is then dropped as
//! the boundary row:
//!
//! ```text
//! MTM                 <- sentinel, dropped
//!        IDs  Alias   <- promoted to column names
//!        U1   ...     <- data
//! Capital Deployed    <- boundary, dropped (and the next section's sentinel)
//! ```

use models::{Cell, Table};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const SENTINELS: [&str; 4] = ["MTM", "Capital Deployed", "Max SL", "AVG %"];

#[derive(Debug, Clone, PartialEq)]
pub struct Sections {
    pub mtm: Table,
    pub capital_deployed: Table,
    pub max_loss: Table,
}

/// Row index of the first occurrence of each sentinel, in [`SENTINELS`] order.
pub fn locate_sentinels(table: &Table, key_col: usize) -> Result<[usize; 4]> {
    let found = table
        .column(key_col)
        .enumerate()
        .fold([None; 4], |mut found, (idx, cell)| {
            if let Cell::Text(label) = cell {
                if let Some(pos) = SENTINELS.iter().position(|s| *s == label.trim()) {
                    found[pos].get_or_insert(idx);
                }
            }
            found
        });

    let missing: Vec<&str> = SENTINELS
        .iter()
        .zip(found.iter())
        .filter(|(_, idx)| idx.is_none())
        .map(|(label, _)| *label)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::SectionNotFound {
            detail: format!("missing {}", missing.join(", ")),
        });
    }

    let positions = found.map(|idx| idx.unwrap_or_default());
    if positions.windows(2).any(|w| w[0] >= w[1]) {
        return Err(PipelineError::SectionNotFound {
            detail: format!(
                "sections out of order (MTM at row {}, Capital Deployed at row {}, Max SL at row {}, AVG % at row {})",
                positions[0], positions[1], positions[2], positions[3]
            ),
        });
    }
    Ok(positions)
}

/// Sections keyed on the first column of the daily sheet.
pub fn extract_sections(daily: &Table) -> Result<Sections> {
    let [mtm, capital, max_sl, avg] = locate_sentinels(daily, 0)?;
    debug!(mtm, capital, max_sl, avg, "located daily sections");

    Ok(Sections {
        mtm: carve(daily, mtm, capital, "MTM")?,
        capital_deployed: carve(daily, capital, max_sl, "Capital Deployed")?,
        max_loss: carve(daily, max_sl, avg, "Max SL")?,
    })
}

/// Rows `start..=end`, minus the sentinel at `start`, with the next row as
/// header and the row at `end` dropped.
fn carve(daily: &Table, start: usize, end: usize, section: &str) -> Result<Table> {
    let rows = &daily.rows()[start + 1..=end];

    let Some((header, rest)) = rows.split_first() else {
        return Err(PipelineError::missing_column(
            "IDs",
            &format!("{section} section of file3"),
        ));
    };
    let data = match rest.split_last() {
        Some((_, data)) => data.to_vec(),
        None => Vec::new(),
    };

    let columns = header.iter().map(Cell::as_column_name).collect();
    let table = Table::from_rows(columns, data);

    if !table.has_column("IDs") {
        return Err(PipelineError::missing_column(
            "IDs",
            &format!("{section} section of file3"),
        ));
    }
    Ok(table)
}
