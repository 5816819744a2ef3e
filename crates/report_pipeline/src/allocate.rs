use models::{Cell, Table};
use tracing::debug;

use crate::alias::IDS;
use crate::error::{PipelineError, Result};
use crate::join::{ALLOCATION, MTM};

/// An account row and the component rows under it that carry an allocation.
#[derive(Debug, Clone, PartialEq)]
struct AccountRun {
    parent: usize,
    components: Vec<usize>,
}

fn account_runs(table: &Table, ids_col: usize, alloc_col: usize) -> Vec<AccountRun> {
    table
        .rows()
        .iter()
        .enumerate()
        .fold(Vec::new(), |mut runs: Vec<AccountRun>, (idx, row)| {
            if !row[ids_col].is_empty() {
                runs.push(AccountRun {
                    parent: idx,
                    components: Vec::new(),
                });
            } else if let Some(run) = runs.last_mut() {
                if row[alloc_col].as_f64().is_some() {
                    run.components.push(idx);
                }
            }
            runs
        })
}

/// Rounds to 2 decimals on the exact binary value, ties to even.
///
/// Scaling by 100 first would turn `1.115` (stored just below the tie) into
/// an exact `111.5`, so the decimal formatter does the rounding instead.
pub fn round_money(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// Splits each account's MTM across its component rows in proportion to
/// their allocations.
///
/// Accounts whose MTM is missing, or whose component allocations sum to zero
/// or less, are left untouched.
pub fn apportion_mtm(capital: &mut Table) -> Result<()> {
    let section = "Capital Deployed section of file3";
    let ids_col = capital
        .column_index(IDS)
        .ok_or_else(|| PipelineError::missing_column(IDS, section))?;
    let alloc_col = capital
        .column_index(ALLOCATION)
        .ok_or_else(|| PipelineError::missing_column(ALLOCATION, section))?;
    let mtm_col = capital
        .column_index(MTM)
        .ok_or_else(|| PipelineError::missing_column(MTM, section))?;

    let mut apportioned = 0usize;
    for run in account_runs(capital, ids_col, alloc_col) {
        let Some(parent_mtm) = capital.get(run.parent, mtm_col).as_f64() else {
            continue;
        };
        let shares: Vec<(usize, f64)> = run
            .components
            .iter()
            .filter_map(|&idx| capital.get(idx, alloc_col).as_f64().map(|a| (idx, a)))
            .collect();
        let total: f64 = shares.iter().map(|(_, a)| a).sum();
        if total <= 0.0 {
            continue;
        }

        for (idx, share) in shares {
            capital.set(idx, mtm_col, Cell::Number(round_money(parent_mtm * share / total)));
        }
        apportioned += 1;
    }
    debug!(accounts = apportioned, "apportioned MTM across components");
    Ok(())
}
