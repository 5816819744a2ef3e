use models::{Alias, Cell, RowKey, Table};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::alias::{ALIAS, IDS};
use crate::blocks::AllocationTable;
use crate::enrich::AccountBook;
use crate::error::{PipelineError, Result};
use crate::sections::Sections;

/// Master MTM mapped onto the MTM section.
pub const MTM_FIGURE: &str = "mtm";
/// Capital figure on the Capital Deployed section.
pub const ALLOCATION: &str = "Allocation";
/// MTM carried over to the Capital Deployed section.
pub const MTM: &str = "MTM";
/// Master max loss mapped onto the Max SL section.
pub const MAX_LOSS_FIGURE: &str = "max_loss";

fn column(table: &Table, name: &str, section: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PipelineError::missing_column(name, &format!("{section} section of file3")))
}

fn map_ids<F>(table: &mut Table, section: &str, target: &str, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Cell,
{
    let ids_col = column(table, IDS, section)?;
    let values = table
        .column(ids_col)
        .map(|id| id.key().map(|k| lookup(&k)).unwrap_or_default())
        .collect();
    table.set_column(target, values);
    Ok(())
}

/// Copies per-account master figures onto the three sections: MTM as-is,
/// allocation scaled by `capital_multiplier`, max loss as-is.
pub fn attach_master_figures(
    sections: &mut Sections,
    book: &AccountBook,
    capital_multiplier: f64,
) -> Result<()> {
    map_ids(&mut sections.mtm, "MTM", MTM_FIGURE, |id| {
        book.mtm(id).cloned().unwrap_or_default()
    })?;
    map_ids(&mut sections.capital_deployed, "Capital Deployed", ALLOCATION, |id| {
        book.allocation(id)
            .and_then(Cell::as_f64)
            .map(|v| v * capital_multiplier)
            .into()
    })?;
    map_ids(&mut sections.max_loss, "Max SL", MAX_LOSS_FIGURE, |id| {
        book.max_loss(id).cloned().unwrap_or_default()
    })?;
    Ok(())
}

/// Walks rows top to bottom carrying the current account: a row with an
/// `IDs` value starts a new account, a row without one but with a component
/// `Alias` belongs to it. Anything else has no key.
pub fn row_keys(table: &Table) -> Vec<Option<RowKey>> {
    let ids_col = table.column_index(IDS);
    let alias_col = table.column_index(ALIAS);

    let (_, keys) = table.rows().iter().fold(
        (None::<String>, Vec::with_capacity(table.len())),
        |(current, mut keys), row| {
            let id = ids_col.and_then(|c| row[c].key());
            let alias = alias_col.and_then(|c| Alias::from_cell(&row[c]));
            match (id, current) {
                (Some(id), _) => {
                    keys.push(Some(RowKey::account(id.clone())));
                    (Some(id), keys)
                }
                (None, Some(account)) => {
                    keys.push(alias.map(|a| RowKey::component(account.clone(), a)));
                    (Some(account), keys)
                }
                (None, None) => {
                    keys.push(None);
                    (None, keys)
                }
            }
        },
    );
    keys
}

/// Overwrites `Allocation` on component rows with the day's fraction for
/// (account, component) scaled by `multiplier`. Accounts missing from the
/// allocation table keep whatever they had.
pub fn fill_component_allocations(
    capital: &mut Table,
    allocations: &AllocationTable,
    multiplier: f64,
) -> Result<()> {
    let alloc_col = column(capital, ALLOCATION, "Capital Deployed")?;
    let mut filled = 0usize;

    for (idx, key) in row_keys(capital).into_iter().enumerate() {
        let Some(RowKey {
            account,
            slot: models::Slot::Component(alias),
        }) = key
        else {
            continue;
        };
        if let Some(fraction) = allocations.component(&account, alias) {
            capital.set(idx, alloc_col, Cell::Number(fraction * multiplier));
            filled += 1;
        }
    }
    debug!(filled, "component allocations filled");
    Ok(())
}

/// Fills remaining empty `Allocation` cells from the section's unnamed
/// column, then drops that column.
pub fn backfill_from_unnamed(capital: &mut Table) -> Result<()> {
    let unnamed = capital.unnamed_column_index().ok_or_else(|| {
        PipelineError::Schema("No unnamed column found in Capital Deployed section of file3.".to_string())
    })?;
    let alloc_col = column(capital, ALLOCATION, "Capital Deployed")?;

    for idx in 0..capital.len() {
        if capital.get(idx, alloc_col).is_empty() {
            let fallback = capital.get(idx, unnamed).clone();
            capital.set(idx, alloc_col, fallback);
        }
    }
    capital.drop_column(unnamed);
    Ok(())
}

/// Carries MTM from the MTM section onto Capital Deployed by account.
/// The first MTM row per account wins; rows without an account get nothing.
pub fn map_mtm(capital: &mut Table, mtm_section: &Table) -> Result<()> {
    let ids_col = column(mtm_section, IDS, "MTM")?;
    let mtm_col = column(mtm_section, MTM_FIGURE, "MTM")?;

    let mut first_seen: HashMap<String, Cell> = HashMap::new();
    for row in mtm_section.rows() {
        let Some(id) = row[ids_col].key() else { continue };
        if first_seen.contains_key(&id) {
            warn!(account = %id, "account repeated in MTM section, keeping first value");
            continue;
        }
        first_seen.insert(id, row[mtm_col].clone());
    }

    map_ids(capital, "Capital Deployed", MTM, |id| {
        first_seen.get(id).cloned().unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::expand_aliases;
    use crate::blocks::{AllocationTable, BLOCK_HEADER};
    use models::Slot;

    fn expanded_capital() -> Table {
        let t = Table::from_rows(
            vec![None, Some(IDS.into()), Some(ALIAS.into()), Some(ALLOCATION.into())],
            vec![
                vec![Cell::Number(11.0), "U1".into(), Cell::Empty, 50.0.into()],
                vec![Cell::Number(22.0), "U2".into(), Cell::Empty, Cell::Empty],
            ],
        );
        expand_aliases(&t)
    }

    fn allocations() -> AllocationTable {
        let mut row: Vec<Cell> = vec!["U1".into(), "a".into(), "x".into()];
        // VT GB PS RD, then a non-numeric RM.
        row.extend([0.1, 0.2, 0.3, 0.4].map(Cell::Number));
        row.extend([Cell::text("n/a"), Cell::Number(1.0), Cell::Number(0.0)]);
        AllocationTable::new(Table::with_names(&BLOCK_HEADER, vec![row])).unwrap()
    }

    #[test]
    fn test_row_keys_follow_current_account() {
        let keys = row_keys(&expanded_capital());
        assert_eq!(keys.len(), 12);
        assert_eq!(keys[0], Some(RowKey::account("U1")));
        assert_eq!(keys[1], Some(RowKey::component("U1", Alias::PS)));
        assert_eq!(keys[5], Some(RowKey::component("U1", Alias::RM)));
        assert_eq!(keys[6], Some(RowKey::account("U2")));
        assert_eq!(keys[7].as_ref().map(|k| k.slot), Some(Slot::Component(Alias::PS)));
    }

    #[test]
    fn test_rows_before_first_account_have_no_key() {
        let t = Table::with_names(
            &[IDS, ALIAS],
            vec![vec![Cell::Empty, "PS".into()], vec!["U1".into(), Cell::Empty]],
        );
        let keys = row_keys(&t);
        assert_eq!(keys[0], None);
        assert_eq!(keys[1], Some(RowKey::account("U1")));
    }

    #[test]
    fn test_fill_component_allocations() {
        let mut capital = expanded_capital();
        fill_component_allocations(&mut capital, &allocations(), 10_000_000.0).unwrap();
        let col = capital.column_index(ALLOCATION).unwrap();
        // U1 parent untouched.
        assert_eq!(capital.get(0, col), &Cell::Number(50.0));
        // PS is the third fraction column.
        assert_eq!(capital.get(1, col), &Cell::Number(0.3 * 10_000_000.0));
        assert_eq!(capital.get(2, col), &Cell::Number(0.1 * 10_000_000.0));
        // RM is not numeric: left empty.
        assert!(capital.get(5, col).is_empty());
        // U2 has no allocation block row.
        assert!(capital.get(7, col).is_empty());
    }

    #[test]
    fn test_backfill_from_unnamed_then_drop() {
        let mut capital = expanded_capital();
        backfill_from_unnamed(&mut capital).unwrap();
        assert_eq!(capital.unnamed_column_index(), None);
        let col = capital.column_index(ALLOCATION).unwrap();
        assert_eq!(capital.get(0, col), &Cell::Number(50.0));
        assert_eq!(capital.get(6, col), &Cell::Number(22.0));
        assert!(capital.get(1, col).is_empty());
    }

    #[test]
    fn test_backfill_requires_unnamed_column() {
        let mut capital = Table::with_names(&[IDS, ALLOCATION], vec![]);
        let err = backfill_from_unnamed(&mut capital).unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
    }

    #[test]
    fn test_map_mtm_keeps_first() {
        let mtm = Table::with_names(
            &[IDS, MTM_FIGURE],
            vec![
                vec!["U1".into(), 100.0.into()],
                vec![Cell::Empty, 5.0.into()],
                vec!["U1".into(), 999.0.into()],
            ],
        );
        let mut capital = expanded_capital();
        map_mtm(&mut capital, &mtm).unwrap();
        let col = capital.column_index(MTM).unwrap();
        assert_eq!(capital.get(0, col), &Cell::Number(100.0));
        assert!(capital.get(1, col).is_empty());
        assert!(capital.get(6, col).is_empty());
    }
}
