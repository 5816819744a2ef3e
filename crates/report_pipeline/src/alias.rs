use models::{Alias, Cell, Table};

use crate::error::{PipelineError, Result};

pub const IDS: &str = "IDs";
pub const ALIAS: &str = "Alias";

/// Drops rows whose `IDs` is null or blank. Runs before expansion, so the
/// component rows added afterwards are never affected.
pub fn drop_unidentified(table: &mut Table, section: &str) -> Result<()> {
    let ids_col = table
        .column_index(IDS)
        .ok_or_else(|| PipelineError::missing_column(IDS, &format!("{section} section of file3")))?;
    table.retain_rows(|row| !row[ids_col].is_blank());
    Ok(())
}

/// Follows every row with one row per [`Alias`], in fixed order.
///
/// Component rows are empty except for `Alias`. The account row keeps its own
/// `Alias` value; the column is created when the section has none.
pub fn expand_aliases(table: &Table) -> Table {
    let mut expanded = Table::new(table.columns().to_vec());
    let alias_col = expanded.ensure_column(ALIAS);
    let width = expanded.width();

    for row in table.rows() {
        expanded.push_row(row.clone());
        for alias in Alias::ALL {
            let mut component = vec![Cell::Empty; width];
            component[alias_col] = Cell::text(alias.as_str());
            expanded.push_row(component);
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Table {
        Table::from_rows(
            vec![None, Some("IDs".into()), Some("Value".into())],
            vec![
                vec![Cell::Number(9.0), "U1".into(), 1.0.into()],
                vec![Cell::Empty, Cell::Empty, 2.0.into()],
                vec![Cell::Empty, Cell::text(""), 3.0.into()],
                vec![Cell::Empty, "U2".into(), 4.0.into()],
            ],
        )
    }

    #[test]
    fn test_drop_unidentified_rows() {
        let mut t = section();
        drop_unidentified(&mut t, "MTM").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1, 1), &Cell::text("U2"));
    }

    #[test]
    fn test_expansion_is_six_rows_per_account() {
        let mut t = section();
        drop_unidentified(&mut t, "MTM").unwrap();
        let expanded = expand_aliases(&t);

        assert_eq!(expanded.len(), 12);
        let ids = expanded.column_index("IDs").unwrap();
        let alias = expanded.column_index("Alias").unwrap();
        for block in 0..2 {
            let base = block * 6;
            assert!(!expanded.get(base, ids).is_empty());
            assert!(expanded.get(base, alias).is_empty());
            for (offset, code) in ["PS", "VT", "GB", "RD", "RM"].iter().enumerate() {
                let r = base + 1 + offset;
                assert!(expanded.get(r, ids).is_empty());
                assert_eq!(expanded.get(r, alias), &Cell::text(*code));
                // Unnamed column stays empty on component rows.
                assert!(expanded.get(r, 0).is_empty());
            }
        }
    }

    #[test]
    fn test_existing_alias_kept_on_account_row() {
        let t = Table::with_names(&["IDs", "Alias"], vec![vec!["U1".into(), "Main".into()]]);
        let expanded = expand_aliases(&t);
        assert_eq!(expanded.width(), 2);
        assert_eq!(expanded.get(0, 1), &Cell::text("Main"));
        assert_eq!(expanded.get(1, 1), &Cell::text("PS"));
    }

    #[test]
    fn test_empty_section_expands_to_nothing() {
        let t = Table::with_names(&["IDs"], vec![]);
        assert!(expand_aliases(&t).is_empty());
    }

    #[test]
    fn test_missing_ids_column() {
        let mut t = Table::with_names(&["Account"], vec![]);
        let err = drop_unidentified(&mut t, "Capital Deployed").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: 'IDs' column not found in Capital Deployed section of file3."
        );
    }
}
