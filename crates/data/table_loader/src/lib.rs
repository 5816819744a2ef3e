use calamine::{open_workbook_auto_from_rs, Data, Reader};
use encoding_rs::WINDOWS_1252;
use models::dates::{excel_serial_to_datetime, parse_date_str, DateOrder};
use models::{Cell, ColumnName, Table};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid file format for {file}. Please upload CSV or Excel files.")]
    UnsupportedFormat { file: String },

    #[error("Error reading file {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("Sheet '{sheet}' not found in {file}.")]
    SheetNotFound { file: String, sheet: String },
}

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Delimited,
    Spreadsheet,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<FileKind> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Some(FileKind::Delimited),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(FileKind::Spreadsheet),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<FileKind> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileKind::from_extension)
    }
}

/// Load an uploaded resource into a [`Table`].
///
/// The first row becomes the header: blank header cells are named
/// `Unnamed: <index>` and repeated names get `.1`, `.2`, ... suffixes.
/// `sheet` is only consulted for spreadsheets; `None` picks the first sheet.
pub fn load_table(file_name: &str, bytes: &[u8], sheet: Option<&str>) -> Result<Table> {
    let kind = FileKind::from_file_name(file_name).ok_or_else(|| LoadError::UnsupportedFormat {
        file: file_name.to_string(),
    })?;

    let grid = match kind {
        FileKind::Delimited => read_delimited(file_name, bytes)?,
        FileKind::Spreadsheet => read_spreadsheet(file_name, bytes, sheet)?,
    };

    let table = grid_to_table(grid);
    debug!(
        file = file_name,
        rows = table.len(),
        columns = table.width(),
        "loaded table"
    );
    Ok(table)
}

fn grid_to_table(mut grid: Vec<Vec<Cell>>) -> Table {
    if grid.is_empty() {
        return Table::default();
    }
    let header = grid.remove(0);
    let width = grid.iter().map(Vec::len).max().unwrap_or(0).max(header.len());
    Table::from_rows(header_names(&header, width), grid)
}

fn header_names(header: &[Cell], width: usize) -> Vec<ColumnName> {
    let mut names: Vec<String> = Vec::with_capacity(width);
    for idx in 0..width {
        let base = match header.get(idx).and_then(|c| c.key()) {
            Some(name) => name,
            None => format!("Unnamed: {idx}"),
        };

        let mut name = base.clone();
        let mut n = 1;
        while names.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        names.push(name);
    }
    names.into_iter().map(Some).collect()
}

fn read_delimited(file_name: &str, bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let text = decode_text_lossy(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::Parse {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;
        grid.push(record.iter().map(infer_text_cell).collect());
    }
    Ok(grid)
}

fn decode_text_lossy(bytes: &[u8]) -> String {
    // UTF-8 BOM
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Exports saved from desktop Excel on Windows.
    let (decoded, _, _) = WINDOWS_1252.decode(bytes);
    decoded.into_owned()
}

const NA_VALUES: &[&str] = &[
    "", "#N/A", "#NA", "N/A", "NA", "NULL", "null", "NaN", "nan", "-NaN", "-nan", "None", "<NA>",
];

fn infer_text_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if NA_VALUES.contains(&s) {
        return Cell::Empty;
    }
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text(raw.to_string()),
    }
}

fn read_spreadsheet(file_name: &str, bytes: &[u8], sheet: Option<&str>) -> Result<Vec<Vec<Cell>>> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| LoadError::Parse {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(LoadError::SheetNotFound {
                    file: file_name.to_string(),
                    sheet: name.to_string(),
                });
            }
            name.to_string()
        }
        None => sheet_names.first().cloned().ok_or_else(|| LoadError::Parse {
            file: file_name.to_string(),
            reason: "workbook has no sheets".to_string(),
        })?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::Parse {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;

    // Rebuild the grid from A1 so column positions match what the user sees.
    let Some((end_row, end_col)) = range.end() else {
        return Ok(Vec::new());
    };
    let grid = (0..=end_row)
        .map(|r| {
            (0..=end_col)
                .map(|c| range.get_value((r, c)).map(convert_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(grid)
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Cell::DateTime)
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_date_str(s, DateOrder::MonthFirst)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_file_name("daily.CSV"), Some(FileKind::Delimited));
        assert_eq!(FileKind::from_file_name("master.xlsx"), Some(FileKind::Spreadsheet));
        assert_eq!(FileKind::from_file_name("old.xls"), Some(FileKind::Spreadsheet));
        assert_eq!(FileKind::from_file_name("notes.txt"), None);
        assert_eq!(FileKind::from_file_name("noext"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_table("report.pdf", b"", None).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid file format for report.pdf. Please upload CSV or Excel files."
        );
    }

    #[test]
    fn test_csv_header_naming() {
        let csv = "UserID,,Value,Value\nU1,x,1,2\n";
        let table = load_table("f.csv", csv.as_bytes(), None).unwrap();
        assert_eq!(
            table.columns(),
            &[
                Some("UserID".to_string()),
                Some("Unnamed: 1".to_string()),
                Some("Value".to_string()),
                Some("Value.1".to_string()),
            ]
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_csv_cell_inference() {
        let csv = "a,b,c,d\nU1,1.5,,NaN\n";
        let table = load_table("f.csv", csv.as_bytes(), None).unwrap();
        assert_eq!(table.get(0, 0), &Cell::text("U1"));
        assert_eq!(table.get(0, 1), &Cell::Number(1.5));
        assert!(table.get(0, 2).is_empty());
        assert!(table.get(0, 3).is_empty());
    }

    #[test]
    fn test_csv_ragged_rows_and_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"MTM,x\nCapital Deployed\n,,,extra\n");
        let table = load_table("f.csv", &bytes, None).unwrap();
        assert_eq!(table.width(), 4);
        assert_eq!(table.columns()[0].as_deref(), Some("MTM"));
        assert_eq!(table.columns()[3].as_deref(), Some("Unnamed: 3"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, 3), &Cell::text("extra"));
    }

    #[test]
    fn test_csv_windows_1252_fallback() {
        // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte.
        let bytes = b"name\nCaf\xE9\n";
        let table = load_table("f.csv", bytes, None).unwrap();
        assert_eq!(table.get(0, 0), &Cell::text("Café"));
    }

    #[test]
    fn test_empty_csv_is_empty_table() {
        let table = load_table("f.csv", b"", None).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.width(), 0);
    }

    const WORKBOOK: &[u8] = include_bytes!("../tests/fixtures/workbook.xlsx");

    #[test]
    fn test_workbook_defaults_to_first_sheet() {
        let table = load_table("master.xlsx", WORKBOOK, None).unwrap();
        assert_eq!(table.columns()[0].as_deref(), Some("UserID"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, 0), &Cell::text("U1"));
        assert_eq!(table.get(1, 2), &Cell::Number(-12.5));
    }

    #[test]
    fn test_workbook_date_cells_load_as_datetimes() {
        let table = load_table("master.xlsx", WORKBOOK, None).unwrap();
        let expected = excel_serial_to_datetime(45839.0).unwrap();
        assert_eq!(table.get(0, 1), &Cell::DateTime(expected));
        assert_eq!(table.get(0, 2), &Cell::Number(1000.0));
    }

    #[test]
    fn test_workbook_named_sheet() {
        let table = load_table("allocation.xlsx", WORKBOOK, Some("Record")).unwrap();
        assert_eq!(table.columns()[0].as_deref(), Some("Jainam Daily Allocation"));
        assert_eq!(table.columns()[1].as_deref(), Some("Unnamed: 1"));
        assert_eq!(table.get(0, 0), &Cell::text("UserID"));
        assert_eq!(table.get(1, 1), &Cell::Number(0.1));
    }

    #[test]
    fn test_workbook_missing_sheet() {
        let err = load_table("allocation.xlsx", WORKBOOK, Some("Nope")).unwrap_err();
        assert!(matches!(err, LoadError::SheetNotFound { .. }));
        assert_eq!(err.to_string(), "Sheet 'Nope' not found in allocation.xlsx.");
    }

    #[test]
    fn test_convert_cell_scalars() {
        assert_eq!(convert_cell(&Data::Int(5)), Cell::Number(5.0));
        assert_eq!(convert_cell(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(convert_cell(&Data::Bool(true)), Cell::Bool(true));
        assert_eq!(
            convert_cell(&Data::DateTimeIso("2025-07-01".into())),
            Cell::DateTime(excel_serial_to_datetime(45839.0).unwrap())
        );
    }

    #[test]
    fn test_corrupt_spreadsheet_is_parse_error() {
        let err = load_table("f.xlsx", b"definitely not a zip", Some("Record")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }
}
