use chrono::{NaiveDateTime, Timelike};
use std::fmt;

/// A single scalar value in a table. `Empty` is the null value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
	#[default]
	Empty,
	Text(String),
	Number(f64),
	Bool(bool),
	DateTime(NaiveDateTime),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
	pub fn text(s: impl Into<String>) -> Self {
		Cell::Text(s.into())
	}

	/// Null check. Blank text is not null; see [`Cell::is_blank`].
	pub fn is_empty(&self) -> bool {
		matches!(self, Cell::Empty)
	}

	/// Null or text that is empty after trimming.
	pub fn is_blank(&self) -> bool {
		match self {
			Cell::Empty => true,
			Cell::Text(s) => s.trim().is_empty(),
			_ => false,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Cell::Number(n) if n.is_finite() => Some(*n),
			Cell::Text(s) => {
				let s = s.trim().replace(',', "");
				if s.is_empty() {
					return None;
				}
				s.parse::<f64>().ok().filter(|n| n.is_finite())
			}
			_ => None,
		}
	}

	/// Normalised identifier used for joins, so `U1`, ` U1 ` and numeric
	/// `1001` vs text `"1001"` line up.
	pub fn key(&self) -> Option<String> {
		match self {
			Cell::Empty => None,
			Cell::Text(s) => {
				let s = s.trim();
				if s.is_empty() { None } else { Some(s.to_string()) }
			}
			other => Some(other.to_string()),
		}
	}

	/// Header text when a row is promoted to column names.
	pub fn as_column_name(&self) -> ColumnName {
		match self {
			Cell::Empty => None,
			other => Some(other.to_string()),
		}
	}
}

impl fmt::Display for Cell {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Cell::Empty => Ok(()),
			Cell::Text(s) => f.write_str(s),
			Cell::Number(n) => write!(f, "{n}"),
			Cell::Bool(b) => write!(f, "{b}"),
			Cell::DateTime(dt) => {
				if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
					write!(f, "{}", dt.format("%Y-%m-%d"))
				} else {
					write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
				}
			}
		}
	}
}

impl From<&str> for Cell {
	fn from(s: &str) -> Self {
		Cell::Text(s.to_string())
	}
}

impl From<f64> for Cell {
	fn from(n: f64) -> Self {
		Cell::Number(n)
	}
}

impl From<Option<f64>> for Cell {
	fn from(n: Option<f64>) -> Self {
		n.map(Cell::Number).unwrap_or_default()
	}
}

/// `None` marks an unnamed column (a blank header cell after promotion).
pub type ColumnName = Option<String>;

/// Ordered columns, ordered rows. Every row has exactly `width()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
	columns: Vec<ColumnName>,
	rows: Vec<Vec<Cell>>,
}

impl Table {
	pub fn new(columns: Vec<ColumnName>) -> Self {
		Self {
			columns,
			rows: Vec::new(),
		}
	}

	/// Rows shorter than the header are padded with `Empty`, longer ones truncated.
	pub fn from_rows(columns: Vec<ColumnName>, rows: Vec<Vec<Cell>>) -> Self {
		let mut table = Self::new(columns);
		for row in rows {
			table.push_row(row);
		}
		table
	}

	/// Convenience constructor where every column is named.
	pub fn with_names<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Cell>>) -> Self {
		let columns = names.iter().map(|n| Some(n.as_ref().to_string())).collect();
		Self::from_rows(columns, rows)
	}

	pub fn columns(&self) -> &[ColumnName] {
		&self.columns
	}

	pub fn rows(&self) -> &[Vec<Cell>] {
		&self.rows
	}

	pub fn width(&self) -> usize {
		self.columns.len()
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn push_row(&mut self, mut row: Vec<Cell>) {
		row.resize(self.columns.len(), Cell::Empty);
		self.rows.push(row);
	}

	/// First column carrying `name`.
	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns
			.iter()
			.position(|c| c.as_deref() == Some(name))
	}

	pub fn has_column(&self, name: &str) -> bool {
		self.column_index(name).is_some()
	}

	pub fn unnamed_column_index(&self) -> Option<usize> {
		self.columns.iter().position(Option::is_none)
	}

	/// Out-of-range positions read as `Empty`.
	pub fn get(&self, row: usize, col: usize) -> &Cell {
		self.rows
			.get(row)
			.and_then(|r| r.get(col))
			.unwrap_or(&EMPTY)
	}

	pub fn set(&mut self, row: usize, col: usize, value: Cell) {
		if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
			*cell = value;
		}
	}

	pub fn column(&self, col: usize) -> impl Iterator<Item = &Cell> + '_ {
		self.rows.iter().map(move |r| r.get(col).unwrap_or(&EMPTY))
	}

	/// Index of `name`, appending an all-empty column when it is missing.
	pub fn ensure_column(&mut self, name: &str) -> usize {
		match self.column_index(name) {
			Some(idx) => idx,
			None => {
				self.columns.push(Some(name.to_string()));
				for row in &mut self.rows {
					row.push(Cell::Empty);
				}
				self.columns.len() - 1
			}
		}
	}

	/// Overwrites (or creates) `name` with one value per row.
	pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> usize {
		let idx = self.ensure_column(name);
		for (row, value) in self.rows.iter_mut().zip(values) {
			row[idx] = value;
		}
		idx
	}

	pub fn drop_column(&mut self, idx: usize) {
		if idx >= self.columns.len() {
			return;
		}
		self.columns.remove(idx);
		for row in &mut self.rows {
			row.remove(idx);
		}
	}

	/// Drops every column whose name is listed; unknown names are ignored.
	pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) {
		let keep: Vec<bool> = self
			.columns
			.iter()
			.map(|c| match c {
				Some(c) => !names.iter().any(|n| n.as_ref() == c),
				None => true,
			})
			.collect();
		if keep.iter().all(|k| *k) {
			return;
		}

		let mut flags = keep.iter();
		self.columns.retain(|_| *flags.next().unwrap_or(&true));
		for row in &mut self.rows {
			let mut flags = keep.iter();
			row.retain(|_| *flags.next().unwrap_or(&true));
		}
	}

	pub fn retain_rows<F>(&mut self, mut keep: F)
	where
		F: FnMut(&[Cell]) -> bool,
	{
		self.rows.retain(|r| keep(r));
	}

	/// Drops the last row, if any.
	pub fn pop_row(&mut self) -> Option<Vec<Cell>> {
		self.rows.pop()
	}
}
