use serde::{Deserialize, Serialize};
use std::fmt;

pub mod dates;
pub mod table;

pub use table::{Cell, ColumnName, Table};

// Settings models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMode {
	/// Join Max SL rows onto Capital Deployed rows by (account, slot).
	#[default]
	Keyed,
	/// Pair rows by position; both tables must have the same length.
	Positional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Sheet read from a multi-sheet allocation workbook.
	pub allocation_sheet: String,
	/// Master ALLOCATION fractions are scaled by this before landing in Capital Deployed.
	pub capital_multiplier: f64,
	/// Per-component allocation fractions are scaled by this.
	pub component_multiplier: f64,
	/// Block dates older than this year are not accepted as block dates.
	pub min_block_year: i32,
	pub master_drop_columns: Vec<String>,
	pub report_prefix: String,
	pub alignment: AlignmentMode,
}

impl Default for Settings {
	fn default() -> Self {
		let mut master_drop_columns: Vec<String> = [
			"Date",
			"SNO",
			"Enabled",
			"LoggedIn",
			"SqOff Done",
			"Broker",
			"Qty Multiplier",
			"Available Margin",
			"Total Orders",
			"Total Lots",
			"SERVER",
		]
		.iter()
		.map(|s| s.to_string())
		.collect();
		master_drop_columns.extend((16..=20).map(|i| format!("Unnamed: {i}")));

		Self {
			allocation_sheet: "Record".to_string(),
			capital_multiplier: 100.0,
			component_multiplier: 10_000_000.0,
			min_block_year: 2020,
			master_drop_columns,
			report_prefix: "jainam".to_string(),
			alignment: AlignmentMode::Keyed,
		}
	}
}

// Domain models
/// Sub-strategy components every account is split into, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alias {
	PS,
	VT,
	GB,
	RD,
	RM,
}

impl Alias {
	pub const ALL: [Alias; 5] = [Alias::PS, Alias::VT, Alias::GB, Alias::RD, Alias::RM];

	pub fn as_str(self) -> &'static str {
		match self {
			Alias::PS => "PS",
			Alias::VT => "VT",
			Alias::GB => "GB",
			Alias::RD => "RD",
			Alias::RM => "RM",
		}
	}

	/// Exact, case-sensitive match against the component codes.
	pub fn parse(s: &str) -> Option<Alias> {
		Alias::ALL.into_iter().find(|a| a.as_str() == s.trim())
	}

	pub fn from_cell(cell: &Cell) -> Option<Alias> {
		match cell {
			Cell::Text(s) => Alias::parse(s),
			_ => None,
		}
	}
}

impl fmt::Display for Alias {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Position of a report row inside its account block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
	Account,
	Component(Alias),
}

/// Composite key identifying one account-or-component row across the
/// Capital Deployed and Max SL tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
	pub account: String,
	pub slot: Slot,
}

impl RowKey {
	pub fn account(account: impl Into<String>) -> Self {
		Self {
			account: account.into(),
			slot: Slot::Account,
		}
	}

	pub fn component(account: impl Into<String>, alias: Alias) -> Self {
		Self {
			account: account.into(),
			slot: Slot::Component(alias),
		}
	}
}
