//! Daily allocation report for Jainam accounts.
//!
//! Three uploads go in: the master sheet (file1), the daily allocation
//! workbook (file2) and the daily sheet with the MTM, Capital Deployed and
//! Max SL sections (file3). One table comes out with every account followed
//! by its PS, VT, GB, RD and RM component rows.

use chrono::NaiveDate;
use models::dates::{parse_date_str, DateOrder};
use models::{AlignmentMode, Settings, Table};
use tracing::{debug, info};

pub mod alias;
pub mod allocate;
pub mod blocks;
pub mod enrich;
pub mod error;
pub mod export;
pub mod join;
pub mod report;
pub mod sections;

pub use error::{PipelineError, Result};

/// An uploaded file: its name (for the extension) and raw bytes.
#[derive(Debug, Clone)]
pub struct TableResource {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl TableResource {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Finished report for one trading day.
#[derive(Debug, Clone)]
pub struct Report {
    pub date: NaiveDate,
    pub table: Table,
}

impl Report {
    pub fn file_name(&self, prefix: &str) -> String {
        export::report_file_name(prefix, self.date)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        export::to_csv_bytes(&self.table)
    }
}

/// Parses the requested trading day. Ambiguous numeric dates read month-first.
pub fn parse_target_date(raw: &str) -> Result<NaiveDate> {
    parse_date_str(raw, DateOrder::MonthFirst)
        .map(|dt| dt.date())
        .ok_or_else(|| PipelineError::InvalidDate(raw.trim().to_string()))
}

/// Loads the three uploads and builds the report for `target_date`.
///
/// `sheet_name` selects the sheet of the daily workbook (file3); the
/// allocation workbook (file2) is always read from `settings.allocation_sheet`.
pub fn process(
    file1: &TableResource,
    file2: &TableResource,
    file3: &TableResource,
    sheet_name: &str,
    target_date: &str,
    settings: &Settings,
) -> Result<Report> {
    let daily_sheet = Some(sheet_name.trim()).filter(|s| !s.is_empty());

    let master = table_loader::load_table(&file1.file_name, &file1.bytes, None)?;
    let allocation = table_loader::load_table(
        &file2.file_name,
        &file2.bytes,
        Some(settings.allocation_sheet.as_str()),
    )?;
    let daily = table_loader::load_table(&file3.file_name, &file3.bytes, daily_sheet)?;

    process_tables(&master, &allocation, &daily, target_date, settings)
}

/// Runs every stage on already loaded tables.
pub fn process_tables(
    master: &Table,
    allocation: &Table,
    daily: &Table,
    target_date: &str,
    settings: &Settings,
) -> Result<Report> {
    for (table, input) in [(master, "file1"), (allocation, "file2"), (daily, "file3")] {
        if table.is_empty() {
            return Err(PipelineError::EmptyInput {
                input: input.to_string(),
            });
        }
    }
    let target = parse_target_date(target_date)?;
    info!(%target, alignment = ?settings.alignment, "building allocation report");

    let mut sections = sections::extract_sections(daily)?;

    let ids_col = sections
        .mtm
        .column_index(alias::IDS)
        .ok_or_else(|| PipelineError::missing_column(alias::IDS, "MTM section of file3"))?;
    let ids: Vec<String> = sections.mtm.column(ids_col).filter_map(|c| c.key()).collect();
    debug!(accounts = ids.len(), "accounts referenced by daily sheet");

    let book = enrich::enrich_accounts(
        master,
        &ids,
        target,
        target_date.trim(),
        &settings.master_drop_columns,
    )?;
    join::attach_master_figures(&mut sections, &book, settings.capital_multiplier)?;

    alias::drop_unidentified(&mut sections.mtm, "MTM")?;
    alias::drop_unidentified(&mut sections.capital_deployed, "Capital Deployed")?;
    let mtm = alias::expand_aliases(&sections.mtm);
    let mut capital = alias::expand_aliases(&sections.capital_deployed);

    // Pairing by position needs Max SL shaped exactly like Capital Deployed.
    let mut max_loss = sections.max_loss;
    if settings.alignment == AlignmentMode::Positional {
        alias::drop_unidentified(&mut max_loss, "Max SL")?;
        max_loss = alias::expand_aliases(&max_loss);
    }

    let allocations = blocks::parse_allocation(allocation, target, settings.min_block_year)?;
    join::fill_component_allocations(&mut capital, &allocations, settings.component_multiplier)?;
    join::backfill_from_unnamed(&mut capital)?;
    join::map_mtm(&mut capital, &mtm)?;
    allocate::apportion_mtm(&mut capital)?;

    let table = report::assemble_report(&capital, &max_loss, settings.alignment)?;
    info!(rows = table.len(), %target, "allocation report ready");
    Ok(Report {
        date: target,
        table,
    })
}
