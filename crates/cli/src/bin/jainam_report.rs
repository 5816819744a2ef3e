use anyhow::{Context, Result};
use clap::Parser;
use report_pipeline::TableResource;
use std::{fs, path::PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "jainam-report",
    about = "Build the daily allocation report from the master, allocation and daily sheets."
)]
struct Args {
    /// Master sheet (file1), CSV or Excel
    #[arg(long)]
    master: PathBuf,

    /// Daily allocation workbook (file2)
    #[arg(long)]
    allocation: PathBuf,

    /// Daily sheet with the MTM, Capital Deployed and Max SL sections (file3)
    #[arg(long)]
    daily: PathBuf,

    /// Sheet of the daily workbook to read
    #[arg(long, default_value = "Sheet1")]
    sheet: String,

    /// Trading day, e.g. 2025-07-01
    #[arg(long)]
    date: String,

    /// Optional output path; defaults to <prefix>_<date>.csv in the working directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optional settings.json
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn read_resource(path: &PathBuf) -> Result<TableResource> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(TableResource::new(path.display().to_string(), bytes))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_pipeline=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = settings_loader::load_settings_or_default(args.settings.as_ref())?;

    let master = read_resource(&args.master)?;
    let allocation = read_resource(&args.allocation)?;
    let daily = read_resource(&args.daily)?;

    let report = report_pipeline::process(
        &master,
        &allocation,
        &daily,
        &args.sheet,
        &args.date,
        &settings,
    )
    .with_context(|| format!("building report for {}", args.date))?;

    let out_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(report.file_name(&settings.report_prefix)));
    let csv = report.to_csv()?;
    fs::write(&out_path, csv).with_context(|| format!("writing {}", out_path.display()))?;
    println!(
        "Wrote {} rows to {}",
        report.table.len(),
        out_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "jainam-report",
            "--master",
            "m.xlsx",
            "--allocation",
            "a.xlsx",
            "--daily",
            "d.csv",
            "--date",
            "2025-07-01",
        ])
        .unwrap();
        assert_eq!(args.sheet, "Sheet1");
        assert!(args.output.is_none());
        assert_eq!(args.daily, PathBuf::from("d.csv"));
    }

    #[test]
    fn test_date_is_required() {
        let parsed = Args::try_parse_from([
            "jainam-report",
            "--master",
            "m.xlsx",
            "--allocation",
            "a.xlsx",
            "--daily",
            "d.csv",
        ]);
        assert!(parsed.is_err());
    }
}
