//! CSV export of yearly performance and JSON export of the full report.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sizing::SizingReport;
use crate::sizing::convergence::YearlyPerformanceRecord;

/// Column header for the yearly CSV export.
const HEADER: &str = "year,soh_relative,soh_absolute,dc_gross_mwh,dc_usable_mwh,\
                      dc_rte,system_rte,poi_usable_mwh,meets_guarantee";

/// Exports yearly records to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[YearlyPerformanceRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes yearly records as CSV to any writer.
///
/// One header row, then one row per year in input order. Output is
/// deterministic for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[YearlyPerformanceRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        wtr.write_record(&[
            r.year_index.to_string(),
            format!("{:.6}", r.soh_relative),
            format!("{:.6}", r.soh_absolute),
            format!("{:.4}", r.dc_gross_mwh),
            format!("{:.4}", r.dc_usable_mwh),
            format!("{:.6}", r.dc_rte_frac),
            format!("{:.6}", r.system_rte_frac),
            format!("{:.4}", r.poi_usable_mwh),
            r.meets_guarantee.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the report as pretty-printed JSON at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation, serialisation, or writing fails.
pub fn export_json(report: &SizingReport, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_json(report, io::BufWriter::new(file))
}

/// Writes the report as pretty-printed JSON to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if serialisation or writing fails.
pub fn write_json(report: &SizingReport, mut writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()
}
