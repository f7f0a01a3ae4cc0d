use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::types::Dataset;

/// Write `dataset` as CSV: header row, then cells in schema order.
///
/// Recency cells are written as `YYYY-MM-DD HH:MM:SS`, flags as `1`/`0`,
/// nulls and missing recency as empty fields.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(dataset.schema.columns())?;
    for row in &dataset.rows {
        csv_writer.write_record(row.cells.iter().map(|cell| cell.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write CSV to `path`, or to stdout when no path is given.
pub fn write_csv_to(dataset: &Dataset, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            write_csv(dataset, File::create(path)?)?;
            info!("💾 Saved {} rows to {}", dataset.len(), path.display());
            Ok(())
        }
        None => write_csv(dataset, io::stdout().lock()),
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}
