//! Ingestion normalizer: bytes of unknown encoding in, typed dataset out.

pub mod duplicates;
pub mod encoding;
pub mod recency;

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::config::{NormalizeConfig, RoleConfig};
use crate::error::Result;
use crate::fingerprint::content_sha256;
use crate::metrics;
use crate::types::{Cell, Dataset, Recency, Row, Schema};

pub use duplicates::{find_duplicates, DuplicateReport, FieldRole};
pub use recency::{cell_recency, parse_recency};

/// Result of a load: the dataset plus what was learned while reading it.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub report: LoadReport,
    pub duplicates: DuplicateReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Label of the candidate encoding that decoded the input.
    pub encoding: String,
    pub content_sha256: String,
    pub rows: usize,
    /// Non-empty recency values that fell back to the missing sentinel.
    pub recency_parse_failures: usize,
}

/// Decode, parse and normalize raw CSV bytes.
///
/// Structural problems (no usable encoding, malformed CSV, missing recency
/// column) fail the whole load. Unparseable timestamps do not: they become
/// `Recency::Missing` and are counted in the report.
#[instrument(skip(bytes, roles, config), fields(bytes = bytes.len()))]
pub fn load(bytes: &[u8], roles: &RoleConfig, config: &NormalizeConfig) -> Result<LoadedDataset> {
    let (text, encoding) = encoding::decode_first(bytes, &config.encodings)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let header: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let schema = Schema::new(header)?;
    let recency_index = schema.require(&roles.recency_field)?;

    let mut rows = Vec::new();
    let mut parse_failures = 0;
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let mut cells: Vec<Cell> = record.iter().map(Cell::from_field).collect();
        if let Some(cell) = cells.get_mut(recency_index) {
            let (normalized, failed) = normalize_recency_cell(cell);
            if failed {
                debug!(row = i, value = %cell, "Unparseable recency, treating as missing");
                parse_failures += 1;
            }
            *cell = normalized;
        }
        rows.push(Row::new(i, cells));
    }

    let dataset = Dataset::new(schema, rows);
    let duplicates = find_duplicates(&dataset, &roles.entity_key_fields, &roles.identity_fields)?;

    if parse_failures > 0 {
        warn!(
            "{} of {} rows have an unparseable {}",
            parse_failures,
            dataset.len(),
            roles.recency_field
        );
        metrics::normalize::recency_parse_failures(parse_failures);
    }
    metrics::normalize::load_completed(&encoding, dataset.len());
    info!(encoding = %encoding, rows = dataset.len(), "Loaded dataset");

    Ok(LoadedDataset {
        report: LoadReport {
            encoding,
            content_sha256: content_sha256(bytes),
            rows: dataset.len(),
            recency_parse_failures: parse_failures,
        },
        dataset,
        duplicates,
    })
}

/// Read `path` and hand its bytes to [`load`].
pub fn load_path(path: &Path, roles: &RoleConfig, config: &NormalizeConfig) -> Result<LoadedDataset> {
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), "Read input file");
    load(&bytes, roles, config)
}

/// Coerce one recency cell. The flag is true when a non-empty value failed to parse.
fn normalize_recency_cell(cell: &Cell) -> (Cell, bool) {
    match cell {
        Cell::Text(raw) => {
            let recency = parse_recency(raw);
            let failed = recency.is_missing() && !raw.trim().is_empty();
            (Cell::Recency(recency), failed)
        }
        Cell::Recency(r) => (Cell::Recency(*r), false),
        Cell::Null | Cell::Flag(_) => (Cell::Recency(Recency::Missing), false),
    }
}
