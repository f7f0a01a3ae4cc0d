//! Before/after counts and the data-loss exposure of canonicalization.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{DedupError, Result};
use crate::metrics;
use crate::types::{key_labels, Cell, Dataset, GroupKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_rows: usize,
    pub canonical_rows: usize,
    pub discarded_rows: usize,
    /// `discarded / total * 100`, or 0.0 for an empty dataset.
    pub discard_rate_pct: f64,
    /// One entry per requested additive column; empty unless asked for.
    pub exposure: Vec<ColumnExposure>,
}

/// What recency selection does to one count-like column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnExposure {
    pub column: String,
    pub total: f64,
    pub kept: f64,
    pub dropped: f64,
    pub shortfall: f64,
    /// Non-empty cells that were not numbers and so counted as nothing.
    pub unparsed_cells: usize,
    pub groups: Vec<GroupExposure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupExposure {
    pub key: Vec<Option<String>>,
    pub rows: usize,
    /// Sum across every row of the group.
    pub total: f64,
    /// Sum across the group's canonical rows.
    pub kept: f64,
    /// `total - kept`: the part carried only by discarded rows.
    pub dropped: f64,
    /// How far the largest single observation exceeds what was kept.
    pub shortfall: f64,
}

/// Row counts and discard rate of a canonicalization.
pub fn summarize(raw: &Dataset, canonical: &Dataset) -> Metrics {
    let total_rows = raw.len();
    let canonical_rows = canonical.len();
    let discarded_rows = total_rows.saturating_sub(canonical_rows);
    let discard_rate_pct = if total_rows == 0 {
        0.0
    } else {
        discarded_rows as f64 * 100.0 / total_rows as f64
    };

    metrics::summary::discard_rate(discard_rate_pct);
    info!(
        total_rows,
        canonical_rows,
        discarded_rows,
        "Discard rate {:.1}%",
        discard_rate_pct
    );

    Metrics {
        total_rows,
        canonical_rows,
        discarded_rows,
        discard_rate_pct,
        exposure: Vec::new(),
    }
}

/// Like [`summarize`], also reporting per-group sum versus kept for every
/// column in `additive_fields`.
///
/// Both datasets need the key fields and the additive columns. Flagging never
/// looks at these columns; this is the only place they are read.
pub fn summarize_with_exposure(
    raw: &Dataset,
    canonical: &Dataset,
    entity_key_fields: &[String],
    additive_fields: &[String],
) -> Result<Metrics> {
    let mut summary = summarize(raw, canonical);
    if additive_fields.is_empty() {
        return Ok(summary);
    }
    if entity_key_fields.is_empty() {
        return Err(DedupError::EmptyGroupKey);
    }

    let raw_keys = raw.schema.require_all(entity_key_fields)?;
    let canonical_keys = canonical.schema.require_all(entity_key_fields)?;
    for column in additive_fields {
        let raw_index = raw.schema.require(column)?;
        let canonical_index = canonical.schema.require(column)?;
        let exposure = column_exposure(
            column,
            ColumnView::new(raw, &raw_keys, raw_index),
            ColumnView::new(canonical, &canonical_keys, canonical_index),
        );
        if exposure.dropped > 0.0 {
            warn!(
                column = %column,
                dropped = exposure.dropped,
                shortfall = exposure.shortfall,
                "Canonicalization discards additive values"
            );
        }
        metrics::summary::value_lost(column, exposure.dropped);
        summary.exposure.push(exposure);
    }
    Ok(summary)
}

struct ColumnView<'a> {
    dataset: &'a Dataset,
    key_indices: &'a [usize],
    value_index: usize,
}

impl<'a> ColumnView<'a> {
    fn new(dataset: &'a Dataset, key_indices: &'a [usize], value_index: usize) -> Self {
        Self {
            dataset,
            key_indices,
            value_index,
        }
    }

    fn entries(&self) -> impl Iterator<Item = (GroupKey, &'a Cell)> + '_ {
        self.dataset
            .rows
            .iter()
            .map(move |row| (row.key(self.key_indices), row.get(self.value_index)))
    }
}

#[derive(Default)]
struct GroupAccumulator {
    rows: usize,
    total: f64,
    largest: Option<f64>,
    kept: f64,
}

fn column_exposure(column: &str, raw: ColumnView<'_>, canonical: ColumnView<'_>) -> ColumnExposure {
    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();
    let mut unparsed_cells = 0;

    for (key, cell) in raw.entries() {
        let acc = groups.entry(key).or_default();
        acc.rows += 1;
        match numeric(cell) {
            Some(v) => {
                acc.total += v;
                acc.largest = Some(acc.largest.map_or(v, |l| l.max(v)));
            }
            None if !cell.is_null() => unparsed_cells += 1,
            None => {}
        }
    }
    for (key, cell) in canonical.entries() {
        if let (Some(acc), Some(v)) = (groups.get_mut(&key), numeric(cell)) {
            acc.kept += v;
        }
    }

    let groups: Vec<GroupExposure> = groups
        .into_iter()
        .map(|(key, acc)| GroupExposure {
            key: key_labels(&key),
            rows: acc.rows,
            total: acc.total,
            kept: acc.kept,
            dropped: acc.total - acc.kept,
            shortfall: acc.largest.map_or(0.0, |l| (l - acc.kept).max(0.0)),
        })
        .collect();

    ColumnExposure {
        column: column.to_string(),
        total: groups.iter().map(|g| g.total).sum(),
        kept: groups.iter().map(|g| g.kept).sum(),
        dropped: groups.iter().map(|g| g.dropped).sum(),
        shortfall: groups.iter().map(|g| g.shortfall).sum(),
        unparsed_cells,
        groups,
    }
}

fn numeric(cell: &Cell) -> Option<f64> {
    cell.as_text()?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::dedup::{canonicalize, flag};

    fn keys() -> Vec<String> {
        vec!["host".into()]
    }

    fn findings() -> Dataset {
        Dataset::from_text_rows(
            &["host", "t", "findings"],
            &[
                vec!["HR-LAP-001", "18-07-2025 10:22", "200"],
                vec!["HR-LAP-001", "24-10-2025 07:55", "67"],
                vec!["FIN-SRV-01", "10-04-2025 11:45", "150"],
                vec!["FIN-SRV-01", "24-10-2025 05:10", "45"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn ten_rows_down_to_seven() {
        let raw = Dataset::from_text_rows(&["h"], &vec![vec!["x"]; 10]).unwrap();
        let canonical = Dataset::from_text_rows(&["h"], &vec![vec!["x"]; 7]).unwrap();
        let m = summarize(&raw, &canonical);
        assert_eq!(m.total_rows, 10);
        assert_eq!(m.canonical_rows, 7);
        assert_eq!(m.discarded_rows, 3);
        assert_eq!(m.discard_rate_pct, 30.0);
    }

    #[test]
    fn empty_dataset_has_zero_rate() {
        let empty = Dataset::from_text_rows(&["h"], &[]).unwrap();
        let m = summarize(&empty, &empty);
        assert_eq!((m.total_rows, m.canonical_rows, m.discarded_rows), (0, 0, 0));
        assert_eq!(m.discard_rate_pct, 0.0);
    }

    #[test]
    fn exposure_reports_what_older_rows_carried() {
        let raw = findings();
        let canonical = canonicalize(&flag(&raw, &keys(), "t").unwrap());
        let m = summarize_with_exposure(&raw, &canonical, &keys(), &["findings".into()]).unwrap();

        let exposure = &m.exposure[0];
        assert_eq!(exposure.total, 462.0);
        assert_eq!(exposure.kept, 112.0);
        assert_eq!(exposure.dropped, 350.0);
        assert_eq!(exposure.shortfall, 238.0);

        let hr = exposure
            .groups
            .iter()
            .find(|g| g.key == vec![Some("HR-LAP-001".to_string())])
            .unwrap();
        assert_eq!((hr.rows, hr.total, hr.kept), (2, 267.0, 67.0));
        assert_eq!(hr.shortfall, 133.0);
        // BTreeMap order
        assert_eq!(exposure.groups[0].key, vec![Some("FIN-SRV-01".to_string())]);
    }

    #[test]
    fn non_numeric_cells_are_counted_not_summed() {
        let raw = Dataset::from_text_rows(
            &["host", "t", "findings"],
            &[
                vec!["A", "2025-01-01", "n/a"],
                vec!["A", "2025-02-01", "4"],
                vec!["B", "2025-02-01", ""],
            ],
        )
        .unwrap();
        let canonical = canonicalize(&flag(&raw, &keys(), "t").unwrap());
        let m = summarize_with_exposure(&raw, &canonical, &keys(), &["findings".into()]).unwrap();
        let exposure = &m.exposure[0];
        assert_eq!(exposure.unparsed_cells, 1);
        assert_eq!(exposure.total, 4.0);
        assert_eq!(exposure.dropped, 0.0);
        assert_eq!(exposure.shortfall, 0.0);
    }

    #[test]
    fn no_additive_fields_means_no_exposure() {
        let raw = findings();
        let m = summarize_with_exposure(&raw, &raw, &keys(), &[]).unwrap();
        assert!(m.exposure.is_empty());
        assert_eq!(m.discard_rate_pct, 0.0);
    }

    #[test]
    fn missing_additive_column_is_an_error() {
        let raw = findings();
        let err = summarize_with_exposure(&raw, &raw, &keys(), &["critical".into()]).unwrap_err();
        assert!(matches!(err, DedupError::MissingColumn(c) if c == "critical"));
    }
}
