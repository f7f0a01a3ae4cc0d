//! Recency deduplication: flag the latest row(s) of every entity-key group.
//!
//! The algorithm is two explicit passes:
//! 1. fold every row into a map `group key -> max recency`, with
//!    `Recency::Missing` ordered below all real timestamps;
//! 2. flag each row whose recency equals its group's maximum.
//!
//! Ties at the maximum all stay latest, and a group whose rows are all
//! missing has `Missing` as its maximum, so every row in it stays latest.

use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::constants::IS_LATEST_COLUMN;
use crate::error::{DedupError, Result};
use crate::metrics;
use crate::pipeline::processing::normalize::cell_recency;
use crate::types::{Cell, Dataset, GroupKey, Recency, Row, RowId, Schema};

/// A dataset carrying the derived `is_latest` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedDataset {
    dataset: Dataset,
    flag_index: usize,
    group_count: usize,
}

impl FlaggedDataset {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn flag_column(&self) -> &str {
        &self.dataset.schema.columns()[self.flag_index]
    }

    /// Flags in row order.
    pub fn flags(&self) -> impl Iterator<Item = bool> + '_ {
        self.dataset
            .rows
            .iter()
            .map(move |row| row.get(self.flag_index).as_flag().unwrap_or(false))
    }

    pub fn flag_of(&self, id: RowId) -> Option<bool> {
        self.dataset
            .rows
            .iter()
            .find(|row| row.id == id)
            .and_then(|row| row.get(self.flag_index).as_flag())
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn latest_count(&self) -> usize {
        self.flags().filter(|f| *f).count()
    }

    /// The dataset with the flag column dropped, ready to be flagged again.
    pub fn stripped(&self) -> Dataset {
        self.dataset.without_column(self.flag_column())
    }
}

/// Flag every row of `dataset` using the default `is_latest` column name.
pub fn flag(
    dataset: &Dataset,
    entity_key_fields: &[String],
    recency_field: &str,
) -> Result<FlaggedDataset> {
    flag_with_column(dataset, entity_key_fields, recency_field, IS_LATEST_COLUMN)
}

/// Flag every row of `dataset`, writing the result to `flag_column`.
///
/// If the dataset already has `flag_column` its values are replaced, never
/// read. The input is left untouched.
#[instrument(skip(dataset, entity_key_fields), fields(rows = dataset.len()))]
pub fn flag_with_column(
    dataset: &Dataset,
    entity_key_fields: &[String],
    recency_field: &str,
    flag_column: &str,
) -> Result<FlaggedDataset> {
    let started = Instant::now();
    if entity_key_fields.is_empty() {
        return Err(DedupError::EmptyGroupKey);
    }
    let key_indices = dataset.schema.require_all(entity_key_fields)?;
    let recency_index = dataset.schema.require(recency_field)?;
    if entity_key_fields.iter().any(|f| f == flag_column) || recency_field == flag_column {
        return Err(DedupError::Config(format!(
            "Flag column '{}' collides with a role field",
            flag_column
        )));
    }

    let keyed: Vec<(GroupKey, Recency)> = dataset
        .rows
        .par_iter()
        .map(|row| (row.key(&key_indices), cell_recency(row.get(recency_index))))
        .collect();

    let maxima = group_maxima(&keyed);

    let flags: Vec<bool> = keyed
        .par_iter()
        .map(|(key, recency)| maxima.get(key).is_some_and(|max| max == recency))
        .collect();

    let (schema, flag_index) = schema_with_flag(&dataset.schema, flag_column)?;
    let rows: Vec<Row> = dataset
        .rows
        .iter()
        .zip(&flags)
        .map(|(row, &is_latest)| {
            let mut cells = row.cells.clone();
            cells.resize(dataset.schema.len(), Cell::Null);
            if flag_index < cells.len() {
                cells[flag_index] = Cell::Flag(is_latest);
            } else {
                cells.push(Cell::Flag(is_latest));
            }
            Row { id: row.id, cells }
        })
        .collect();

    let latest = flags.iter().filter(|f| **f).count();
    let multi_latest = multi_latest_groups(&keyed, &flags);
    metrics::dedup::flagged(rows.len(), maxima.len(), latest);
    metrics::dedup::multi_latest_groups(multi_latest);
    metrics::dedup::flag_duration(started.elapsed().as_secs_f64());
    info!(
        groups = maxima.len(),
        latest,
        multi_latest,
        "Flagged {} rows",
        rows.len()
    );

    Ok(FlaggedDataset {
        dataset: Dataset::new(schema, rows),
        flag_index,
        group_count: maxima.len(),
    })
}

/// First pass: the maximum recency of every group.
///
/// Groups are independent, so each rayon worker folds its share into a local
/// map and the maps are merged by taking the larger value per key.
pub fn group_maxima(keyed: &[(GroupKey, Recency)]) -> HashMap<GroupKey, Recency> {
    keyed
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<GroupKey, Recency>, (key, recency)| {
            merge_max(&mut acc, key.clone(), *recency);
            acc
        })
        .reduce(HashMap::new, |mut left, right| {
            for (key, recency) in right {
                merge_max(&mut left, key, recency);
            }
            left
        })
}

/// Keep only the rows flagged latest, in their original order.
pub fn canonicalize(flagged: &FlaggedDataset) -> Dataset {
    let rows: Vec<Row> = flagged
        .dataset
        .rows
        .iter()
        .filter(|row| row.get(flagged.flag_index).as_flag() == Some(true))
        .cloned()
        .collect();
    debug!(
        kept = rows.len(),
        dropped = flagged.dataset.len() - rows.len(),
        "Canonicalized"
    );
    Dataset::new(flagged.dataset.schema.clone(), rows)
}

fn merge_max(map: &mut HashMap<GroupKey, Recency>, key: GroupKey, recency: Recency) {
    map.entry(key)
        .and_modify(|max| {
            if recency > *max {
                *max = recency;
            }
        })
        .or_insert(recency);
}

fn schema_with_flag(schema: &Schema, flag_column: &str) -> Result<(Schema, usize)> {
    if let Some(index) = schema.index_of(flag_column) {
        return Ok((schema.clone(), index));
    }
    let mut columns = schema.columns().to_vec();
    columns.push(flag_column.to_string());
    let index = columns.len() - 1;
    Ok((Schema::new(columns)?, index))
}

fn multi_latest_groups(keyed: &[(GroupKey, Recency)], flags: &[bool]) -> usize {
    let mut latest_per_group: HashMap<&GroupKey, usize> = HashMap::new();
    for ((key, _), &is_latest) in keyed.iter().zip(flags) {
        if is_latest {
            *latest_per_group.entry(key).or_default() += 1;
        }
    }
    latest_per_group.values().filter(|n| **n > 1).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<String> {
        vec!["host".into(), "fqdn".into()]
    }

    fn hosts(rows: &[Vec<&str>]) -> Dataset {
        Dataset::from_text_rows(&["host", "fqdn", "t", "findings"], rows).unwrap()
    }

    fn flags_of(ds: &Dataset) -> Vec<bool> {
        flag(ds, &keys(), "t").unwrap().flags().collect()
    }

    #[test]
    fn newer_observation_wins() {
        let ds = hosts(&[
            vec!["X", "A", "2025-07-18", "200"],
            vec!["X", "A", "2025-10-24", "67"],
        ]);
        assert_eq!(flags_of(&ds), vec![false, true]);
    }

    #[test]
    fn all_missing_group_keeps_every_row() {
        let ds = hosts(&[vec!["Y", "B", "", "1"], vec!["Y", "B", "", "2"]]);
        assert_eq!(flags_of(&ds), vec![true, true]);
    }

    #[test]
    fn missing_never_beats_a_real_timestamp() {
        let ds = hosts(&[
            vec!["X", "A", "garbage", "1"],
            vec!["X", "A", "01-01-1990", "1"],
            vec!["X", "A", "", "1"],
        ]);
        assert_eq!(flags_of(&ds), vec![false, true, false]);
    }

    #[test]
    fn ties_at_the_maximum_all_stay_latest() {
        let ds = hosts(&[
            vec!["X", "A", "24-10-2025 07:55", "1"],
            vec!["X", "A", "18-07-2025 10:22", "1"],
            vec!["X", "A", "2025-10-24 07:55:00", "1"],
        ]);
        assert_eq!(flags_of(&ds), vec![true, false, true]);
    }

    #[test]
    fn month_names_and_twelve_hour_times_rank_by_time() {
        let ds = hosts(&[
            vec!["X", "A", "18-07-2025 10:22", "1"],
            vec!["X", "A", "24 Oct 2025 07:55", "1"],
            vec!["Y", "B", "18-07-2025 10:22 AM", "1"],
            vec!["Y", "B", "24-10-2025 07:55 PM", "1"],
        ]);
        assert_eq!(flags_of(&ds), vec![false, true, false, true]);
    }

    #[test]
    fn null_key_components_group_together() {
        let ds = hosts(&[
            vec!["X", "", "2025-01-01", "1"],
            vec!["X", "", "2025-02-01", "1"],
            vec!["X", "A", "2024-01-01", "1"],
        ]);
        let flagged = flag(&ds, &keys(), "t").unwrap();
        assert_eq!(flagged.group_count(), 2);
        assert_eq!(flagged.flags().collect::<Vec<_>>(), vec![false, true, true]);
    }

    #[test]
    fn flag_column_is_appended_and_input_untouched() {
        let ds = hosts(&[vec!["X", "A", "2025-01-01", "1"]]);
        let before = ds.clone();
        let flagged = flag(&ds, &keys(), "t").unwrap();
        assert_eq!(ds, before);
        assert_eq!(flagged.flag_column(), "is_latest");
        assert_eq!(flagged.dataset().schema.columns().len(), 5);
        assert_eq!(flagged.dataset().rows[0].cells[4], Cell::Flag(true));
    }

    #[test]
    fn stale_flags_in_input_are_replaced() {
        let ds = Dataset::from_text_rows(
            &["host", "fqdn", "t", "is_latest"],
            &[
                vec!["X", "A", "2025-07-18", "1"],
                vec!["X", "A", "2025-10-24", "0"],
            ],
        )
        .unwrap();
        let flagged = flag(&ds, &keys(), "t").unwrap();
        assert_eq!(flagged.dataset().schema.columns().len(), 4);
        assert_eq!(flagged.flags().collect::<Vec<_>>(), vec![false, true]);
    }

    #[test]
    fn canonicalize_keeps_latest_in_order() {
        let ds = hosts(&[
            vec!["X", "A", "2025-07-18", "200"],
            vec!["Z", "C", "2025-01-01", "5"],
            vec!["X", "A", "2025-10-24", "67"],
        ]);
        let canonical = canonicalize(&flag(&ds, &keys(), "t").unwrap());
        let ids: Vec<RowId> = canonical.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RowId(1), RowId(2)]);
    }

    #[test]
    fn structural_errors_fail_before_grouping() {
        let ds = hosts(&[vec!["X", "A", "2025-01-01", "1"]]);
        assert!(matches!(flag(&ds, &[], "t"), Err(DedupError::EmptyGroupKey)));
        assert!(matches!(
            flag(&ds, &["serial".into()], "t"),
            Err(DedupError::MissingColumn(c)) if c == "serial"
        ));
        assert!(matches!(
            flag(&ds, &keys(), "last_seen"),
            Err(DedupError::MissingColumn(c)) if c == "last_seen"
        ));
        assert!(matches!(
            flag_with_column(&ds, &keys(), "t", "host"),
            Err(DedupError::Config(_))
        ));
    }

    #[test]
    fn group_maxima_treats_missing_as_lowest() {
        let key = vec![Cell::text("X")];
        let ts = match crate::pipeline::processing::normalize::parse_recency("2025-01-01") {
            Recency::At(ts) => ts,
            Recency::Missing => panic!("fixture should parse"),
        };
        let keyed = vec![
            (key.clone(), Recency::Missing),
            (key.clone(), Recency::At(ts)),
            (vec![Cell::text("Y")], Recency::Missing),
        ];
        let maxima = group_maxima(&keyed);
        assert_eq!(maxima[&key], Recency::At(ts));
        assert_eq!(maxima[&vec![Cell::text("Y")]], Recency::Missing);
    }
}
