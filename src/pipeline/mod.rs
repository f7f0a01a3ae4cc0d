// Dedup pipeline: normalize -> flag -> canonicalize -> summarize

pub mod processing;

use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::types::Dataset;

pub use processing::dedup::{canonicalize, flag, flag_with_column, FlaggedDataset};
pub use processing::normalize::{load, load_path, DuplicateReport, LoadReport, LoadedDataset};
pub use processing::summary::{summarize, summarize_with_exposure, Metrics};

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub load: LoadReport,
    pub duplicates: DuplicateReport,
    pub flagged: FlaggedDataset,
    pub canonical: Dataset,
    pub metrics: Metrics,
}

/// What a run reports about itself, without the datasets.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub load: &'a LoadReport,
    pub groups: usize,
    pub metrics: &'a Metrics,
}

impl PipelineResult {
    pub fn report(&self) -> RunReport<'_> {
        RunReport {
            load: &self.load,
            groups: self.flagged.group_count(),
            metrics: &self.metrics,
        }
    }
}

/// Runs the stages in the order the presentation layer would call them, with
/// the column roles taken from one `Config`.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load(&self, bytes: &[u8]) -> Result<LoadedDataset> {
        load(bytes, &self.config.roles, &self.config.normalize)
    }

    pub fn load_path(&self, path: &Path) -> Result<LoadedDataset> {
        load_path(path, &self.config.roles, &self.config.normalize)
    }

    pub fn flag(&self, dataset: &Dataset) -> Result<FlaggedDataset> {
        let roles = &self.config.roles;
        flag_with_column(
            dataset,
            &roles.entity_key_fields,
            &roles.recency_field,
            &roles.flag_column,
        )
    }

    pub fn summarize(&self, raw: &Dataset, canonical: &Dataset) -> Result<Metrics> {
        let roles = &self.config.roles;
        summarize_with_exposure(raw, canonical, &roles.entity_key_fields, &roles.additive_fields)
    }

    /// Run every stage over already-loaded data.
    #[instrument(skip(self, loaded), fields(rows = loaded.dataset.len()))]
    pub fn run_loaded(&self, loaded: LoadedDataset) -> Result<PipelineResult> {
        let flagged = self.flag(&loaded.dataset)?;
        let canonical = canonicalize(&flagged);
        let metrics = self.summarize(&loaded.dataset, &canonical)?;
        info!(
            "✅ Kept {} of {} rows across {} hosts",
            metrics.canonical_rows,
            metrics.total_rows,
            flagged.group_count()
        );

        Ok(PipelineResult {
            load: loaded.report,
            duplicates: loaded.duplicates,
            flagged,
            canonical,
            metrics,
        })
    }

    pub fn run_bytes(&self, bytes: &[u8]) -> Result<PipelineResult> {
        self.run_loaded(self.load(bytes)?)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn run_path(&self, path: &Path) -> Result<PipelineResult> {
        self.run_loaded(self.load_path(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConfig;

    const INVENTORY: &str = "Hostname,FQDN,Last_Active (UTC),Serial Number,Count of Vulnerability Findings\n\
HR-LAP-001,hr-lap-001.corp.local,18-07-2025 10:22,SN-1,200\n\
HR-LAP-001,hr-lap-001.corp.local,24-10-2025 07:55,SN-1,67\n\
FIN-SRV-01,fin-srv-01.corp.local,,SN-2,10\n\
FIN-SRV-01,fin-srv-01.corp.local,,SN-2,12\n";

    fn pipeline() -> Pipeline {
        Pipeline::new(Config {
            roles: RoleConfig {
                additive_fields: vec!["Count of Vulnerability Findings".into()],
                ..RoleConfig::default()
            },
            ..Config::default()
        })
    }

    #[test]
    fn run_bytes_chains_every_stage() {
        let result = pipeline().run_bytes(INVENTORY.as_bytes()).unwrap();
        assert_eq!(result.flagged.flags().collect::<Vec<_>>(), vec![false, true, true, true]);
        assert_eq!(result.canonical.len(), 3);
        assert_eq!(result.metrics.discarded_rows, 1);
        assert_eq!(result.metrics.discard_rate_pct, 25.0);
        assert_eq!(result.metrics.exposure[0].dropped, 200.0);

        let report = result.report();
        assert_eq!(report.groups, 2);
        assert_eq!(report.load.rows, 4);
    }

    #[test]
    fn flag_column_name_comes_from_config() {
        let mut config = Config::default();
        config.roles.flag_column = "latest_flag".into();
        let result = Pipeline::new(config).run_bytes(INVENTORY.as_bytes()).unwrap();
        assert_eq!(result.flagged.flag_column(), "latest_flag");
    }
}
