/// Demo: what recency-based deduplication throws away.
///
/// Two hosts each have an older record with more vulnerability findings than
/// their latest record. Keeping only the latest row drops the older findings,
/// which a plain row count never shows.
use host_dedup::{
    config::{Config, RoleConfig},
    logging, output,
    types::Dataset,
    Pipeline,
};

const FINDINGS_COLUMN: &str = "Count of Vulnerability Findings";

fn mock_findings() -> host_dedup::error::Result<Dataset> {
    Dataset::from_text_rows(
        &[
            "Hostname",
            "FQDN",
            "Record Type",
            "Last_Active (UTC)",
            FINDINGS_COLUMN,
            "Critical Issues",
            "High Issues",
            "Medium Issues",
        ],
        &[
            vec!["HR-LAP-001", "hr-lap-001.corp.local", "Old Record (July 2025)", "18-07-2025 10:22", "200", "15", "45", "140"],
            vec!["HR-LAP-001", "hr-lap-001.corp.local", "Latest Record (Oct 2025)", "24-10-2025 07:55", "67", "8", "20", "39"],
            vec!["FIN-SRV-01", "fin-srv-01.corp.local", "Old Record (April 2025)", "10-04-2025 11:45", "150", "12", "35", "103"],
            vec!["FIN-SRV-01", "fin-srv-01.corp.local", "Latest Record (Oct 2025)", "24-10-2025 05:10", "45", "5", "15", "25"],
        ],
    )
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let pipeline = Pipeline::new(Config {
        roles: RoleConfig {
            additive_fields: vec![
                FINDINGS_COLUMN.to_string(),
                "Critical Issues".to_string(),
                "High Issues".to_string(),
                "Medium Issues".to_string(),
            ],
            ..RoleConfig::default()
        },
        ..Config::default()
    });

    let raw = mock_findings()?;
    let flagged = pipeline.flag(&raw)?;
    let canonical = host_dedup::dedup::canonicalize(&flagged);
    let metrics = pipeline.summarize(&raw, &canonical)?;

    println!("📋 Mock vulnerability findings (flagged):");
    output::write_csv(flagged.dataset(), std::io::stdout().lock())?;

    println!("\n🎯 Current logic impact");
    println!(
        "   Rows kept: {} of {} ({:.1}% discarded)",
        metrics.canonical_rows, metrics.total_rows, metrics.discard_rate_pct
    );
    for exposure in &metrics.exposure {
        println!(
            "   {}: kept {} of {} ({} only in discarded rows, latest short by {})",
            exposure.column, exposure.kept, exposure.total, exposure.dropped, exposure.shortfall
        );
    }

    if let Some(findings) = metrics.exposure.iter().find(|e| e.column == FINDINGS_COLUMN) {
        println!("\n❌ What gets lost:");
        for group in &findings.groups {
            let host = group.key.first().cloned().flatten().unwrap_or_default();
            println!(
                "   - {}: older records carried {} findings, latest keeps {} ({} lost)",
                host, group.dropped, group.kept, group.shortfall
            );
        }
        println!(
            "\n⚠️  Keeping only the latest record assumes it holds everything the older ones did. \
             Here it keeps {} findings and loses {}.",
            findings.kept, findings.shortfall
        );
    }

    Ok(())
}
