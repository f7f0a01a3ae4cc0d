//! Metric recording helpers for each processing stage.
//!
//! These go through the `metrics` facade only. Nothing is exported unless the
//! embedding process installs a recorder, so calling them is always safe.

pub mod normalize {
    /// Record a successful load with the encoding that decoded it
    pub fn load_completed(encoding: &str, rows: usize) {
        ::metrics::counter!("host_dedup_loads_total", "encoding" => encoding.to_string()).increment(1);
        ::metrics::histogram!("host_dedup_load_rows").record(rows as f64);
    }

    /// Record that a candidate encoding failed to decode the input
    pub fn encoding_rejected(encoding: &str) {
        ::metrics::counter!("host_dedup_encoding_rejected_total", "encoding" => encoding.to_string())
            .increment(1);
    }

    /// Record recency values that fell back to the missing sentinel
    pub fn recency_parse_failures(count: usize) {
        ::metrics::counter!("host_dedup_recency_parse_failures_total").increment(count as u64);
    }
}

pub mod dedup {
    /// Record a flagging pass
    pub fn flagged(rows: usize, groups: usize, latest: usize) {
        ::metrics::counter!("host_dedup_flag_runs_total").increment(1);
        ::metrics::histogram!("host_dedup_groups_per_run").record(groups as f64);
        ::metrics::counter!("host_dedup_rows_flagged_latest_total").increment(latest as u64);
        ::metrics::counter!("host_dedup_rows_flagged_stale_total")
            .increment(rows.saturating_sub(latest) as u64);
    }

    /// Record groups where more than one row survived (ties or all-missing)
    pub fn multi_latest_groups(count: usize) {
        ::metrics::counter!("host_dedup_multi_latest_groups_total").increment(count as u64);
    }

    pub fn flag_duration(seconds: f64) {
        ::metrics::histogram!("host_dedup_flag_duration_seconds").record(seconds);
    }
}

pub mod summary {
    pub fn discard_rate(percent: f64) {
        ::metrics::gauge!("host_dedup_discard_rate_percent").set(percent);
    }

    /// Record additive totals dropped by canonicalization for one column
    pub fn value_lost(column: &str, lost: f64) {
        ::metrics::gauge!("host_dedup_additive_lost", "column" => column.to_string()).set(lost);
    }
}
