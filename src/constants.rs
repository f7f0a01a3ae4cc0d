//! Column role defaults matching the host inventory export layout.
//! Every one of these can be overridden from the config file or the CLI.

pub const HOSTNAME_COLUMN: &str = "Hostname";
pub const FQDN_COLUMN: &str = "FQDN";
pub const LAST_ACTIVE_COLUMN: &str = "Last_Active (UTC)";
pub const SERIAL_NUMBER_COLUMN: &str = "Serial Number";

/// Name of the derived flag column appended by `flag`.
pub const IS_LATEST_COLUMN: &str = "is_latest";

pub const DEFAULT_CONFIG_PATH: &str = "host_dedup.toml";
pub const CONFIG_PATH_ENV: &str = "HOST_DEDUP_CONFIG";

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_DIR_ENV: &str = "HOST_DEDUP_LOG_DIR";

/// Candidate encodings, tried in order until one decodes the input.
pub const DEFAULT_ENCODINGS: [&str; 4] = ["utf-8", "latin-1", "cp1252", "iso-8859-1"];

pub fn default_entity_key_fields() -> Vec<String> {
    vec![HOSTNAME_COLUMN.to_string(), FQDN_COLUMN.to_string()]
}

pub fn default_identity_fields() -> Vec<String> {
    vec![SERIAL_NUMBER_COLUMN.to_string()]
}

pub fn default_encodings() -> Vec<String> {
    DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect()
}
