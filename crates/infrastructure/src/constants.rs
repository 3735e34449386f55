//! Process-wide defaults shared between config and CLI.

pub const DEFAULT_CONFIG_PATH: &str = "/etc/aegisx/config.yaml";
pub const DEFAULT_TABLE_NAME: &str = "aegisx";
pub const DEFAULT_POLICY_DIR: &str = "/etc/aegisx/policies";
pub const DEFAULT_ROLLBACK_DIR: &str = "/var/lib/aegisx/rollback";
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 10;
