use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const CLOCK_SYNC_INTERVAL_SECS: u64 = 5 * 60;
const TEMPORARY_PASSWORD_TTL_SECS: u64 = 30 * 60;

/// Optional overrides read from `<data_dir>/finch_config.json`. Both knobs
/// exist to keep Rust tests deterministic; production builds ship no config
/// file and run on the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct ContextConfig {
    pub(super) clock_sync_interval_secs: Option<u64>,
    pub(super) temporary_password_ttl_secs: Option<u64>,
}

pub(super) fn load_context_config(data_dir: &str) -> ContextConfig {
    let path = Path::new(data_dir).join("finch_config.json");
    let Ok(bytes) = std::fs::read(&path) else {
        return ContextConfig::default();
    };
    serde_json::from_slice::<ContextConfig>(&bytes).unwrap_or_default()
}

impl ContextConfig {
    pub(super) fn clock_sync_interval(&self) -> Duration {
        Duration::from_secs(self.clock_sync_interval_secs.unwrap_or(CLOCK_SYNC_INTERVAL_SECS))
    }

    pub(super) fn temporary_password_ttl(&self) -> Duration {
        Duration::from_secs(
            self.temporary_password_ttl_secs
                .unwrap_or(TEMPORARY_PASSWORD_TTL_SECS),
        )
    }
}
