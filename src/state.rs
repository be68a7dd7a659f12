pub const RECENT_PEERS_STORAGE_CAP: usize = 5;
pub const RECENT_PEERS_VISIBLE_CAP: usize = 3;

/// Window after issuance during which callers may reuse the password without
/// re-prompting. Independent of the 30-minute hard-expiry timer enforced by
/// the core; the password can be present but inactive.
pub const TEMPORARY_PASSWORD_ACTIVITY_WINDOW_SECS: i64 = 15 * 60;

#[derive(uniffi::Record, Clone, Debug)]
pub struct ContextState {
    pub rev: u64,
    /// Seconds the server clock is ahead of (positive) or behind the local
    /// clock. Updated only by successful calibration.
    pub time_difference: i64,
    /// Display view of the recently-contacted peers, at most
    /// `RECENT_PEERS_VISIBLE_CAP` entries, most recent first.
    pub recent_peers: Vec<String>,
    pub temporary_password: Option<TemporaryPassword>,
    pub busy: BusyState,
    pub media_keys_enabled: bool,
}

impl ContextState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            time_difference: 0,
            recent_peers: vec![],
            temporary_password: None,
            busy: BusyState::idle(),
            media_keys_enabled: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct TemporaryPassword {
    pub value: String,
    pub issued_at: i64,
}

impl TemporaryPassword {
    pub fn is_active(&self, now: i64) -> bool {
        now < self.issued_at + TEMPORARY_PASSWORD_ACTIVITY_WINDOW_SECS
    }
}

/// "In flight" flags for the compose pipelines so the shell can reflect
/// long-ish operations without native-side heuristics.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub composing_group: bool,
    pub composing_channel: bool,
    pub composing_secret_chat: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            composing_group: false,
            composing_channel: false,
            composing_secret_chat: false,
        }
    }
}

/// Recently-contacted peers, most recent first, no duplicates.
///
/// Storage keeps up to `RECENT_PEERS_STORAGE_CAP` entries; the UI only ever
/// sees the `RECENT_PEERS_VISIBLE_CAP`-entry prefix via `visible()`.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecentPeers {
    storage: Vec<String>,
}

impl RecentPeers {
    pub(crate) fn touch(&mut self, peer_id: &str) {
        self.storage.retain(|p| p != peer_id);
        self.storage.insert(0, peer_id.to_string());
        self.storage.truncate(RECENT_PEERS_STORAGE_CAP);
    }

    /// Removes `peer_id` only if it sits at the front. Used to keep the
    /// active conversation's peer out of the suggestion row.
    pub(crate) fn drop_if_head(&mut self, peer_id: &str) -> bool {
        if self.storage.first().map(String::as_str) == Some(peer_id) {
            self.storage.remove(0);
            true
        } else {
            false
        }
    }

    pub(crate) fn visible(&self) -> &[String] {
        &self.storage[..self.storage.len().min(RECENT_PEERS_VISIBLE_CAP)]
    }

    #[cfg(test)]
    fn storage(&self) -> &[String] {
        &self.storage
    }
}

pub fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
