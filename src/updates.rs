use crate::actions::{ComposeKind, ContextAction};
use crate::state::{BusyState, ContextState, TemporaryPassword};

#[derive(uniffi::Enum, Clone, Debug)]
pub enum ContextUpdate {
    FullState(ContextState),
    TimeDifferenceChanged {
        rev: u64,
        time_difference: i64,
    },
    RecentPeersChanged {
        rev: u64,
        recent_peers: Vec<String>,
    },
    TemporaryPasswordChanged {
        rev: u64,
        temporary_password: Option<TemporaryPassword>,
    },
    BusyChanged {
        rev: u64,
        busy: BusyState,
    },
    MediaKeysChanged {
        rev: u64,
        enabled: bool,
    },
}

impl ContextUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            ContextUpdate::FullState(s) => s.rev,
            ContextUpdate::TimeDifferenceChanged { rev, .. } => *rev,
            ContextUpdate::RecentPeersChanged { rev, .. } => *rev,
            ContextUpdate::TemporaryPasswordChanged { rev, .. } => *rev,
            ContextUpdate::BusyChanged { rev, .. } => *rev,
            ContextUpdate::MediaKeysChanged { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(ContextAction),
    Internal(Box<InternalEvent>),
}

/// Results of spawned work re-entering the actor. Every event that can race
/// with a single-flight replacement carries the registry generation it was
/// spawned under; stale tokens are dropped on receipt.
#[derive(Debug)]
pub enum InternalEvent {
    // Collaborator lifecycle
    AccountBridgeAttached,

    // Timer results
    ServerTimeObserved { token: u64, server_time: i64 },
    TemporaryPasswordExpired { token: u64 },

    // Compose stage results
    ComposePeersSelected {
        kind: ComposeKind,
        token: u64,
        peer_ids: Vec<String>,
    },
    ComposeConfirmed {
        kind: ComposeKind,
        token: u64,
        peer_ids: Vec<String>,
        accepted: bool,
    },
    ComposeFinished {
        kind: ComposeKind,
        token: u64,
        chat_id: Option<String>,
    },
}
