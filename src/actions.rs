/// Conversation variants the compose entry points can start.
#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposeKind {
    Group,
    Channel,
    SecretChat,
}

#[derive(uniffi::Enum, Debug, Clone)]
pub enum ContextAction {
    // Recent peers
    TouchRecentPeer { peer_id: String },
    DropRecentPeerIfHead { peer_id: String },

    // Temporary password
    SetTemporaryPassword { password: String },
    ClearTemporaryPassword,

    // Media keys
    SetMediaKeysEnabled { enabled: bool },
    MediaKey { data: i64 },

    // Compose
    ComposeGroup,
    ComposeChannel,
    ComposeSecretChat,

    // Lifecycle
    Teardown,
}

impl ContextAction {
    /// Log-safe action tag (never includes secrets like the password value).
    pub fn tag(&self) -> &'static str {
        match self {
            // Recent peers
            ContextAction::TouchRecentPeer { .. } => "TouchRecentPeer",
            ContextAction::DropRecentPeerIfHead { .. } => "DropRecentPeerIfHead",

            // Temporary password
            ContextAction::SetTemporaryPassword { .. } => "SetTemporaryPassword",
            ContextAction::ClearTemporaryPassword => "ClearTemporaryPassword",

            // Media keys
            ContextAction::SetMediaKeysEnabled { .. } => "SetMediaKeysEnabled",
            ContextAction::MediaKey { .. } => "MediaKey",

            // Compose
            ContextAction::ComposeGroup => "ComposeGroup",
            ContextAction::ComposeChannel => "ComposeChannel",
            ContextAction::ComposeSecretChat => "ComposeSecretChat",

            // Lifecycle
            ContextAction::Teardown => "Teardown",
        }
    }
}
