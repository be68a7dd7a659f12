//! Collaborator contracts the embedding shell provides.
//!
//! Every collaborator lives in a slot that may be empty; use sites re-read
//! the slot and tolerate absence (the context can outlive, or be outlived
//! by, any of them).

use std::sync::{Arc, RwLock};

use crate::actions::ComposeKind;

pub(crate) type SharedAccountBridge = Arc<RwLock<Option<Arc<dyn AccountBridge>>>>;
pub(crate) type SharedComposePresenter = Arc<RwLock<Option<Arc<dyn ComposePresenter>>>>;
pub(crate) type SharedPeerDirectory = Arc<RwLock<Option<Arc<dyn PeerDirectory>>>>;
pub(crate) type SharedNavigationHost = Arc<RwLock<Option<Arc<dyn NavigationHost>>>>;
pub(crate) type SharedMediaPlaybackHost = Arc<RwLock<Option<Arc<dyn MediaPlaybackHost>>>>;

pub(crate) fn read_slot<T: ?Sized>(slot: &Arc<RwLock<Option<Arc<T>>>>) -> Option<Arc<T>> {
    match slot.read() {
        Ok(g) => g.clone(),
        Err(poison) => poison.into_inner().clone(),
    }
}

pub(crate) fn store_slot<T: ?Sized>(slot: &Arc<RwLock<Option<Arc<T>>>>, value: Arc<T>) {
    match slot.write() {
        Ok(mut g) => *g = Some(value),
        Err(poison) => *poison.into_inner() = Some(value),
    }
}

/// All collaborator slots handed to the actor at construction. The facade
/// keeps clones so the shell can attach collaborators at any time.
#[derive(Clone)]
pub(crate) struct CollaboratorSlots {
    pub(crate) account_bridge: SharedAccountBridge,
    pub(crate) compose_presenter: SharedComposePresenter,
    pub(crate) peer_directory: SharedPeerDirectory,
    pub(crate) navigation_host: SharedNavigationHost,
    pub(crate) media_playback_host: SharedMediaPlaybackHost,
}

impl CollaboratorSlots {
    pub(crate) fn empty() -> Self {
        Self {
            account_bridge: Arc::new(RwLock::new(None)),
            compose_presenter: Arc::new(RwLock::new(None)),
            peer_directory: Arc::new(RwLock::new(None)),
            navigation_host: Arc::new(RwLock::new(None)),
            media_playback_host: Arc::new(RwLock::new(None)),
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct CreateConversationResult {
    pub ok: bool,
    pub chat_id: Option<String>,
    pub error_message: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: String,
    pub display_name: String,
}

/// Confirmation the shell must put in front of the user before a compose
/// flow creates anything. The shell localizes; variants stay semantic.
#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum ConfirmPrompt {
    NamedPeer { display_name: String },
    MemberCount { count: u32 },
}

/// Session-side surface: server clock plus the conversation creation calls.
/// `current_server_time` returns 0 while the server time is still unknown.
#[uniffi::export(callback_interface)]
pub trait AccountBridge: Send + Sync + 'static {
    fn current_server_time(&self) -> i64;
    fn create_group(&self, member_ids: Vec<String>) -> CreateConversationResult;
    fn create_channel(&self, member_ids: Vec<String>) -> CreateConversationResult;
    fn create_secret_chat(&self, peer_id: String) -> CreateConversationResult;
}

/// Modal UI for the compose pipelines. Both calls block until the user
/// answers and are only ever invoked from worker tasks, never from the
/// actor thread. An empty selection means the picker was dismissed.
#[uniffi::export(callback_interface)]
pub trait ComposePresenter: Send + Sync + 'static {
    fn select_peers(&self, kind: ComposeKind, limit: u32) -> Vec<String>;
    fn confirm(&self, prompt: ConfirmPrompt) -> bool;
}

#[uniffi::export(callback_interface)]
pub trait PeerDirectory: Send + Sync + 'static {
    fn load_peer(&self, peer_id: String) -> Option<PeerInfo>;
}

#[uniffi::export(callback_interface)]
pub trait NavigationHost: Send + Sync + 'static {
    fn push_conversation(&self, chat_id: String);
}

#[uniffi::export(callback_interface)]
pub trait MediaPlaybackHost: Send + Sync + 'static {
    fn play_pause(&self);
    fn next(&self);
    fn previous(&self);
}
