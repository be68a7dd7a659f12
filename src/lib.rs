mod actions;
mod bridges;
mod core;
mod logging;
mod media_keys;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

use crate::bridges::{store_slot, CollaboratorSlots};
use crate::updates::{CoreMsg, InternalEvent};

pub use actions::{ComposeKind, ContextAction};
pub use bridges::{
    AccountBridge, ComposePresenter, ConfirmPrompt, CreateConversationResult, MediaPlaybackHost,
    NavigationHost, PeerDirectory, PeerInfo,
};
pub use state::*;
pub use updates::ContextUpdate;

uniffi::setup_scaffolding!();

/// Activity predicate for callers that gate password reuse on the short
/// activity window instead of the 30-minute hard expiry; `state()` keeps
/// returning the password until the expiry timer fires.
#[uniffi::export]
pub fn is_temporary_password_active(password: TemporaryPassword, now: i64) -> bool {
    password.is_active(now)
}

#[uniffi::export(callback_interface)]
pub trait ContextReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: ContextUpdate);
}

/// Per-session context of the application shell. One instance per logged-in
/// session; owns the actor thread that holds all cross-cutting ephemeral
/// state (clock skew, recent peers, temporary password, compose flows).
#[derive(uniffi::Object)]
pub struct FfiContext {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<ContextUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<ContextState>>,
    slots: CollaboratorSlots,
}

#[uniffi::export]
impl FfiContext {
    #[uniffi::constructor]
    pub fn new(data_dir: String) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "FfiContext::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(ContextState::empty()));
        let slots = CollaboratorSlots::empty();

        // Actor loop thread (single threaded "context actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        let slots_for_core = slots.clone();
        thread::spawn(move || {
            let mut core = crate::core::ContextCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                slots_for_core,
            );
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            slots,
        })
    }

    pub fn state(&self) -> ContextState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: ContextAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn ContextReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    /// Attaching the bridge seeds the clock skew if the server time is
    /// already known and (re)starts the calibration loop.
    pub fn set_account_bridge(&self, bridge: Box<dyn AccountBridge>) {
        store_slot(&self.slots.account_bridge, Arc::from(bridge));
        let _ = self
            .core_tx
            .send(CoreMsg::Internal(Box::new(InternalEvent::AccountBridgeAttached)));
    }

    pub fn set_compose_presenter(&self, presenter: Box<dyn ComposePresenter>) {
        store_slot(&self.slots.compose_presenter, Arc::from(presenter));
    }

    pub fn set_peer_directory(&self, directory: Box<dyn PeerDirectory>) {
        store_slot(&self.slots.peer_directory, Arc::from(directory));
    }

    pub fn set_navigation_host(&self, navigation: Box<dyn NavigationHost>) {
        store_slot(&self.slots.navigation_host, Arc::from(navigation));
    }

    pub fn set_media_playback_host(&self, playback: Box<dyn MediaPlaybackHost>) {
        store_slot(&self.slots.media_playback_host, Arc::from(playback));
    }

    /// Cancels every outstanding timer and flow. Last-known skew and the
    /// recent-peers list survive; the temporary password does not.
    pub fn shutdown(&self) {
        self.dispatch(ContextAction::Teardown);
    }
}
