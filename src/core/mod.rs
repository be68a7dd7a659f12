mod clock;
mod compose;
mod config;
mod tasks;

use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::{ComposeKind, ContextAction};
use crate::bridges::{read_slot, CollaboratorSlots};
use crate::media_keys::{decode_media_key, MediaKeyCommand};
use crate::state::{now_seconds, BusyState, ContextState, RecentPeers, TemporaryPassword};
use crate::updates::{ContextUpdate, CoreMsg, InternalEvent};

use tasks::{CancelHandle, TaskKey, TaskRegistry};

pub(crate) struct ContextCore {
    state: ContextState,
    rev: u64,

    update_sender: Sender<ContextUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<ContextState>>,

    config: config::ContextConfig,
    runtime: tokio::runtime::Runtime,
    tasks: TaskRegistry,

    // Actor-internal: only the visible prefix is published in `state`.
    recent_peers: RecentPeers,

    slots: CollaboratorSlots,
}

impl ContextCore {
    pub(crate) fn new(
        update_sender: Sender<ContextUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<ContextState>>,
        slots: CollaboratorSlots,
    ) -> Self {
        let config = config::load_context_config(&data_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .expect("tokio runtime");

        let this = Self {
            state: ContextState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            tasks: TaskRegistry::default(),
            recent_peers: RecentPeers::default(),
            slots,
        };

        // Ensure FfiContext.state() has an immediately-available snapshot
        // and give late-attached listeners an initial full state (the
        // update channel buffers until the listener thread starts).
        this.commit_state();
        let _ = this
            .update_sender
            .send(ContextUpdate::FullState(this.state.clone()));
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn emit(&mut self, update: ContextUpdate) {
        self.commit_state();
        let _ = self.update_sender.send(update);
    }

    fn commit_state(&self) {
        let snapshot = self.state.clone();
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot,
            Err(poison) => *poison.into_inner() = snapshot,
        }
    }

    fn emit_time_difference(&mut self) {
        let rev = self.next_rev();
        self.emit(ContextUpdate::TimeDifferenceChanged {
            rev,
            time_difference: self.state.time_difference,
        });
    }

    fn emit_recent_peers(&mut self) {
        let rev = self.next_rev();
        self.emit(ContextUpdate::RecentPeersChanged {
            rev,
            recent_peers: self.state.recent_peers.clone(),
        });
    }

    fn emit_temporary_password(&mut self) {
        let rev = self.next_rev();
        self.emit(ContextUpdate::TemporaryPasswordChanged {
            rev,
            temporary_password: self.state.temporary_password.clone(),
        });
    }

    fn emit_busy(&mut self) {
        let rev = self.next_rev();
        self.emit(ContextUpdate::BusyChanged {
            rev,
            busy: self.state.busy.clone(),
        });
    }

    fn emit_media_keys(&mut self) {
        let rev = self.next_rev();
        self.emit(ContextUpdate::MediaKeysChanged {
            rev,
            enabled: self.state.media_keys_enabled,
        });
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_busy();
        }
    }

    pub(crate) fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_action(&mut self, action: ContextAction) {
        match action {
            // Recent peers
            ContextAction::TouchRecentPeer { peer_id } => {
                self.recent_peers.touch(&peer_id);
                self.sync_recent_peers();
            }
            ContextAction::DropRecentPeerIfHead { peer_id } => {
                if self.recent_peers.drop_if_head(&peer_id) {
                    self.sync_recent_peers();
                }
            }

            // Temporary password
            ContextAction::SetTemporaryPassword { password } => {
                self.set_temporary_password(password);
            }
            ContextAction::ClearTemporaryPassword => self.clear_temporary_password(),

            // Media keys
            ContextAction::SetMediaKeysEnabled { enabled } => {
                if self.state.media_keys_enabled != enabled {
                    self.state.media_keys_enabled = enabled;
                    self.emit_media_keys();
                }
            }
            ContextAction::MediaKey { data } => self.route_media_key(data),

            // Compose
            ContextAction::ComposeGroup => self.start_compose(ComposeKind::Group),
            ContextAction::ComposeChannel => self.start_compose(ComposeKind::Channel),
            ContextAction::ComposeSecretChat => self.start_compose(ComposeKind::SecretChat),

            // Lifecycle
            ContextAction::Teardown => self.teardown(),
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::AccountBridgeAttached => self.handle_account_bridge_attached(),
            InternalEvent::ServerTimeObserved { token, server_time } => {
                self.handle_server_time_observed(token, server_time);
            }
            InternalEvent::TemporaryPasswordExpired { token } => {
                self.handle_temporary_password_expired(token);
            }
            InternalEvent::ComposePeersSelected {
                kind,
                token,
                peer_ids,
            } => self.handle_compose_peers_selected(kind, token, peer_ids),
            InternalEvent::ComposeConfirmed {
                kind,
                token,
                peer_ids,
                accepted,
            } => self.handle_compose_confirmed(kind, token, peer_ids, accepted),
            InternalEvent::ComposeFinished {
                kind,
                token,
                chat_id,
            } => self.handle_compose_finished(kind, token, chat_id),
        }
    }

    fn sync_recent_peers(&mut self) {
        let visible = self.recent_peers.visible().to_vec();
        if visible != self.state.recent_peers {
            self.state.recent_peers = visible;
            self.emit_recent_peers();
        }
    }

    fn set_temporary_password(&mut self, password: String) {
        self.state.temporary_password = Some(TemporaryPassword {
            value: password,
            issued_at: now_seconds(),
        });
        self.emit_temporary_password();

        // Single-shot expiry; re-setting restarts the window from the new
        // issuance because `set` disposes the previous timer.
        let ttl = self.config.temporary_password_ttl();
        let handle = CancelHandle::new();
        let alive = handle.alive();
        let token = self.tasks.set(TaskKey::TemporaryPasswordExpiry, handle);
        let tx = self.core_sender.clone();
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::TemporaryPasswordExpired { token },
            )));
        });
        self.tasks
            .attach_abort(TaskKey::TemporaryPasswordExpiry, token, join.abort_handle());
        tracing::info!(ttl_secs = ttl.as_secs(), "temporary_password_set");
    }

    fn clear_temporary_password(&mut self) {
        self.tasks.cancel(TaskKey::TemporaryPasswordExpiry);
        if self.state.temporary_password.is_some() {
            self.state.temporary_password = None;
            self.emit_temporary_password();
        }
    }

    fn handle_temporary_password_expired(&mut self, token: u64) {
        // Stale tokens belong to a timer that was re-set or cleared.
        if !self.tasks.is_current(TaskKey::TemporaryPasswordExpiry, token) {
            return;
        }
        self.tasks.finish(TaskKey::TemporaryPasswordExpiry, token);
        tracing::info!("temporary_password_expired");
        if self.state.temporary_password.is_some() {
            self.state.temporary_password = None;
            self.emit_temporary_password();
        }
    }

    fn route_media_key(&mut self, data: i64) {
        if !self.state.media_keys_enabled {
            return;
        }
        let Some(command) = decode_media_key(data) else {
            return;
        };
        let Some(playback) = read_slot(&self.slots.media_playback_host) else {
            tracing::debug!(?command, "media key dropped, playback host absent");
            return;
        };
        tracing::debug!(?command, "media_key");
        match command {
            MediaKeyCommand::PlayPause => playback.play_pause(),
            MediaKeyCommand::Next => playback.next(),
            MediaKeyCommand::Previous => playback.previous(),
        }
    }

    fn teardown(&mut self) {
        tracing::info!("teardown");
        self.tasks.dispose_all();
        // The expiry timer is gone with the registry; a password with no
        // scheduled destruction must not linger.
        if self.state.temporary_password.is_some() {
            self.state.temporary_password = None;
            self.emit_temporary_password();
        }
        if self.state.media_keys_enabled {
            self.state.media_keys_enabled = false;
            self.emit_media_keys();
        }
    }
}
