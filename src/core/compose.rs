// Compose pipelines: select -> confirm -> create -> navigate.
//
// Each stage runs on a worker task (the presenter calls block until the
// user answers) and re-enters the actor as a token-carrying internal event.
// All stages of one variant share TaskKey::Compose(kind); a re-entrant
// compose action therefore cancels whichever stage is outstanding.

use super::*;

use crate::bridges::{ConfirmPrompt, CreateConversationResult, SharedAccountBridge};

const GROUP_SELECT_LIMIT: u32 = 200;
const CHANNEL_SELECT_LIMIT: u32 = 200;
const SECRET_CHAT_SELECT_LIMIT: u32 = 1;

impl ComposeKind {
    fn tag(&self) -> &'static str {
        match self {
            ComposeKind::Group => "group",
            ComposeKind::Channel => "channel",
            ComposeKind::SecretChat => "secret_chat",
        }
    }

    fn selection_limit(&self) -> u32 {
        match self {
            ComposeKind::Group => GROUP_SELECT_LIMIT,
            ComposeKind::Channel => CHANNEL_SELECT_LIMIT,
            ComposeKind::SecretChat => SECRET_CHAT_SELECT_LIMIT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ComposeError {
    #[error("no account bridge attached")]
    ServiceUnavailable,
    #[error("creation failed: {0}")]
    Creation(String),
}

impl ContextCore {
    pub(super) fn start_compose(&mut self, kind: ComposeKind) {
        tracing::info!(kind = kind.tag(), "compose_start");
        self.set_compose_busy(kind, true);

        let handle = CancelHandle::new();
        let alive = handle.alive();
        let token = self.tasks.set(TaskKey::Compose(kind), handle);

        let presenter = self.slots.compose_presenter.clone();
        let tx = self.core_sender.clone();
        let join = self.runtime.spawn_blocking(move || {
            let peer_ids = match read_slot(&presenter) {
                Some(p) => p.select_peers(kind, kind.selection_limit()),
                None => Vec::new(),
            };
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ComposePeersSelected {
                    kind,
                    token,
                    peer_ids,
                },
            )));
        });
        self.tasks
            .attach_abort(TaskKey::Compose(kind), token, join.abort_handle());
    }

    pub(super) fn handle_compose_peers_selected(
        &mut self,
        kind: ComposeKind,
        token: u64,
        peer_ids: Vec<String>,
    ) {
        if !self.tasks.is_current(TaskKey::Compose(kind), token) {
            tracing::debug!(kind = kind.tag(), "stale selection result dropped");
            return;
        }
        if peer_ids.is_empty() {
            tracing::info!(kind = kind.tag(), "compose_dismissed");
            self.end_compose(kind, token);
            return;
        }

        let handle = CancelHandle::new();
        let alive = handle.alive();
        let token = self.tasks.set(TaskKey::Compose(kind), handle);

        let presenter = self.slots.compose_presenter.clone();
        let directory = self.slots.peer_directory.clone();
        let tx = self.core_sender.clone();
        let join = self.runtime.spawn_blocking(move || {
            // Exactly one peer gets an entity-named confirmation; a failed
            // directory lookup falls back to the countable prompt rather
            // than aborting, the confirmation itself is the gate.
            let prompt = match peer_ids.as_slice() {
                [only] => match read_slot(&directory).and_then(|d| d.load_peer(only.clone())) {
                    Some(peer) => ConfirmPrompt::NamedPeer {
                        display_name: peer.display_name,
                    },
                    None => ConfirmPrompt::MemberCount { count: 1 },
                },
                many => ConfirmPrompt::MemberCount {
                    count: many.len() as u32,
                },
            };
            let accepted = read_slot(&presenter)
                .map(|p| p.confirm(prompt))
                .unwrap_or(false);
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ComposeConfirmed {
                    kind,
                    token,
                    peer_ids,
                    accepted,
                },
            )));
        });
        self.tasks
            .attach_abort(TaskKey::Compose(kind), token, join.abort_handle());
    }

    pub(super) fn handle_compose_confirmed(
        &mut self,
        kind: ComposeKind,
        token: u64,
        peer_ids: Vec<String>,
        accepted: bool,
    ) {
        if !self.tasks.is_current(TaskKey::Compose(kind), token) {
            tracing::debug!(kind = kind.tag(), "stale confirmation result dropped");
            return;
        }
        if !accepted {
            tracing::info!(kind = kind.tag(), "compose_rejected");
            self.end_compose(kind, token);
            return;
        }

        let handle = CancelHandle::new();
        let alive = handle.alive();
        let token = self.tasks.set(TaskKey::Compose(kind), handle);

        let bridge = self.slots.account_bridge.clone();
        let tx = self.core_sender.clone();
        let join = self.runtime.spawn_blocking(move || {
            let chat_id = match create_conversation(&bridge, kind, &peer_ids) {
                Ok(chat_id) => Some(chat_id),
                Err(err) => {
                    // Swallowed: the flow ends without navigating and the
                    // shell sees no error, matching the shipped behavior.
                    tracing::warn!(kind = kind.tag(), %err, "compose_create_failed");
                    None
                }
            };
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ComposeFinished {
                    kind,
                    token,
                    chat_id,
                },
            )));
        });
        self.tasks
            .attach_abort(TaskKey::Compose(kind), token, join.abort_handle());
    }

    pub(super) fn handle_compose_finished(
        &mut self,
        kind: ComposeKind,
        token: u64,
        chat_id: Option<String>,
    ) {
        if !self.tasks.is_current(TaskKey::Compose(kind), token) {
            tracing::debug!(kind = kind.tag(), "stale creation result dropped");
            return;
        }
        self.end_compose(kind, token);

        let Some(chat_id) = chat_id else {
            return;
        };
        tracing::info!(kind = kind.tag(), chat_id = %chat_id, "compose_done");
        match read_slot(&self.slots.navigation_host) {
            Some(navigation) => navigation.push_conversation(chat_id),
            None => tracing::debug!("navigation host absent, push skipped"),
        }
    }

    fn end_compose(&mut self, kind: ComposeKind, token: u64) {
        self.tasks.finish(TaskKey::Compose(kind), token);
        self.set_compose_busy(kind, false);
    }

    fn set_compose_busy(&mut self, kind: ComposeKind, value: bool) {
        self.set_busy(|b| match kind {
            ComposeKind::Group => b.composing_group = value,
            ComposeKind::Channel => b.composing_channel = value,
            ComposeKind::SecretChat => b.composing_secret_chat = value,
        });
    }
}

fn create_conversation(
    bridge: &SharedAccountBridge,
    kind: ComposeKind,
    peer_ids: &[String],
) -> Result<String, ComposeError> {
    let bridge = read_slot(bridge).ok_or(ComposeError::ServiceUnavailable)?;
    let result = match kind {
        ComposeKind::Group => bridge.create_group(peer_ids.to_vec()),
        ComposeKind::Channel => bridge.create_channel(peer_ids.to_vec()),
        ComposeKind::SecretChat => match peer_ids.first() {
            Some(peer_id) => bridge.create_secret_chat(peer_id.clone()),
            None => return Err(ComposeError::Creation("empty selection".into())),
        },
    };
    into_chat_id(result)
}

fn into_chat_id(result: CreateConversationResult) -> Result<String, ComposeError> {
    if result.ok {
        result
            .chat_id
            .ok_or_else(|| ComposeError::Creation("missing chat id".into()))
    } else {
        Err(ComposeError::Creation(
            result
                .error_message
                .unwrap_or_else(|| "unknown error".into()),
        ))
    }
}
