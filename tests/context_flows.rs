use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use finch_core::{
    now_seconds, AccountBridge, ComposeKind, ComposePresenter, ConfirmPrompt, ContextAction,
    ContextReconciler, ContextUpdate, CreateConversationResult, FfiContext, MediaPlaybackHost,
    NavigationHost, PeerDirectory, PeerInfo,
};
use tempfile::tempdir;

fn write_config(data_dir: &str, clock_sync_secs: Option<u64>, password_ttl_secs: Option<u64>) {
    let path = std::path::Path::new(data_dir).join("finch_config.json");
    let mut v = serde_json::json!({});
    if let Some(secs) = clock_sync_secs {
        v["clock_sync_interval_secs"] = serde_json::Value::from(secs);
    }
    if let Some(secs) = password_ttl_secs {
        v["temporary_password_ttl_secs"] = serde_json::Value::from(secs);
    }
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

fn media_key_payload(key_code: i64, state: i64) -> i64 {
    (key_code << 16) | (state << 8)
}

struct TestReconciler {
    updates: Arc<Mutex<Vec<ContextUpdate>>>,
}

impl TestReconciler {
    fn new() -> (Self, Arc<Mutex<Vec<ContextUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl ContextReconciler for TestReconciler {
    fn reconcile(&self, update: ContextUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

#[derive(Clone)]
struct MockAccountBridge {
    // 0 means "server time unknown"; anything else is now + offset.
    server_time_offset: Arc<Mutex<i64>>,
    group_calls: Arc<Mutex<Vec<Vec<String>>>>,
    channel_calls: Arc<Mutex<Vec<Vec<String>>>>,
    secret_calls: Arc<Mutex<Vec<String>>>,
    create_result: Arc<Mutex<CreateConversationResult>>,
}

impl MockAccountBridge {
    fn new() -> Self {
        Self {
            server_time_offset: Arc::new(Mutex::new(0)),
            group_calls: Arc::new(Mutex::new(vec![])),
            channel_calls: Arc::new(Mutex::new(vec![])),
            secret_calls: Arc::new(Mutex::new(vec![])),
            create_result: Arc::new(Mutex::new(CreateConversationResult {
                ok: true,
                chat_id: Some("chat-1".into()),
                error_message: None,
            })),
        }
    }

    fn set_server_time_offset(&self, offset: i64) {
        *self.server_time_offset.lock().unwrap() = offset;
    }

    fn set_create_result(&self, result: CreateConversationResult) {
        *self.create_result.lock().unwrap() = result;
    }

    fn create_calls(&self) -> usize {
        self.group_calls.lock().unwrap().len()
            + self.channel_calls.lock().unwrap().len()
            + self.secret_calls.lock().unwrap().len()
    }
}

impl AccountBridge for MockAccountBridge {
    fn current_server_time(&self) -> i64 {
        let offset = *self.server_time_offset.lock().unwrap();
        if offset == 0 {
            0
        } else {
            now_seconds() + offset
        }
    }

    fn create_group(&self, member_ids: Vec<String>) -> CreateConversationResult {
        self.group_calls.lock().unwrap().push(member_ids);
        self.create_result.lock().unwrap().clone()
    }

    fn create_channel(&self, member_ids: Vec<String>) -> CreateConversationResult {
        self.channel_calls.lock().unwrap().push(member_ids);
        self.create_result.lock().unwrap().clone()
    }

    fn create_secret_chat(&self, peer_id: String) -> CreateConversationResult {
        self.secret_calls.lock().unwrap().push(peer_id);
        self.create_result.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct MockComposePresenter {
    selection: Arc<Mutex<Vec<String>>>,
    accept: Arc<Mutex<bool>>,
    prompts: Arc<Mutex<Vec<ConfirmPrompt>>>,
    select_calls: Arc<Mutex<u32>>,
    select_limits: Arc<Mutex<Vec<u32>>>,
    // When present, select_peers blocks until the gate is released.
    gate: Option<Arc<(Mutex<bool>, Condvar)>>,
}

impl MockComposePresenter {
    fn new(selection: Vec<&str>, accept: bool) -> Self {
        Self {
            selection: Arc::new(Mutex::new(
                selection.into_iter().map(str::to_string).collect(),
            )),
            accept: Arc::new(Mutex::new(accept)),
            prompts: Arc::new(Mutex::new(vec![])),
            select_calls: Arc::new(Mutex::new(0)),
            select_limits: Arc::new(Mutex::new(vec![])),
            gate: None,
        }
    }

    fn gated(selection: Vec<&str>, accept: bool) -> (Self, Arc<(Mutex<bool>, Condvar)>) {
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let mut presenter = Self::new(selection, accept);
        presenter.gate = Some(gate.clone());
        (presenter, gate)
    }

    fn select_calls(&self) -> u32 {
        *self.select_calls.lock().unwrap()
    }

    fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

fn release_gate(gate: &Arc<(Mutex<bool>, Condvar)>) {
    let (lock, cvar) = &**gate;
    *lock.lock().unwrap() = true;
    cvar.notify_all();
}

impl ComposePresenter for MockComposePresenter {
    fn select_peers(&self, _kind: ComposeKind, limit: u32) -> Vec<String> {
        *self.select_calls.lock().unwrap() += 1;
        self.select_limits.lock().unwrap().push(limit);
        if let Some(gate) = &self.gate {
            let (lock, cvar) = &**gate;
            let mut released = lock.lock().unwrap();
            while !*released {
                released = cvar.wait(released).unwrap();
            }
        }
        let selection = self.selection.lock().unwrap().clone();
        selection.into_iter().take(limit as usize).collect()
    }

    fn confirm(&self, prompt: ConfirmPrompt) -> bool {
        self.prompts.lock().unwrap().push(prompt);
        *self.accept.lock().unwrap()
    }
}

#[derive(Clone)]
struct MockPeerDirectory {
    names: Arc<Mutex<HashMap<String, String>>>,
}

impl MockPeerDirectory {
    fn with(entries: &[(&str, &str)]) -> Self {
        let names = entries
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        Self {
            names: Arc::new(Mutex::new(names)),
        }
    }
}

impl PeerDirectory for MockPeerDirectory {
    fn load_peer(&self, peer_id: String) -> Option<PeerInfo> {
        self.names
            .lock()
            .unwrap()
            .get(&peer_id)
            .map(|name| PeerInfo {
                peer_id: peer_id.clone(),
                display_name: name.clone(),
            })
    }
}

#[derive(Clone)]
struct MockNavigationHost {
    pushes: Arc<Mutex<Vec<String>>>,
}

impl MockNavigationHost {
    fn new() -> Self {
        Self {
            pushes: Arc::new(Mutex::new(vec![])),
        }
    }

    fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }
}

impl NavigationHost for MockNavigationHost {
    fn push_conversation(&self, chat_id: String) {
        self.pushes.lock().unwrap().push(chat_id);
    }
}

#[derive(Clone)]
struct MockMediaPlaybackHost {
    play_pause: Arc<Mutex<u32>>,
    next: Arc<Mutex<u32>>,
    previous: Arc<Mutex<u32>>,
}

impl MockMediaPlaybackHost {
    fn new() -> Self {
        Self {
            play_pause: Arc::new(Mutex::new(0)),
            next: Arc::new(Mutex::new(0)),
            previous: Arc::new(Mutex::new(0)),
        }
    }

    fn counts(&self) -> (u32, u32, u32) {
        (
            *self.play_pause.lock().unwrap(),
            *self.next.lock().unwrap(),
            *self.previous.lock().unwrap(),
        )
    }
}

impl MediaPlaybackHost for MockMediaPlaybackHost {
    fn play_pause(&self) {
        *self.play_pause.lock().unwrap() += 1;
    }

    fn next(&self) {
        *self.next.lock().unwrap() += 1;
    }

    fn previous(&self) {
        *self.previous.lock().unwrap() += 1;
    }
}

struct ComposeHarness {
    ctx: Arc<FfiContext>,
    bridge: MockAccountBridge,
    presenter: MockComposePresenter,
    navigation: MockNavigationHost,
    _dir: tempfile::TempDir,
}

fn compose_harness(presenter: MockComposePresenter) -> ComposeHarness {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());
    let bridge = MockAccountBridge::new();
    let navigation = MockNavigationHost::new();
    ctx.set_account_bridge(Box::new(bridge.clone()));
    ctx.set_compose_presenter(Box::new(presenter.clone()));
    ctx.set_peer_directory(Box::new(MockPeerDirectory::with(&[("peer-a", "Alice")])));
    ctx.set_navigation_host(Box::new(navigation.clone()));
    ComposeHarness {
        ctx,
        bridge,
        presenter,
        navigation,
        _dir: dir,
    }
}

#[test]
fn attaching_the_bridge_seeds_the_clock_skew() {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());
    assert_eq!(ctx.state().time_difference, 0);

    let bridge = MockAccountBridge::new();
    bridge.set_server_time_offset(1000);
    ctx.set_account_bridge(Box::new(bridge.clone()));

    wait_until("skew seeded", Duration::from_secs(2), || {
        (998..=1002).contains(&ctx.state().time_difference)
    });
}

#[test]
fn calibration_overwrites_on_success_and_retains_on_failure() {
    let dir = tempdir().unwrap();
    write_config(&dir.path().to_string_lossy(), Some(1), None);
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());

    let bridge = MockAccountBridge::new();
    bridge.set_server_time_offset(1000);
    ctx.set_account_bridge(Box::new(bridge.clone()));
    wait_until("skew seeded", Duration::from_secs(2), || {
        (998..=1002).contains(&ctx.state().time_difference)
    });

    // Server time becomes unknown; ticks keep arriving but the last skew
    // must survive them.
    bridge.set_server_time_offset(0);
    std::thread::sleep(Duration::from_millis(2500));
    assert!((998..=1002).contains(&ctx.state().time_difference));

    bridge.set_server_time_offset(2000);
    wait_until("skew recalibrated", Duration::from_secs(3), || {
        (1998..=2002).contains(&ctx.state().time_difference)
    });
}

#[test]
fn resetting_the_password_restarts_the_expiry_window() {
    let dir = tempdir().unwrap();
    write_config(&dir.path().to_string_lossy(), None, Some(2));
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());

    ctx.dispatch(ContextAction::SetTemporaryPassword {
        password: "first".into(),
    });
    wait_until("first password stored", Duration::from_secs(1), || {
        ctx.state()
            .temporary_password
            .map(|p| p.value == "first")
            .unwrap_or(false)
    });

    std::thread::sleep(Duration::from_millis(1000));
    ctx.dispatch(ContextAction::SetTemporaryPassword {
        password: "second".into(),
    });
    wait_until("second password stored", Duration::from_secs(1), || {
        ctx.state()
            .temporary_password
            .map(|p| p.value == "second")
            .unwrap_or(false)
    });

    // The first timer's deadline passes here; it must not clear the second
    // password because re-setting disposed it.
    std::thread::sleep(Duration::from_millis(1300));
    assert_eq!(
        ctx.state().temporary_password.map(|p| p.value),
        Some("second".to_string())
    );

    wait_until("second password expires", Duration::from_secs(3), || {
        ctx.state().temporary_password.is_none()
    });
}

#[test]
fn clearing_the_password_disposes_the_pending_timer() {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());

    ctx.dispatch(ContextAction::SetTemporaryPassword {
        password: "1234".into(),
    });
    wait_until("password stored", Duration::from_secs(1), || {
        ctx.state().temporary_password.is_some()
    });

    ctx.dispatch(ContextAction::ClearTemporaryPassword);
    wait_until("password cleared", Duration::from_secs(1), || {
        ctx.state().temporary_password.is_none()
    });
}

#[test]
fn secret_chat_compose_confirms_by_name_and_navigates() {
    let harness = compose_harness(MockComposePresenter::new(vec!["peer-a"], true));
    harness.ctx.dispatch(ContextAction::ComposeSecretChat);

    wait_until("conversation pushed", Duration::from_secs(3), || {
        harness.navigation.pushes() == ["chat-1"]
    });
    assert_eq!(
        harness.presenter.prompts(),
        [ConfirmPrompt::NamedPeer {
            display_name: "Alice".into()
        }]
    );
    assert_eq!(
        harness.bridge.secret_calls.lock().unwrap().clone(),
        ["peer-a"]
    );
    assert_eq!(
        harness.presenter.select_limits.lock().unwrap().clone(),
        [1]
    );
    wait_until("busy cleared", Duration::from_secs(1), || {
        !harness.ctx.state().busy.composing_secret_chat
    });
}

#[test]
fn group_compose_uses_a_count_prompt_and_rejection_aborts() {
    let harness = compose_harness(MockComposePresenter::new(
        vec!["peer-a", "peer-b", "peer-c"],
        false,
    ));
    harness.ctx.dispatch(ContextAction::ComposeGroup);

    wait_until("confirmation shown", Duration::from_secs(3), || {
        !harness.presenter.prompts().is_empty()
    });
    assert_eq!(
        harness.presenter.prompts(),
        [ConfirmPrompt::MemberCount { count: 3 }]
    );

    wait_until("busy cleared", Duration::from_secs(2), || {
        !harness.ctx.state().busy.composing_group
    });
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(harness.bridge.create_calls(), 0);
    assert!(harness.navigation.pushes().is_empty());
}

#[test]
fn creation_failure_is_swallowed_without_navigation() {
    let harness = compose_harness(MockComposePresenter::new(vec!["peer-a"], true));
    harness.bridge.set_create_result(CreateConversationResult {
        ok: false,
        chat_id: None,
        error_message: Some("peer has no encryption keys".into()),
    });
    harness.ctx.dispatch(ContextAction::ComposeSecretChat);

    wait_until("creation attempted", Duration::from_secs(3), || {
        harness.bridge.create_calls() == 1
    });
    wait_until("busy cleared", Duration::from_secs(2), || {
        !harness.ctx.state().busy.composing_secret_chat
    });
    std::thread::sleep(Duration::from_millis(200));
    assert!(harness.navigation.pushes().is_empty());
}

#[test]
fn dismissed_selection_ends_the_flow() {
    let harness = compose_harness(MockComposePresenter::new(vec![], true));
    harness.ctx.dispatch(ContextAction::ComposeChannel);

    wait_until("selection shown", Duration::from_secs(2), || {
        harness.presenter.select_calls() == 1
    });
    wait_until("busy cleared", Duration::from_secs(2), || {
        !harness.ctx.state().busy.composing_channel
    });
    assert!(harness.presenter.prompts().is_empty());
    assert_eq!(harness.bridge.create_calls(), 0);
}

#[test]
fn reinvoking_compose_cancels_the_first_flow() {
    let (presenter, gate) = MockComposePresenter::gated(vec!["peer-a"], true);
    let harness = compose_harness(presenter);

    harness.ctx.dispatch(ContextAction::ComposeSecretChat);
    wait_until("first selection blocked", Duration::from_secs(2), || {
        harness.presenter.select_calls() == 1
    });

    harness.ctx.dispatch(ContextAction::ComposeSecretChat);
    wait_until("second selection started", Duration::from_secs(2), || {
        harness.presenter.select_calls() == 2
    });

    release_gate(&gate);

    // Only the second flow may reach creation; the first one was disposed
    // while it sat in selection.
    wait_until("second flow navigated", Duration::from_secs(3), || {
        harness.navigation.pushes() == ["chat-1"]
    });
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(harness.bridge.create_calls(), 1);
    assert_eq!(harness.navigation.pushes(), ["chat-1"]);
}

#[test]
fn media_keys_route_only_while_enabled() {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());
    let playback = MockMediaPlaybackHost::new();
    ctx.set_media_playback_host(Box::new(playback.clone()));

    // Disabled: pressed play goes nowhere.
    ctx.dispatch(ContextAction::MediaKey {
        data: media_key_payload(16, 0x0a),
    });

    ctx.dispatch(ContextAction::SetMediaKeysEnabled { enabled: true });
    ctx.dispatch(ContextAction::MediaKey {
        data: media_key_payload(16, 0x0a),
    });
    ctx.dispatch(ContextAction::MediaKey {
        data: media_key_payload(19, 0x0a),
    });
    ctx.dispatch(ContextAction::MediaKey {
        data: media_key_payload(20, 0x0a),
    });
    // Release edge of play; must not double-fire.
    ctx.dispatch(ContextAction::MediaKey {
        data: media_key_payload(16, 0x0b),
    });

    wait_until("commands routed", Duration::from_secs(2), || {
        playback.counts() == (1, 1, 1)
    });
}

#[test]
fn recent_peers_actions_mutate_the_visible_prefix() {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());

    for id in ["a", "b", "c", "d"] {
        ctx.dispatch(ContextAction::TouchRecentPeer {
            peer_id: id.into(),
        });
    }
    wait_until("recents visible", Duration::from_secs(2), || {
        ctx.state().recent_peers == ["d", "c", "b"]
    });

    ctx.dispatch(ContextAction::DropRecentPeerIfHead {
        peer_id: "d".into(),
    });
    wait_until("head dropped", Duration::from_secs(2), || {
        ctx.state().recent_peers == ["c", "b", "a"]
    });

    // Not at the head: no change.
    ctx.dispatch(ContextAction::DropRecentPeerIfHead {
        peer_id: "a".into(),
    });
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(ctx.state().recent_peers, ["c", "b", "a"]);
}

#[test]
fn teardown_clears_the_password_and_media_key_routing() {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());

    ctx.dispatch(ContextAction::SetTemporaryPassword {
        password: "1234".into(),
    });
    ctx.dispatch(ContextAction::SetMediaKeysEnabled { enabled: true });
    wait_until("state primed", Duration::from_secs(1), || {
        let state = ctx.state();
        state.temporary_password.is_some() && state.media_keys_enabled
    });

    ctx.shutdown();
    wait_until("teardown applied", Duration::from_secs(1), || {
        let state = ctx.state();
        state.temporary_password.is_none() && !state.media_keys_enabled
    });

    // The actor itself stays usable; only outstanding work was cancelled.
    ctx.dispatch(ContextAction::TouchRecentPeer {
        peer_id: "a".into(),
    });
    wait_until("still dispatching", Duration::from_secs(1), || {
        ctx.state().recent_peers == ["a"]
    });
}

#[test]
fn updates_stream_starts_with_a_full_snapshot_and_keeps_revs_increasing() {
    let dir = tempdir().unwrap();
    let ctx = FfiContext::new(dir.path().to_string_lossy().into_owned());
    let (reconciler, updates) = TestReconciler::new();
    ctx.listen_for_updates(Box::new(reconciler));

    ctx.dispatch(ContextAction::TouchRecentPeer {
        peer_id: "a".into(),
    });
    wait_until("updates received", Duration::from_secs(2), || {
        updates.lock().unwrap().len() >= 2
    });

    let updates = updates.lock().unwrap();
    assert!(matches!(updates[0], ContextUpdate::FullState(_)));
    let revs: Vec<u64> = updates.iter().map(ContextUpdate::rev).collect();
    let mut sorted = revs.clone();
    sorted.sort();
    assert_eq!(revs, sorted);
}
