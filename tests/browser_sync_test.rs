//! Browser Sync WASM Integration Tests
//!
//! Run with: wasm-pack test --headless --chrome
//! (or --firefox)

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use impostor_wasm::storage::WasmLocalStorage;
use impostor_wasm::sync::browser::{WebChannelFactory, WindowNotifier};
use impostor_wasm::sync::{BroadcastPort, ChannelFactory, MemoryLocation};
use impostor_wasm::{
    ChangeNotifier, GameCodeCodec, KeyValueStore, ManualScheduler, MultiplayerSession,
    StateGenerator, SyncConfig, SyncContext, SyncedGameData, SystemClock, UrlStyle, WordBank,
};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn record(code: &str) -> SyncedGameData {
    let empty: [&str; 0] = [];
    let state = StateGenerator::default()
        .generate(code, 1, "Food", 4, &empty)
        .unwrap();
    SyncedGameData::new(state, "h0st", 1_700_000_000_000)
}

// ===== localStorage =====

#[wasm_bindgen_test]
fn local_storage_round_trip() {
    let store = WasmLocalStorage::new().unwrap();
    let key = "impostor-test-round-trip";

    store.set(key, "value").unwrap();
    assert_eq!(store.get(key).unwrap().as_deref(), Some("value"));
    assert!(store.keys_with_prefix("impostor-test-").unwrap().contains(&key.to_string()));

    store.remove(key).unwrap();
    assert_eq!(store.get(key).unwrap(), None);
}

// ===== Change events =====

#[wasm_bindgen_test]
fn window_notifier_reaches_same_tab_listeners() {
    let heard = Rc::new(RefCell::new(Vec::new()));
    let sink = heard.clone();
    let subscription = WindowNotifier.listen(Box::new(move |key: &str| {
        sink.borrow_mut().push(key.to_string())
    }));

    WindowNotifier.notify("impostor-game-TEST001");
    assert_eq!(heard.borrow().as_slice(), ["impostor-game-TEST001".to_string()]);

    subscription.unsubscribe();
    WindowNotifier.notify("impostor-game-TEST001");
    assert_eq!(heard.borrow().len(), 1);
}

// ===== BroadcastChannel =====

#[wasm_bindgen_test]
fn broadcast_channel_ports_open_and_close() {
    assert!(WebChannelFactory::is_supported());

    let port = WebChannelFactory
        .open("impostor-test-channel", Box::new(|_: SyncedGameData| {}))
        .unwrap();
    port.post(&record("ABCDBF1")).unwrap();
    port.close();
    port.close();
    assert!(port.post(&record("ABCDBF1")).is_err());
}

// ===== Sessions =====

#[wasm_bindgen_test]
fn session_persists_to_local_storage() {
    let ctx = SyncContext::new(
        Rc::new(WasmLocalStorage::new().unwrap()),
        Rc::new(SystemClock),
        Rc::new(ManualScheduler::new()),
    )
    .with_notifier(Rc::new(WindowNotifier))
    .with_location(
        Rc::new(MemoryLocation::new("https://play.example/")),
        UrlStyle::Query,
    );
    let mut host = MultiplayerSession::new(ctx, SyncConfig::default(), WordBank::default());

    let report = host.host_game(4, "Food", "Ana").unwrap();
    assert!(report.is_automatic());
    let code = host.game_code().unwrap().to_string();
    assert!(GameCodeCodec::is_valid_format(&code));

    let stored = WasmLocalStorage::new()
        .unwrap()
        .get(&SyncConfig::default().storage_key(&code))
        .unwrap()
        .unwrap();
    assert_eq!(
        SyncedGameData::from_json(&stored).unwrap().player_names,
        vec!["Ana"]
    );

    host.leave().unwrap();
    host.roster().delete(&code).unwrap();
}
