//! Multiplayer flow tests
//!
//! Several "devices" and "tabs" built from in-memory collaborators play
//! through host, join, sync and expiry.
//!
//! Run with: cargo test --test multiplayer_flow

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use impostor_wasm::sync::{MemoryChannelHub, MemoryLocation};
use impostor_wasm::{
    GameCodeCodec, GameError, KeyValueStore, ManualClock, ManualScheduler, MemoryNotifier,
    MemoryStorage, MultiplayerSession, StateGenerator, SyncConfig, SyncContext, SyncStatus,
    SyncedGameData, TransportKind, UrlStyle, WordBank, RETENTION_WINDOW_MS,
};

const NOW: u64 = 1_700_000_000_000;
const PAGE: &str = "https://play.example/impostor/";

/// One browser: shared storage, events and channels for all its tabs
struct Browser {
    store: Rc<MemoryStorage>,
    notifier: Rc<MemoryNotifier>,
    channels: MemoryChannelHub,
    clock: Rc<ManualClock>,
    scheduler: Rc<ManualScheduler>,
    location: Rc<MemoryLocation>,
}

impl Browser {
    fn new(clock: &Rc<ManualClock>) -> Self {
        Self {
            store: Rc::new(MemoryStorage::new()),
            notifier: Rc::new(MemoryNotifier::new()),
            channels: MemoryChannelHub::new(),
            clock: clock.clone(),
            scheduler: Rc::new(ManualScheduler::new()),
            location: Rc::new(MemoryLocation::new(PAGE)),
        }
    }

    fn tab(&self) -> MultiplayerSession {
        let ctx = SyncContext::new(self.store.clone(), self.clock.clone(), self.scheduler.clone())
            .with_notifier(self.notifier.clone())
            .with_channels(Rc::new(self.channels.clone()))
            .with_location(self.location.clone(), UrlStyle::Query);
        MultiplayerSession::new(ctx, SyncConfig::default(), WordBank::default())
    }
}

fn recorder() -> (Rc<RefCell<Vec<SyncedGameData>>>, Rc<dyn Fn(SyncedGameData)>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, Rc::new(move |data: SyncedGameData| sink.borrow_mut().push(data)))
}

#[test]
fn derivation_matches_every_device() {
    let generator = StateGenerator::default();
    let empty: [&str; 0] = [];

    let state = generator.generate("ABCDCF2", 2, "Food", 5, &empty).unwrap();
    assert_eq!(state.impostor_index, 4);
    assert_eq!(state.chosen_word, "cereal");
    assert_eq!(state.start_player_index, 4);
    assert_eq!(generator.player_id("TESTXYZ", "alice"), 183_325);

    let other_device = StateGenerator::new(WordBank::default());
    assert_eq!(
        other_device.generate("ABCDCF2", 2, "Food", 5, &empty).unwrap(),
        state
    );
}

#[test]
fn codes_round_trip_through_generation() {
    let code = GameCodeCodec::encode(7, "Music", 3).unwrap().code();
    assert!(GameCodeCodec::is_valid_format(&code));

    let decoded = GameCodeCodec::decode(&code).unwrap();
    assert_eq!((decoded.players, decoded.category.as_str(), decoded.round), (7, "Music", 3));

    let empty: [&str; 0] = [];
    let from_code = StateGenerator::default().generate_from_code(&code, &empty).unwrap();
    assert_eq!(from_code.players, 7);
    assert_eq!(from_code.round, 3);
    assert_eq!(from_code.category, "Music");
}

#[test]
fn tabs_in_one_browser_sync_automatically() {
    let clock = Rc::new(ManualClock::new(NOW));
    let browser = Browser::new(&clock);

    let mut host = browser.tab();
    let report = host.host_game(4, "Animals", "Ana").unwrap();
    assert!(report.delivered.contains(&TransportKind::Channel));
    assert!(report.delivered.contains(&TransportKind::LocalBroadcast));
    assert!(report.share_url.is_some());
    let code = host.game_code().unwrap().to_string();

    let (seen, callback) = recorder();
    let _watch = host.watch(callback).unwrap();

    let mut guest = browser.tab();
    let report = guest.join_game(&code.to_lowercase(), "Ben").unwrap();
    assert_eq!(report.status, SyncStatus::Automatic);

    let last = seen.borrow().last().cloned().unwrap();
    assert_eq!(last.player_names, vec!["Ana", "Ben"]);
    assert_eq!(host.game_data().unwrap().player_names, vec!["Ana", "Ben"]);

    // both tabs agree on who is the impostor
    assert_ne!(host.is_impostor(), guest.is_impostor());
    assert_eq!(host.game_state(), guest.game_state());
}

#[test]
fn devices_sync_through_links_and_manual_codes() {
    let clock = Rc::new(ManualClock::new(NOW));
    let phone = Browser::new(&clock);
    let laptop = Browser::new(&clock);

    let mut host = phone.tab();
    host.host_game(3, "Random", "Ana").unwrap();
    let code = host.game_code().unwrap().to_string();

    // the laptop opens the host's share link
    laptop.location.set(&host.share_url().unwrap());
    let mut guest = laptop.tab();
    let report = guest.join_game(&code, "Ben").unwrap();
    assert_eq!(guest.game_data().unwrap().player_names, vec!["Ana", "Ben"]);
    assert_eq!(
        guest.game_data().unwrap().host_id,
        host.game_data().unwrap().host_id
    );

    // and sends its update back by hand
    host.apply_manual_code(&report.manual_code).unwrap();
    assert_eq!(host.state().connected_players, vec!["Ana", "Ben"]);
    assert_eq!(host.game_state(), guest.game_state());
    assert_ne!(host.game_state().unwrap().category, "Random");
    assert_eq!(
        [&host, &guest].iter().filter(|s| s.is_impostor()).count(),
        1
    );
}

#[test]
fn rounds_advance_for_everyone() {
    let clock = Rc::new(ManualClock::new(NOW));
    let browser = Browser::new(&clock);

    let mut host = browser.tab();
    host.host_game(4, "Sports", "Ana").unwrap();
    let code = host.game_code().unwrap().to_string();
    let mut guest = browser.tab();
    guest.join_game(&code, "Ben").unwrap();

    let (seen, callback) = recorder();
    let _watch = guest.watch(callback).unwrap();

    clock.advance(5_000);
    host.next_round().unwrap();
    assert_eq!(seen.borrow().last().unwrap().game_state.round, 2);
    assert_eq!(guest.game_state().unwrap().round, 2);
    assert!(matches!(guest.next_round(), Err(GameError::InvalidState(_))));
}

#[test]
fn channel_backup_poll_catches_missed_messages() {
    let clock = Rc::new(ManualClock::new(NOW));
    let browser = Browser::new(&clock);

    let mut host = browser.tab();
    host.host_game(5, "Food", "Ana").unwrap();
    let code = host.game_code().unwrap().to_string();
    let (seen, callback) = recorder();
    let _watch = host.watch(callback).unwrap();

    // another tab writes the channel backup without posting a message
    let config = SyncConfig::default();
    let mut data = host.game_data().unwrap();
    data.add_player("Ben", NOW + 1_000).unwrap();
    browser
        .store
        .set(&config.sync_key(&code), &data.to_json().unwrap())
        .unwrap();

    browser.scheduler.advance(Duration::from_secs(3));
    let delivered = seen.borrow().iter().filter(|d| d.player_names.len() == 2).count();
    assert_eq!(delivered, 1);

    // unchanged backup is not delivered twice
    browser.scheduler.advance(Duration::from_secs(3));
    let delivered = seen.borrow().iter().filter(|d| d.player_names.len() == 2).count();
    assert_eq!(delivered, 1);
}

#[test]
fn expired_games_are_swept_on_start() {
    let clock = Rc::new(ManualClock::new(NOW));
    let browser = Browser::new(&clock);

    let legacy = GameCodeCodec::generate_legacy_code();
    let empty: [&str; 0] = [];
    let state = StateGenerator::default()
        .generate(&legacy, 1, "Colors", 4, &empty)
        .unwrap();
    let mut data = SyncedGameData::new(state, "h0st", NOW);
    data.add_player("Ana", NOW).unwrap();
    let roster = browser.tab().roster().clone();
    roster.save(&legacy, &data).unwrap();

    let mut guest = browser.tab();
    guest.join_game(&legacy, "Ben").unwrap();
    guest.leave().unwrap();
    let backup_key = SyncConfig::default().sync_key(&legacy);
    assert!(browser.store.get(&backup_key).unwrap().is_some());

    clock.advance(RETENTION_WINDOW_MS + 1);
    let mut late = browser.tab();
    assert!(late.roster().load(&legacy).is_none());
    assert!(browser.store.get(&backup_key).unwrap().is_none());
    assert!(matches!(late.join_game(&legacy, "Cy"), Err(GameError::StaleGame(_))));

    // 7-character codes rebuild from their settings instead
    let code = GameCodeCodec::encode(4, "Colors", 1).unwrap().code();
    assert!(late.join_game(&code, "Cy").is_ok());
}

#[test]
fn nothing_automatic_means_manual_codes() {
    let ctx = SyncContext::new(
        Rc::new(MemoryStorage::new()),
        Rc::new(ManualClock::new(NOW)),
        Rc::new(ManualScheduler::new()),
    );
    let mut host = MultiplayerSession::new(ctx, SyncConfig::default(), WordBank::default());
    let report = host.host_game(4, "Food", "Ana").unwrap();

    assert_eq!(report.status, SyncStatus::ManualOnly);
    assert!(report.delivered.is_empty());
    assert_eq!(
        impostor_wasm::parse_sync_code(&report.manual_code),
        host.game_data()
    );
    assert!(host.share_url().is_err());
}
