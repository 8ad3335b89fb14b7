//! Host/join/leave flows for one device.
//!
//! A session owns this device's view of the game: which code it is in, under
//! which name, and the sync chain for that code. The game itself is always
//! re-derived from the code and the roster, so a record received from
//! anywhere is enough to rebuild it.

use std::rc::Rc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::code::GameCodeCodec;
use crate::config::SyncConfig;
use crate::error::{GameError, Result};
use crate::generator::{GameState, StateGenerator};
use crate::notify::{ChangeNotifier, Subscription};
use crate::roster::{RosterStore, SyncedGameData};
use crate::runtime::{Clock, Scheduler};
use crate::storage::KeyValueStore;
use crate::sync::{
    detect_shared_game, ChannelFactory, ChannelTransport, LocalBroadcastTransport, LocationSource,
    ManualTransport, PeerTransport, PublishReport, SyncCallback, SyncHub, SyncStatus,
    SyncTransport, UrlStyle, UrlTransport,
};
use crate::words::{WordBank, RANDOM_CATEGORY};

/// Length of a generated host id
const HOST_ID_LEN: usize = 11;

/// Collaborators a session talks to.
///
/// Only storage, clock and scheduler are required; every optional piece
/// enables one more transport.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Rc<dyn KeyValueStore>,
    pub clock: Rc<dyn Clock>,
    pub scheduler: Rc<dyn Scheduler>,
    pub notifier: Option<Rc<dyn ChangeNotifier>>,
    pub channels: Option<Rc<dyn ChannelFactory>>,
    pub location: Option<Rc<dyn LocationSource>>,
    pub url_style: UrlStyle,
}

impl SyncContext {
    pub fn new(
        store: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            store,
            clock,
            scheduler,
            notifier: None,
            channels: None,
            location: None,
            url_style: UrlStyle::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Rc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_channels(mut self, channels: Rc<dyn ChannelFactory>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_location(mut self, location: Rc<dyn LocationSource>, style: UrlStyle) -> Self {
        self.location = Some(location);
        self.url_style = style;
        self
    }

    /// `localStorage`, window events, `BroadcastChannel` and the address bar
    #[cfg(target_arch = "wasm32")]
    pub fn browser(style: UrlStyle) -> Result<Self> {
        use crate::runtime::{BrowserScheduler, SystemClock};
        use crate::storage::WasmLocalStorage;
        use crate::sync::browser::{BrowserLocation, WebChannelFactory, WindowNotifier};

        let mut ctx = Self::new(
            Rc::new(WasmLocalStorage::new()?),
            Rc::new(SystemClock),
            Rc::new(BrowserScheduler),
        )
        .with_notifier(Rc::new(WindowNotifier))
        .with_location(Rc::new(BrowserLocation), style);
        if WebChannelFactory::is_supported() {
            ctx = ctx.with_channels(Rc::new(WebChannelFactory));
        } else {
            log::warn!("BroadcastChannel not supported, channel sync disabled");
        }
        Ok(ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    /// Pass-and-play on one device
    #[default]
    Local,
    Multiplayer,
}

/// This device's view of the current game
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiplayerState {
    pub game_code: Option<String>,
    pub is_host: bool,
    pub player_name: Option<String>,
    pub player_id: Option<u32>,
    pub connected_players: Vec<String>,
    pub mode: GameMode,
}

struct ActiveGame {
    code: String,
    hub: SyncHub,
    peer: Rc<PeerTransport>,
}

pub struct MultiplayerSession {
    ctx: SyncContext,
    config: SyncConfig,
    generator: StateGenerator,
    roster: RosterStore,
    state: MultiplayerState,
    active: Option<ActiveGame>,
}

impl MultiplayerSession {
    /// Clears expired game records before anything else
    pub fn new(ctx: SyncContext, config: SyncConfig, bank: WordBank) -> Self {
        let mut roster = RosterStore::new(ctx.store.clone(), ctx.clock.clone(), config.clone());
        if let Some(notifier) = &ctx.notifier {
            roster = roster.with_notifier(notifier.clone());
        }
        let swept = roster.sweep();
        log::info!("Multiplayer session ready ({} expired game(s) cleared)", swept);

        Self {
            ctx,
            config,
            generator: StateGenerator::new(bank),
            roster,
            state: MultiplayerState::default(),
            active: None,
        }
    }

    pub fn state(&self) -> &MultiplayerState {
        &self.state
    }

    pub fn generator(&self) -> &StateGenerator {
        &self.generator
    }

    pub fn roster(&self) -> &RosterStore {
        &self.roster
    }

    pub fn game_code(&self) -> Option<&str> {
        self.state.game_code.as_deref()
    }

    /// Current record for this device's game
    pub fn game_data(&self) -> Option<SyncedGameData> {
        self.roster.load(self.game_code()?)
    }

    pub fn game_state(&self) -> Option<GameState> {
        self.game_data().map(|d| d.game_state)
    }

    /// Peer transport of the current game, for attaching negotiated links
    pub fn peer(&self) -> Option<Rc<PeerTransport>> {
        self.active.as_ref().map(|a| a.peer.clone())
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.active
            .as_ref()
            .map_or(SyncStatus::ManualOnly, |a| a.hub.status())
    }

    /// Create a game with `host_name` as its first player and publish it
    pub fn host_game(
        &mut self,
        players: u32,
        category: &str,
        host_name: &str,
    ) -> Result<PublishReport> {
        let name = clean_name(host_name)?;
        let code = GameCodeCodec::encode(players, category, 1)?.code();
        let now = self.ctx.clock.now_ms();

        let empty: [&str; 0] = [];
        let state = self.generator.generate(&code, 1, category, players, &empty)?;
        let mut data = SyncedGameData::new(state, generate_host_id(), now);
        data.add_player(&name, now)?;
        self.rederive(&code, &mut data)?;
        self.roster.save(&code, &data)?;

        self.enter(&code, &name, true, &data);
        log::info!("🎮 Hosting {} ({} players, {})", code, players, category);
        self.publish(&data)
    }

    /// Join `code` as `name`.
    ///
    /// The record comes from local storage, then the current share link,
    /// then the code itself. Legacy codes carry no settings, so they need
    /// one of the first two.
    pub fn join_game(&mut self, code: &str, name: &str) -> Result<PublishReport> {
        let code = code.trim().to_uppercase();
        if !GameCodeCodec::is_valid_format(&code) {
            return Err(GameError::InvalidCode(code));
        }
        let name = clean_name(name)?;
        let now = self.ctx.clock.now_ms();

        let mut data = match self.find_record(&code) {
            Some(data) => data,
            None => self.rebuild_record(&code)?,
        };
        data.add_player(&name, now)?;
        self.rederive(&code, &mut data)?;
        self.roster.save(&code, &data)?;

        self.enter(&code, &name, false, &data);
        log::info!("🎮 {} joined {}", name, code);
        self.publish(&data)
    }

    /// Remove this device's player and return to pass-and-play
    pub fn leave(&mut self) -> Result<()> {
        let code = self.state.game_code.clone();
        let name = self.state.player_name.clone();
        if let (Some(code), Some(name)) = (code, name) {
            if let Some(mut data) = self.roster.load(&code) {
                if data.remove_player(&name, self.ctx.clock.now_ms()) {
                    self.rederive(&code, &mut data)?;
                    self.roster.save(&code, &data)?;
                    if let Err(e) = self.publish(&data) {
                        log::warn!("Could not announce leaving {}: {}", code, e);
                    }
                }
            }
            log::info!("{} left {}", name, code);
        }
        self.active = None;
        self.state = MultiplayerState::default();
        Ok(())
    }

    /// Adopt a record received from another device; the last write wins.
    /// A record that does not derive from this game's code is rejected.
    pub fn apply_remote(&mut self, data: SyncedGameData) -> Result<()> {
        let code = self
            .state
            .game_code
            .clone()
            .ok_or_else(|| GameError::InvalidState("not in a game".into()))?;
        self.verify_record(&code, &data)?;
        self.roster.save_quietly(&code, &data)?;
        self.state.connected_players = data.player_names.clone();
        log::debug!(
            "Applied remote update for {} (round {}, {} players)",
            code,
            data.game_state.round,
            data.player_names.len()
        );
        Ok(())
    }

    /// Whether this device's player is the impostor this round
    pub fn is_impostor(&self) -> bool {
        let (Some(code), Some(name), Some(data)) =
            (self.game_code(), self.state.player_name.as_deref(), self.game_data())
        else {
            return false;
        };
        self.generator
            .is_player_impostor(code, name, &data.player_names, data.game_state.round)
    }

    /// The round's word, hidden from the impostor and from anyone not on
    /// the roster
    pub fn secret_word(&self) -> Option<String> {
        let name = self.state.player_name.as_deref()?;
        let data = self.game_data()?;
        if !data.player_names.iter().any(|n| n == name) || self.is_impostor() {
            return None;
        }
        Some(data.game_state.chosen_word)
    }

    pub fn share_url(&self) -> Result<String> {
        let code = self.require_code()?;
        let data = self.require_data()?;
        let location = self
            .ctx
            .location
            .clone()
            .ok_or_else(|| GameError::transport("url", "no document location"))?;
        UrlTransport::new(
            code,
            self.ctx.url_style,
            self.state.is_host,
            location,
            self.ctx.scheduler.clone(),
            self.config.clone(),
        )
        .share_url(&data)
    }

    pub fn manual_code(&self) -> Result<String> {
        ManualTransport::new(self.config.clone()).create_code(&self.require_data()?)
    }

    /// Apply a pasted sync code. Codes for a different game are rejected.
    pub fn apply_manual_code(&mut self, text: &str) -> Result<SyncedGameData> {
        let data = ManualTransport::new(self.config.clone())
            .parse_code(text)
            .ok_or_else(|| GameError::Decode("unreadable sync code".into()))?;
        self.apply_remote(data.clone())?;
        Ok(data)
    }

    /// Live updates for the current game
    pub fn watch(&self, callback: SyncCallback) -> Result<Subscription> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| GameError::InvalidState("not in a game".into()))?;
        Ok(active.hub.subscribe(callback))
    }

    /// Host only: same code and roster, next round
    pub fn next_round(&mut self) -> Result<PublishReport> {
        if !self.state.is_host {
            return Err(GameError::InvalidState("only the host starts rounds".into()));
        }
        let code = self.require_code()?.to_string();
        let mut data = self.require_data()?;
        data.game_state = self
            .generator
            .next_round(&code, &data.game_state, &data.player_names)?;
        data.last_updated = self.ctx.clock.now_ms();
        self.roster.save(&code, &data)?;
        log::info!("Round {} of {}", data.game_state.round, code);
        self.publish(&data)
    }

    /// Leave any multiplayer game and derive a pass-and-play round
    pub fn play_locally(&mut self, players: u32, category: &str) -> Result<GameState> {
        self.leave()?;
        let code = GameCodeCodec::encode(players, category, 1)?.code();
        let empty: [&str; 0] = [];
        let state = self.generator.generate(&code, 1, category, players, &empty)?;
        self.state.game_code = Some(code);
        self.state.mode = GameMode::Local;
        Ok(state)
    }

    fn publish(&self, data: &SyncedGameData) -> Result<PublishReport> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| GameError::InvalidState("not in a game".into()))?;
        let report = active.hub.publish(data)?;
        if !report.is_automatic() {
            log::warn!("⚠️ {} needs manual sync codes", active.code);
        }
        Ok(report)
    }

    fn enter(&mut self, code: &str, name: &str, is_host: bool, data: &SyncedGameData) {
        self.active = Some(self.build_game(code, is_host));
        self.state = MultiplayerState {
            game_code: Some(code.to_string()),
            is_host,
            player_name: Some(name.to_string()),
            player_id: Some(self.generator.player_id(code, name)),
            connected_players: data.player_names.clone(),
            mode: GameMode::Multiplayer,
        };
    }

    fn build_game(&self, code: &str, is_host: bool) -> ActiveGame {
        let mut hub = SyncHub::new(ManualTransport::new(self.config.clone()));
        if let Some(channels) = &self.ctx.channels {
            hub.add(Rc::new(ChannelTransport::new(
                code,
                channels.clone(),
                self.ctx.store.clone(),
                self.ctx.scheduler.clone(),
                self.config.clone(),
            )));
        }
        hub.add(Rc::new(LocalBroadcastTransport::new(code, self.roster.clone())));
        if let Some(location) = &self.ctx.location {
            hub.add(Rc::new(UrlTransport::new(
                code,
                self.ctx.url_style,
                is_host,
                location.clone(),
                self.ctx.scheduler.clone(),
                self.config.clone(),
            )));
        }
        let peer = Rc::new(PeerTransport::new(code));
        hub.add(peer.clone() as Rc<dyn SyncTransport>);

        log::debug!("Sync chain for {}: {:?}", code, hub);
        ActiveGame {
            code: code.to_string(),
            hub,
            peer,
        }
    }

    /// Live local record, else one carried by the current share link
    fn find_record(&self, code: &str) -> Option<SyncedGameData> {
        if let Some(data) = self.roster.load_active(code) {
            return Some(data);
        }
        let href = self.ctx.location.as_ref()?.href()?;
        match detect_shared_game(&href) {
            Some((shared_code, data)) if shared_code == code => Some(data),
            _ => None,
        }
    }

    /// Fresh record derived from the settings inside a 7-character code
    fn rebuild_record(&self, code: &str) -> Result<SyncedGameData> {
        let empty: [&str; 0] = [];
        let state = match self.generator.generate_from_code(code, &empty) {
            Ok(state) => state,
            Err(GameError::InvalidCode(_)) => {
                return Err(GameError::StaleGame(code.to_string()));
            }
            Err(e) => return Err(e),
        };
        log::info!("Rebuilt {} from its code", code);
        Ok(SyncedGameData::new(state, String::new(), self.ctx.clock.now_ms()))
    }

    /// Re-derive the round for the current roster, keeping view flags
    fn rederive(&self, code: &str, data: &mut SyncedGameData) -> Result<()> {
        let previous = &data.game_state;
        let mut state = self.generator.generate(
            code,
            previous.round,
            &previous.category,
            previous.players,
            &data.player_names,
        )?;
        state.active_player = previous.active_player;
        state.revealed = previous.revealed;
        state.game_started = previous.game_started;
        data.game_state = state;
        Ok(())
    }

    /// Check that `data` is a round of `code`: the settings the code carries
    /// and everything derived from the roster must line up
    fn verify_record(&self, code: &str, data: &SyncedGameData) -> Result<()> {
        let state = &data.game_state;
        let foreign = || {
            GameError::InvalidCode(format!("sync data is for a different game than {}", code))
        };

        if let Some(settings) = GameCodeCodec::decode(code) {
            let category = self.generator.word_bank().resolve(&settings.category).0;
            if settings.players != state.players
                || (settings.category != RANDOM_CATEGORY && category != state.category)
            {
                return Err(foreign());
            }
        }

        let expected = self
            .generator
            .generate(code, state.round, &state.category, state.players, &data.player_names)
            .map_err(|_| foreign())?;
        let matches = expected.players == state.players
            && expected.round == state.round
            && expected.category == state.category
            && expected.impostor_index == state.impostor_index
            && expected.chosen_word == state.chosen_word
            && expected.start_player_index == state.start_player_index;
        if !matches {
            log::warn!("Rejected sync data that does not belong to {}", code);
            return Err(foreign());
        }
        Ok(())
    }

    fn require_code(&self) -> Result<&str> {
        self.game_code()
            .ok_or_else(|| GameError::InvalidState("not in a game".into()))
    }

    fn require_data(&self) -> Result<SyncedGameData> {
        let code = self.require_code()?;
        self.roster
            .load(code)
            .ok_or_else(|| GameError::StaleGame(code.to_string()))
    }
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::InvalidSettings("player name is empty".into()));
    }
    Ok(name.to_string())
}

fn generate_host_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(HOST_ID_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}
