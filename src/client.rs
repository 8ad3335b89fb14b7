//! JavaScript API.
//!
//! Free functions expose the pure derivation and code helpers. The
//! [`ImpostorClient`] class wraps a [`MultiplayerSession`] wired to browser
//! storage, events, `BroadcastChannel`, the address bar and WebRTC.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::code::GameCodeCodec;
use crate::config::SyncConfig;
use crate::error::{ErrorInfo, GameError};
use crate::generator::StateGenerator;
use crate::notify::Subscription;
use crate::roster::SyncedGameData;
use crate::session::{MultiplayerSession, SyncContext};
use crate::sync::peer::RtcPeerLink;
use crate::sync::{
    create_sync_code, detect_shared_game, parse_sync_code, PeerTransport, PublishReport,
    SignalMessage, SyncStatus, TransportKind, UrlStyle,
};
use crate::words::WordBank;

type JsResult<T> = std::result::Result<T, JsValue>;

fn to_js<T: Serialize>(value: &T) -> JsResult<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| GameError::Serialization(e.to_string()).into())
}

fn from_js(value: JsValue) -> JsResult<SyncedGameData> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| GameError::Serialization(e.to_string()).into())
}

/// `PublishReport` as seen from JavaScript
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishView {
    status: SyncStatus,
    delivered: Vec<TransportKind>,
    failures: Vec<ErrorInfo>,
    share_url: Option<String>,
    manual_code: String,
}

impl From<PublishReport> for PublishView {
    fn from(report: PublishReport) -> Self {
        Self {
            status: report.status,
            delivered: report.delivered,
            failures: report.failures.iter().map(|(_, e)| ErrorInfo::from(e)).collect(),
            share_url: report.share_url,
            manual_code: report.manual_code,
        }
    }
}

#[derive(Serialize)]
struct SharedGame {
    code: String,
    data: SyncedGameData,
}

#[wasm_bindgen(js_name = encodeGameCode)]
pub fn encode_game_code(players: u32, category: &str, round: u32) -> JsResult<String> {
    Ok(GameCodeCodec::encode(players, category, round)?.code())
}

/// Settings in a 7-character code, `null` when it carries none
#[wasm_bindgen(js_name = decodeGameCode)]
pub fn decode_game_code(code: &str) -> JsResult<JsValue> {
    match GameCodeCodec::decode(code) {
        Some(data) => to_js(&data),
        None => Ok(JsValue::NULL),
    }
}

#[wasm_bindgen(js_name = isValidGameCodeFormat)]
pub fn is_valid_game_code_format(code: &str) -> bool {
    GameCodeCodec::is_valid_format(code)
}

#[wasm_bindgen(js_name = generateGameState)]
pub fn generate_game_state(
    code: &str,
    round: u32,
    category: &str,
    players: u32,
    roster: Vec<String>,
) -> JsResult<JsValue> {
    let state = StateGenerator::default().generate(code, round, category, players, &roster)?;
    to_js(&state)
}

#[wasm_bindgen(js_name = isPlayerImpostor)]
pub fn is_player_impostor(code: &str, name: &str, all_names: Vec<String>, round: u32) -> bool {
    StateGenerator::default().is_player_impostor(code, name, &all_names, round)
}

#[wasm_bindgen(js_name = playerId)]
pub fn player_id(code: &str, name: &str) -> u32 {
    StateGenerator::default().player_id(code, name)
}

#[wasm_bindgen(js_name = createSyncCode)]
pub fn create_sync_code_js(data: JsValue) -> JsResult<String> {
    Ok(create_sync_code(&from_js(data)?)?)
}

/// Record inside a manual sync code, `null` when unreadable
#[wasm_bindgen(js_name = parseSyncCode)]
pub fn parse_sync_code_js(code: &str) -> JsResult<JsValue> {
    match parse_sync_code(code) {
        Some(data) => to_js(&data),
        None => Ok(JsValue::NULL),
    }
}

/// One device's multiplayer session
#[wasm_bindgen]
pub struct ImpostorClient {
    session: Rc<RefCell<MultiplayerSession>>,
    config: SyncConfig,
    watch: Option<Subscription>,
    // Host side of a peer negotiation waiting for its answer code
    pending_offer: Option<RtcPeerLink>,
}

#[wasm_bindgen]
impl ImpostorClient {
    /// `url_style` is `"query"` (default) or `"fragment"`. `config` is an
    /// optional partial `SyncConfig`; missing fields keep their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(url_style: Option<String>, config: JsValue) -> JsResult<ImpostorClient> {
        let style = match url_style.as_deref() {
            Some("fragment") => UrlStyle::Fragment,
            _ => UrlStyle::Query,
        };
        let config: SyncConfig = if config.is_undefined() || config.is_null() {
            SyncConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| GameError::InvalidSettings(format!("bad config: {}", e)))?
        };
        let ctx = SyncContext::browser(style)?;
        let session = MultiplayerSession::new(ctx, config.clone(), WordBank::default());
        log::info!("✅ Impostor client created");

        Ok(Self {
            session: Rc::new(RefCell::new(session)),
            config,
            watch: None,
            pending_offer: None,
        })
    }

    #[wasm_bindgen(js_name = hostGame)]
    pub fn host_game(
        &mut self,
        players: u32,
        category: &str,
        host_name: &str,
    ) -> JsResult<JsValue> {
        self.stop_watching();
        let report = self.session.borrow_mut().host_game(players, category, host_name)?;
        to_js(&PublishView::from(report))
    }

    #[wasm_bindgen(js_name = joinGame)]
    pub fn join_game(&mut self, code: &str, name: &str) -> JsResult<JsValue> {
        self.stop_watching();
        let report = self.session.borrow_mut().join_game(code, name)?;
        to_js(&PublishView::from(report))
    }

    pub fn leave(&mut self) -> JsResult<()> {
        self.stop_watching();
        self.pending_offer = None;
        Ok(self.session.borrow_mut().leave()?)
    }

    /// `MultiplayerState` of this device
    pub fn state(&self) -> JsResult<JsValue> {
        to_js(self.session.borrow().state())
    }

    #[wasm_bindgen(js_name = gameState)]
    pub fn game_state(&self) -> JsResult<JsValue> {
        match self.session.borrow().game_state() {
            Some(state) => to_js(&state),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = isImpostor)]
    pub fn is_impostor(&self) -> bool {
        self.session.borrow().is_impostor()
    }

    #[wasm_bindgen(js_name = secretWord)]
    pub fn secret_word(&self) -> Option<String> {
        self.session.borrow().secret_word()
    }

    #[wasm_bindgen(js_name = syncStatus)]
    pub fn sync_status(&self) -> JsResult<JsValue> {
        to_js(&self.session.borrow().sync_status())
    }

    #[wasm_bindgen(js_name = shareUrl)]
    pub fn share_url(&self) -> JsResult<String> {
        Ok(self.session.borrow().share_url()?)
    }

    #[wasm_bindgen(js_name = manualCode)]
    pub fn manual_code(&self) -> JsResult<String> {
        Ok(self.session.borrow().manual_code()?)
    }

    #[wasm_bindgen(js_name = applyManualCode)]
    pub fn apply_manual_code(&self, text: &str) -> JsResult<JsValue> {
        let data = self.session.borrow_mut().apply_manual_code(text)?;
        to_js(&data)
    }

    /// `{ code, data }` carried by the current address, `null` if none
    #[wasm_bindgen(js_name = sharedGame)]
    pub fn shared_game(&self) -> JsResult<JsValue> {
        let href = web_sys::window().and_then(|w| w.location().href().ok());
        match href.as_deref().and_then(detect_shared_game) {
            Some((code, data)) => to_js(&SharedGame { code, data }),
            None => Ok(JsValue::NULL),
        }
    }

    /// Call `callback(record)` on every update from another device.
    /// Updates are applied to this session before the callback runs.
    pub fn watch(&mut self, callback: js_sys::Function) -> JsResult<()> {
        self.stop_watching();
        let session = Rc::downgrade(&self.session);
        let subscription = self.session.borrow().watch(Rc::new(move |data: SyncedGameData| {
            let Some(session) = session.upgrade() else {
                return;
            };
            match session.try_borrow_mut() {
                Ok(mut session) => {
                    if let Err(e) = session.apply_remote(data.clone()) {
                        log::warn!("Could not apply update: {}", e);
                    }
                }
                // Our own write echoed back while the session is busy
                Err(_) => return,
            }
            let value = match to_js(&data) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Could not hand update to JavaScript: {:?}", e);
                    return;
                }
            };
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("watch callback threw: {:?}", e);
            }
        }))?;
        self.watch = Some(subscription);
        Ok(())
    }

    pub fn unwatch(&mut self) {
        self.stop_watching();
    }

    #[wasm_bindgen(js_name = nextRound)]
    pub fn next_round(&self) -> JsResult<JsValue> {
        let report = self.session.borrow_mut().next_round()?;
        to_js(&PublishView::from(report))
    }

    #[wasm_bindgen(js_name = playLocally)]
    pub fn play_locally(&mut self, players: u32, category: &str) -> JsResult<JsValue> {
        self.stop_watching();
        let state = self.session.borrow_mut().play_locally(players, category)?;
        to_js(&state)
    }

    /// Host side, step 1: offer code for a guest to answer
    #[wasm_bindgen(js_name = createPeerOffer)]
    pub async fn create_peer_offer(&mut self) -> JsResult<String> {
        let code = self.current_code()?;
        let (link, offer) = RtcPeerLink::create_offer(&code, &self.config).await?;
        self.pending_offer = Some(link);
        Ok(offer)
    }

    /// Guest side: answer code for the host
    #[wasm_bindgen(js_name = acceptPeerOffer)]
    pub async fn accept_peer_offer(&mut self, offer_code: String) -> JsResult<String> {
        let code = self.current_code()?;
        if link_code_mismatch(&offer_code, &code, &self.config) {
            return Err(GameError::InvalidCode(format!("offer is not for {}", code)).into());
        }
        let peer = self.peer_transport()?;
        let (link, answer) = RtcPeerLink::accept_offer(&offer_code, &self.config).await?;
        peer.add_link(Rc::new(link));
        Ok(answer)
    }

    /// Host side, step 2: finish with the guest's answer code
    #[wasm_bindgen(js_name = completePeerOffer)]
    pub async fn complete_peer_offer(&mut self, answer_code: String) -> JsResult<()> {
        let link = self
            .pending_offer
            .take()
            .ok_or_else(|| GameError::InvalidState("no peer offer in progress".into()))?;
        link.complete(&answer_code, &self.config).await?;
        self.peer_transport()?.add_link(Rc::new(link));
        Ok(())
    }
}

impl ImpostorClient {
    fn stop_watching(&mut self) {
        if let Some(subscription) = self.watch.take() {
            subscription.unsubscribe();
        }
    }

    fn current_code(&self) -> JsResult<String> {
        self.session
            .borrow()
            .game_code()
            .map(str::to_string)
            .ok_or_else(|| GameError::InvalidState("not in a game".into()).into())
    }

    fn peer_transport(&self) -> JsResult<Rc<PeerTransport>> {
        self.session
            .borrow()
            .peer()
            .ok_or_else(|| GameError::InvalidState("not in a game".into()).into())
    }
}

fn link_code_mismatch(offer_code: &str, code: &str, config: &SyncConfig) -> bool {
    SignalMessage::from_code(offer_code, config).map_or(true, |m| m.code != code)
}
