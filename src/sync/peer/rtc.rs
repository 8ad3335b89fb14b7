//! `RTCPeerConnection` links.
//!
//! ```text
//! host                               guest
//! create_offer ──── offer code ────▶ accept_offer
//! complete     ◀─── answer code ──── (data channel arrives)
//! ```
//!
//! ICE candidates are gathered up front and carried inside the session
//! descriptions. Negotiation has no timeout.

use std::cell::RefCell;
use std::rc::Rc;
use std::task::{Poll, Waker};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    MessageEvent, RtcConfiguration, RtcDataChannel, RtcDataChannelEvent, RtcDataChannelState,
    RtcIceGatheringState, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcSdpType,
    RtcSessionDescriptionInit,
};

use super::{PeerLink, SignalKind, SignalMessage};
use crate::config::SyncConfig;
use crate::error::{GameError, Result};

type JsCallback = Closure<dyn FnMut(JsValue)>;
type TextHandler = Rc<RefCell<Option<Rc<dyn Fn(String)>>>>;

#[derive(Default)]
struct IceGathering {
    complete: bool,
    waker: Option<Waker>,
}

fn rtc_error(step: &str, e: JsValue) -> GameError {
    GameError::transport("peer", format!("{} failed: {:?}", step, e))
}

/// Link backed by a browser `RTCPeerConnection` and one data channel
pub struct RtcPeerLink {
    code: String,
    pc: RtcPeerConnection,
    channel: Rc<RefCell<Option<RtcDataChannel>>>,
    handler: TextHandler,
    ice: Rc<RefCell<IceGathering>>,
    // Keeps JS callbacks alive for the connection's lifetime
    closures: Rc<RefCell<Vec<JsCallback>>>,
}

impl RtcPeerLink {
    fn new(code: &str, config: &SyncConfig) -> Result<Self> {
        let rtc_config = RtcConfiguration::new();
        let ice_servers = js_sys::Array::new();
        for url in &config.stun_urls {
            let server = js_sys::Object::new();
            js_sys::Reflect::set(&server, &"urls".into(), &url.as_str().into())
                .map_err(|e| rtc_error("Setting STUN server", e))?;
            ice_servers.push(&server);
        }
        rtc_config.set_ice_servers(&ice_servers);

        let pc = RtcPeerConnection::new_with_configuration(&rtc_config)
            .map_err(|e| rtc_error("RTCPeerConnection::new", e))?;

        let link = Self {
            code: code.to_string(),
            pc,
            channel: Rc::new(RefCell::new(None)),
            handler: Rc::new(RefCell::new(None)),
            ice: Rc::new(RefCell::new(IceGathering::default())),
            closures: Rc::new(RefCell::new(Vec::new())),
        };

        let ice = link.ice.clone();
        let on_candidate = Closure::wrap(Box::new(move |event: JsValue| {
            let event: RtcPeerConnectionIceEvent = event.unchecked_into();
            if event.candidate().is_none() {
                // null candidate: gathering finished
                let mut ice = ice.borrow_mut();
                ice.complete = true;
                if let Some(waker) = ice.waker.take() {
                    waker.wake();
                }
            }
        }) as Box<dyn FnMut(JsValue)>);
        link.pc
            .set_onicecandidate(Some(on_candidate.as_ref().unchecked_ref()));
        link.closures.borrow_mut().push(on_candidate);

        Ok(link)
    }

    /// Host side: open the data channel and produce an offer code
    pub async fn create_offer(code: &str, config: &SyncConfig) -> Result<(Self, String)> {
        let link = Self::new(code, config)?;
        let channel = link.pc.create_data_channel(&config.peer_channel_label);
        link.attach_channel(channel);

        let offer = JsFuture::from(link.pc.create_offer())
            .await
            .map_err(|e| rtc_error("createOffer", e))?;
        let offer: RtcSessionDescriptionInit = offer.unchecked_into();
        JsFuture::from(link.pc.set_local_description(&offer))
            .await
            .map_err(|e| rtc_error("setLocalDescription", e))?;

        let sdp = link.gathered_sdp().await?;
        let code_text = SignalMessage::new(SignalKind::Offer, code, sdp).to_code(config)?;
        log::info!("📡 Created peer offer for {}", code);
        Ok((link, code_text))
    }

    /// Guest side: answer an offer code; the data channel arrives later
    pub async fn accept_offer(offer_code: &str, config: &SyncConfig) -> Result<(Self, String)> {
        let offer = SignalMessage::from_code(offer_code, config)
            .filter(|m| m.kind == SignalKind::Offer)
            .ok_or_else(|| GameError::Decode("not a peer offer code".into()))?;

        let link = Self::new(&offer.code, config)?;
        link.listen_for_channel();
        link.set_remote(RtcSdpType::Offer, &offer.sdp).await?;

        let answer = JsFuture::from(link.pc.create_answer())
            .await
            .map_err(|e| rtc_error("createAnswer", e))?;
        let answer: RtcSessionDescriptionInit = answer.unchecked_into();
        JsFuture::from(link.pc.set_local_description(&answer))
            .await
            .map_err(|e| rtc_error("setLocalDescription", e))?;

        let sdp = link.gathered_sdp().await?;
        let code_text = SignalMessage::new(SignalKind::Answer, &offer.code, sdp).to_code(config)?;
        log::info!("📡 Answered peer offer for {}", offer.code);
        Ok((link, code_text))
    }

    /// Host side: apply the guest's answer code
    pub async fn complete(&self, answer_code: &str, config: &SyncConfig) -> Result<()> {
        let answer = SignalMessage::from_code(answer_code, config)
            .filter(|m| m.kind == SignalKind::Answer)
            .ok_or_else(|| GameError::Decode("not a peer answer code".into()))?;
        if answer.code != self.code {
            return Err(GameError::InvalidCode(format!(
                "answer is for {}, expected {}",
                answer.code, self.code
            )));
        }
        self.set_remote(RtcSdpType::Answer, &answer.sdp).await
    }

    async fn set_remote(&self, kind: RtcSdpType, sdp: &str) -> Result<()> {
        let description = RtcSessionDescriptionInit::new(kind);
        description.set_sdp(sdp);
        JsFuture::from(self.pc.set_remote_description(&description))
            .await
            .map_err(|e| rtc_error("setRemoteDescription", e))?;
        Ok(())
    }

    /// Local description once every ICE candidate is in it
    async fn gathered_sdp(&self) -> Result<String> {
        if self.pc.ice_gathering_state() != RtcIceGatheringState::Complete {
            let ice = self.ice.clone();
            futures::future::poll_fn(|cx| {
                let mut ice = ice.borrow_mut();
                if ice.complete {
                    Poll::Ready(())
                } else {
                    ice.waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            })
            .await;
        }
        self.pc
            .local_description()
            .map(|d| d.sdp())
            .ok_or_else(|| GameError::transport("peer", "no local description"))
    }

    fn listen_for_channel(&self) {
        let channel_slot = self.channel.clone();
        let handler = self.handler.clone();
        let closures = self.closures.clone();
        let on_channel = Closure::wrap(Box::new(move |event: JsValue| {
            let event: RtcDataChannelEvent = event.unchecked_into();
            let channel = event.channel();
            let on_message = message_closure(handler.clone());
            channel.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
            closures.borrow_mut().push(on_message);
            log::info!("📡 Peer data channel received: {}", channel.label());
            *channel_slot.borrow_mut() = Some(channel);
        }) as Box<dyn FnMut(JsValue)>);
        self.pc
            .set_ondatachannel(Some(on_channel.as_ref().unchecked_ref()));
        self.closures.borrow_mut().push(on_channel);
    }

    fn attach_channel(&self, channel: RtcDataChannel) {
        let on_message = message_closure(self.handler.clone());
        channel.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        self.closures.borrow_mut().push(on_message);
        *self.channel.borrow_mut() = Some(channel);
    }
}

fn message_closure(handler: TextHandler) -> JsCallback {
    Closure::wrap(Box::new(move |event: JsValue| {
        let event: MessageEvent = event.unchecked_into();
        let Some(text) = event.data().as_string() else {
            log::debug!("Ignoring non-text peer message");
            return;
        };
        let current = handler.borrow().clone();
        if let Some(handler) = current {
            handler(text);
        }
    }) as Box<dyn FnMut(JsValue)>)
}

impl PeerLink for RtcPeerLink {
    fn is_open(&self) -> bool {
        self.channel
            .borrow()
            .as_ref()
            .map_or(false, |c| c.ready_state() == RtcDataChannelState::Open)
    }

    fn send(&self, text: &str) -> Result<()> {
        let channel = self.channel.borrow();
        let channel = channel
            .as_ref()
            .filter(|c| c.ready_state() == RtcDataChannelState::Open)
            .ok_or_else(|| GameError::transport("peer", "data channel not open"))?;
        channel
            .send_with_str(text)
            .map_err(|e| rtc_error("DataChannel send", e))
    }

    fn set_on_message(&self, handler: Box<dyn Fn(String)>) {
        *self.handler.borrow_mut() = Some(Rc::from(handler));
    }

    fn close(&self) {
        if let Some(channel) = self.channel.borrow_mut().take() {
            channel.close();
        }
        self.pc.close();
    }
}

impl Drop for RtcPeerLink {
    fn drop(&mut self) {
        self.pc.set_onicecandidate(None);
        self.pc.set_ondatachannel(None);
    }
}
