//! Browser implementations of the sync collaborators.

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    window, BroadcastChannel, CustomEvent, CustomEventInit, Event, MessageEvent, StorageEvent,
};

use super::channel::{BroadcastPort, ChannelFactory, MessageHandler};
use super::url::LocationSource;
use crate::error::{GameError, Result};
use crate::notify::{ChangeNotifier, KeyListener, Subscription};
use crate::roster::SyncedGameData;

/// Same-document change event; `detail` is the storage key
pub const STATE_UPDATED_EVENT: &str = "impostor:state-updated";

type EventCallback = Closure<dyn FnMut(Event)>;

/// Announces writes with a custom event and hears other tabs through `storage`
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowNotifier;

impl ChangeNotifier for WindowNotifier {
    fn notify(&self, key: &str) {
        let Some(window) = window() else {
            return;
        };
        let init = CustomEventInit::new();
        init.set_detail(&JsValue::from_str(key));
        match CustomEvent::new_with_event_init_dict(STATE_UPDATED_EVENT, &init) {
            Ok(event) => {
                if let Err(e) = window.dispatch_event(&event) {
                    log::warn!("Failed to dispatch {}: {:?}", STATE_UPDATED_EVENT, e);
                }
            }
            Err(e) => log::warn!("Failed to create {}: {:?}", STATE_UPDATED_EVENT, e),
        }
    }

    fn listen(&self, listener: KeyListener) -> Subscription {
        let Some(window) = window() else {
            log::warn!("No window, change notifications disabled");
            return Subscription::new(|| {});
        };
        let listener: Rc<dyn Fn(&str)> = Rc::from(listener);

        let from_other_tabs = {
            let listener = listener.clone();
            Closure::wrap(Box::new(move |event: Event| {
                let event: StorageEvent = event.unchecked_into();
                if let Some(key) = event.key() {
                    listener(&key);
                }
            }) as Box<dyn FnMut(Event)>)
        };
        let from_this_tab = Closure::wrap(Box::new(move |event: Event| {
            let event: CustomEvent = event.unchecked_into();
            if let Some(key) = event.detail().as_string() {
                listener(&key);
            }
        }) as Box<dyn FnMut(Event)>);

        let registrations: Vec<(&'static str, EventCallback)> =
            vec![("storage", from_other_tabs), (STATE_UPDATED_EVENT, from_this_tab)];
        for (name, callback) in &registrations {
            if let Err(e) =
                window.add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())
            {
                log::warn!("Failed to listen for {}: {:?}", name, e);
            }
        }

        Subscription::new(move || {
            for (name, callback) in registrations {
                let _ = window
                    .remove_event_listener_with_callback(name, callback.as_ref().unchecked_ref());
            }
        })
    }
}

/// `BroadcastChannel` port
pub struct WebBroadcastPort {
    channel: BroadcastChannel,
    closed: Cell<bool>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
}

impl BroadcastPort for WebBroadcastPort {
    fn post(&self, data: &SyncedGameData) -> Result<()> {
        if self.closed.get() {
            return Err(GameError::InvalidState("channel port is closed".into()));
        }
        let value = data
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| GameError::Serialization(e.to_string()))?;
        self.channel
            .post_message(&value)
            .map_err(|e| GameError::transport("channel", format!("postMessage failed: {:?}", e)))
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.channel.set_onmessage(None);
        self.channel.close();
    }
}

impl Drop for WebBroadcastPort {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens real `BroadcastChannel`s
#[derive(Debug, Clone, Copy, Default)]
pub struct WebChannelFactory;

impl WebChannelFactory {
    /// Whether this browser has `BroadcastChannel`
    pub fn is_supported() -> bool {
        window()
            .map(|w| js_sys::Reflect::has(&w, &"BroadcastChannel".into()).unwrap_or(false))
            .unwrap_or(false)
    }
}

impl ChannelFactory for WebChannelFactory {
    fn open(&self, name: &str, on_message: MessageHandler) -> Result<Rc<dyn BroadcastPort>> {
        let channel = BroadcastChannel::new(name)
            .map_err(|e| GameError::transport("channel", format!("{:?}", e)))?;

        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
            match serde_wasm_bindgen::from_value::<SyncedGameData>(event.data()) {
                Ok(data) => on_message(data),
                Err(e) => log::debug!("Ignoring channel message: {}", e),
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        channel.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        Ok(Rc::new(WebBroadcastPort {
            channel,
            closed: Cell::new(false),
            _on_message: on_message,
        }))
    }
}

/// `window.location` and `history.replaceState`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserLocation;

impl LocationSource for BrowserLocation {
    fn href(&self) -> Option<String> {
        window()?.location().href().ok()
    }

    fn replace(&self, url: &str) -> Result<()> {
        let window = window().ok_or_else(|| GameError::transport("url", "no window"))?;
        let history = window
            .history()
            .map_err(|e| GameError::transport("url", format!("no history: {:?}", e)))?;
        history
            .replace_state_with_url(&JsValue::NULL, "", Some(url))
            .map_err(|e| GameError::transport("url", format!("replaceState failed: {:?}", e)))
    }
}
