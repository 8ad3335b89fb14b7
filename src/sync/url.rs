//! Game records embedded in share links.
//!
//! ```text
//! query:    https://host/path?game=ABCDCF2&state=eyJnYW1l...
//! fragment: https://host/path#game=ABCDCF2&data=eyJnYW1l...
//! ```
//!
//! The host's fragment link replaces the current history entry so a reload
//! or a bookmark carries the latest state. Guests poll their own location.

use std::cell::RefCell;
use std::rc::Rc;

use url::Url;

use super::codec::{decode_payload, encode_payload};
use super::{Subscription, SyncCallback, SyncTransport, TransportKind};
use crate::config::SyncConfig;
use crate::error::{GameError, Result};
use crate::roster::SyncedGameData;
use crate::runtime::Scheduler;

/// Where the payload goes in the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlStyle {
    /// `?game=…&state=…`
    #[default]
    Query,
    /// `#game=…&data=…`
    Fragment,
}

impl UrlStyle {
    fn payload_param(&self) -> &'static str {
        match self {
            UrlStyle::Query => "state",
            UrlStyle::Fragment => "data",
        }
    }
}

/// The document's current location
pub trait LocationSource {
    fn href(&self) -> Option<String>;
    /// Replace the current history entry
    fn replace(&self, url: &str) -> Result<()>;
}

/// Location held in memory
#[derive(Debug, Default)]
pub struct MemoryLocation {
    href: RefCell<String>,
}

impl MemoryLocation {
    pub fn new(href: &str) -> Self {
        Self {
            href: RefCell::new(href.to_string()),
        }
    }

    pub fn set(&self, href: &str) {
        *self.href.borrow_mut() = href.to_string();
    }
}

impl LocationSource for MemoryLocation {
    fn href(&self) -> Option<String> {
        let href = self.href.borrow();
        (!href.is_empty()).then(|| href.clone())
    }

    fn replace(&self, url: &str) -> Result<()> {
        self.set(url);
        Ok(())
    }
}

fn find_params(
    pairs: url::form_urlencoded::Parse<'_>,
    payload_param: &str,
) -> Option<(String, String)> {
    let mut game = None;
    let mut payload = None;
    for (key, value) in pairs {
        if key == "game" {
            game = Some(value.into_owned());
        } else if key == payload_param {
            payload = Some(value.into_owned());
        }
    }
    game.zip(payload)
}

/// Code and raw payload carried by `url`, query first, then fragment
fn shared_params(url: &Url) -> Option<(String, String)> {
    find_params(url.query_pairs(), UrlStyle::Query.payload_param()).or_else(|| {
        url.fragment().and_then(|fragment| {
            find_params(
                url::form_urlencoded::parse(fragment.as_bytes()),
                UrlStyle::Fragment.payload_param(),
            )
        })
    })
}

/// Game code and record from a share link, whatever game it names
pub fn detect_shared_game(href: &str) -> Option<(String, SyncedGameData)> {
    let url = Url::parse(href).ok()?;
    let (code, payload) = shared_params(&url)?;
    let data = decode_payload(&payload)?;
    Some((code, data))
}

pub struct UrlTransport {
    code: String,
    style: UrlStyle,
    is_host: bool,
    location: Rc<dyn LocationSource>,
    scheduler: Rc<dyn Scheduler>,
    config: SyncConfig,
}

impl UrlTransport {
    pub fn new(
        code: &str,
        style: UrlStyle,
        is_host: bool,
        location: Rc<dyn LocationSource>,
        scheduler: Rc<dyn Scheduler>,
        config: SyncConfig,
    ) -> Self {
        Self {
            code: code.to_string(),
            style,
            is_host,
            location,
            scheduler,
            config,
        }
    }

    /// Link carrying `data`, built on the current origin and path
    pub fn share_url(&self, data: &SyncedGameData) -> Result<String> {
        let href = self
            .location
            .href()
            .ok_or_else(|| GameError::transport("url", "no document location"))?;
        let mut url = Url::parse(&href)
            .map_err(|e| GameError::transport("url", format!("bad location {}: {}", href, e)))?;
        url.set_query(None);
        url.set_fragment(None);

        let params = format!(
            "game={}&{}={}",
            self.code,
            self.style.payload_param(),
            encode_payload(data)?
        );
        match self.style {
            UrlStyle::Query => url.set_query(Some(&params)),
            UrlStyle::Fragment => url.set_fragment(Some(&params)),
        }
        Ok(url.to_string())
    }

    /// Record in the current location, if it is for this game
    pub fn load_current(&self) -> Option<SyncedGameData> {
        self.fetch(&self.location.href()?)
    }

    fn payload_in(&self, href: &str) -> Option<String> {
        let url = Url::parse(href).ok()?;
        let (code, payload) = shared_params(&url)?;
        (code == self.code).then_some(payload)
    }
}

impl SyncTransport for UrlTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Url
    }

    fn is_available(&self) -> bool {
        self.location.href().is_some()
    }

    fn publish(&self, data: &SyncedGameData) -> Result<String> {
        let url = self.share_url(data)?;
        if self.is_host && self.style == UrlStyle::Fragment {
            self.location.replace(&url)?;
        }
        Ok(url)
    }

    fn fetch(&self, token: &str) -> Option<SyncedGameData> {
        decode_payload(&self.payload_in(token)?)
    }

    /// Checks now, then every poll interval; only changed payloads are delivered
    fn subscribe(&self, callback: SyncCallback) -> Option<Subscription> {
        let location = self.location.clone();
        let code = self.code.clone();
        let last_seen: RefCell<Option<String>> = RefCell::new(None);

        let check = Rc::new(move || {
            let Some(href) = location.href() else {
                return;
            };
            let Some(payload) = Url::parse(&href)
                .ok()
                .and_then(|url| shared_params(&url))
                .and_then(|(c, payload)| (c == code).then_some(payload))
            else {
                return;
            };
            if last_seen.borrow().as_deref() == Some(payload.as_str()) {
                return;
            }
            if let Some(data) = decode_payload(&payload) {
                *last_seen.borrow_mut() = Some(payload);
                callback(data);
            }
        });

        check();
        let tick = check.clone();
        let timer = self
            .scheduler
            .every(self.config.url_poll_interval(), Box::new(move || tick()));
        Some(Subscription::from_timer(timer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::StateGenerator;
    use crate::runtime::ManualScheduler;
    use std::cell::Cell;
    use std::time::Duration;

    const PAGE: &str = "https://play.example/impostor/?theme=dark#top";

    fn record(round: u32) -> SyncedGameData {
        let empty: [&str; 0] = [];
        let state = StateGenerator::default()
            .generate("ABCDCF2", round, "Food", 5, &empty)
            .unwrap();
        SyncedGameData::new(state, "h0st", 1_700_000_000_000)
    }

    fn transport(
        style: UrlStyle,
        is_host: bool,
    ) -> (UrlTransport, Rc<MemoryLocation>, ManualScheduler) {
        let location = Rc::new(MemoryLocation::new(PAGE));
        let scheduler = ManualScheduler::new();
        let t = UrlTransport::new(
            "ABCDCF2",
            style,
            is_host,
            location.clone(),
            Rc::new(scheduler.clone()),
            SyncConfig::default(),
        );
        (t, location, scheduler)
    }

    #[test]
    fn test_query_link() {
        let (t, location, _) = transport(UrlStyle::Query, true);
        let url = t.publish(&record(1)).unwrap();
        assert!(url.starts_with("https://play.example/impostor/?game=ABCDCF2&state="));
        assert!(!url.contains('#'));
        assert!(!url.contains("theme"));
        // query links never touch history
        assert_eq!(location.href().unwrap(), PAGE);
        assert_eq!(t.fetch(&url), Some(record(1)));
    }

    #[test]
    fn test_fragment_link_replaces_host_location() {
        let (t, location, _) = transport(UrlStyle::Fragment, true);
        let url = t.publish(&record(1)).unwrap();
        assert!(url.starts_with("https://play.example/impostor/#game=ABCDCF2&data="));
        assert_eq!(location.href().unwrap(), url);
        assert_eq!(t.load_current(), Some(record(1)));

        let (guest, guest_location, _) = transport(UrlStyle::Fragment, false);
        guest.publish(&record(2)).unwrap();
        assert_eq!(guest_location.href().unwrap(), PAGE);
    }

    #[test]
    fn test_fetch_ignores_other_games_and_garbage() {
        let (t, _, _) = transport(UrlStyle::Query, false);
        let url = t.share_url(&record(1)).unwrap();
        assert_eq!(t.fetch(&url.replace("ABCDCF2", "ZZZZCF2")), None);
        assert_eq!(t.fetch("https://play.example/?game=ABCDCF2&state=%%%%"), None);
        assert_eq!(t.fetch("https://play.example/?game=ABCDCF2"), None);
        assert_eq!(t.fetch("not a url"), None);
    }

    #[test]
    fn test_detect_shared_game() {
        let (t, _, _) = transport(UrlStyle::Query, false);
        let url = t.share_url(&record(3)).unwrap();
        let (code, data) = detect_shared_game(&url).unwrap();
        assert_eq!(code, "ABCDCF2");
        assert_eq!(data, record(3));
        assert!(detect_shared_game(PAGE).is_none());
    }

    #[test]
    fn test_poll_delivers_changes_once() {
        let (t, location, scheduler) = transport(UrlStyle::Fragment, false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let sub = t
            .subscribe(Rc::new(move |d: SyncedGameData| s.borrow_mut().push(d.game_state.round)))
            .unwrap();

        scheduler.advance(Duration::from_secs(2));
        assert!(seen.borrow().is_empty());

        location.set(&t.share_url(&record(1)).unwrap());
        scheduler.advance(Duration::from_secs(2));
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(*seen.borrow(), vec![1]);

        location.set(&t.share_url(&record(2)).unwrap());
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(*seen.borrow(), vec![1, 2]);

        sub.unsubscribe();
        sub.unsubscribe();
        location.set(&t.share_url(&record(3)).unwrap());
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_subscribe_checks_immediately() {
        let (t, location, _) = transport(UrlStyle::Query, false);
        location.set(&t.share_url(&record(4)).unwrap());
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let _sub = t
            .subscribe(Rc::new(move |_: SyncedGameData| h.set(h.get() + 1)))
            .unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unavailable_without_location() {
        let location = Rc::new(MemoryLocation::default());
        let t = UrlTransport::new(
            "ABCDCF2",
            UrlStyle::Query,
            true,
            location,
            Rc::new(ManualScheduler::new()),
            SyncConfig::default(),
        );
        assert!(!t.is_available());
        assert!(t.publish(&record(1)).is_err());
    }
}
