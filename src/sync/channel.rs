//! `BroadcastChannel` sync with a persisted backup copy.
//!
//! Publishing stores the record under `{sync_prefix}{code}` and posts it on
//! channel `{channel_prefix}{code}`. Subscribers hear posts from other ports
//! and also re-read the stored copy on a timer, in case a post was missed
//! (for example while the tab was asleep).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::{Subscription, SyncCallback, SyncTransport, TransportKind};
use crate::config::SyncConfig;
use crate::error::{GameError, Result};
use crate::roster::SyncedGameData;
use crate::runtime::{Scheduler, TimerHandle};
use crate::storage::KeyValueStore;

/// Handler for records posted by other ports
pub type MessageHandler = Box<dyn Fn(SyncedGameData)>;

/// One open port on a named channel. A port never hears its own posts.
pub trait BroadcastPort {
    fn post(&self, data: &SyncedGameData) -> Result<()>;
    fn close(&self);
}

/// Opens ports on named channels
pub trait ChannelFactory {
    fn open(&self, name: &str, on_message: MessageHandler) -> Result<Rc<dyn BroadcastPort>>;
}

struct HubPort {
    id: u64,
    handler: Rc<dyn Fn(SyncedGameData)>,
}

type Channels = Rc<RefCell<HashMap<String, Vec<HubPort>>>>;

/// In-process stand-in for `BroadcastChannel`
#[derive(Default, Clone)]
pub struct MemoryChannelHub {
    channels: Channels,
    next_id: Rc<Cell<u64>>,
}

impl MemoryChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open ports on `name`
    pub fn port_count(&self, name: &str) -> usize {
        self.channels.borrow().get(name).map_or(0, Vec::len)
    }
}

struct MemoryPort {
    id: u64,
    name: String,
    channels: Weak<RefCell<HashMap<String, Vec<HubPort>>>>,
    closed: Cell<bool>,
}

impl BroadcastPort for MemoryPort {
    fn post(&self, data: &SyncedGameData) -> Result<()> {
        if self.closed.get() {
            return Err(GameError::InvalidState(format!(
                "port on {} is closed",
                self.name
            )));
        }
        let Some(channels) = self.channels.upgrade() else {
            return Ok(());
        };
        let handlers: Vec<_> = channels
            .borrow()
            .get(&self.name)
            .map(|ports| {
                ports
                    .iter()
                    .filter(|p| p.id != self.id)
                    .map(|p| p.handler.clone())
                    .collect()
            })
            .unwrap_or_default();
        for handler in handlers {
            handler(data.clone());
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(channels) = self.channels.upgrade() {
            if let Some(ports) = channels.borrow_mut().get_mut(&self.name) {
                ports.retain(|p| p.id != self.id);
            }
        }
    }
}

impl ChannelFactory for MemoryChannelHub {
    fn open(&self, name: &str, on_message: MessageHandler) -> Result<Rc<dyn BroadcastPort>> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.channels
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(HubPort {
                id,
                handler: Rc::from(on_message),
            });
        Ok(Rc::new(MemoryPort {
            id,
            name: name.to_string(),
            channels: Rc::downgrade(&self.channels),
            closed: Cell::new(false),
        }))
    }
}

pub struct ChannelTransport {
    code: String,
    factory: Rc<dyn ChannelFactory>,
    store: Rc<dyn KeyValueStore>,
    scheduler: Rc<dyn Scheduler>,
    config: SyncConfig,
    closed: Rc<Cell<bool>>,
    ports: Rc<RefCell<Vec<Rc<dyn BroadcastPort>>>>,
    timers: Rc<RefCell<Vec<Rc<TimerHandle>>>>,
}

impl ChannelTransport {
    pub fn new(
        code: &str,
        factory: Rc<dyn ChannelFactory>,
        store: Rc<dyn KeyValueStore>,
        scheduler: Rc<dyn Scheduler>,
        config: SyncConfig,
    ) -> Self {
        Self {
            code: code.to_string(),
            factory,
            store,
            scheduler,
            config,
            closed: Rc::new(Cell::new(false)),
            ports: Rc::new(RefCell::new(Vec::new())),
            timers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Stop every subscription opened through this transport.
    /// Publishing after close fails; closing twice is a no-op.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        for timer in self.timers.borrow_mut().drain(..) {
            timer.cancel();
        }
        for port in self.ports.borrow_mut().drain(..) {
            port.close();
        }
        log::debug!("Closed channel transport for {}", self.code);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Subscriptions still listening
    pub fn subscription_count(&self) -> usize {
        self.ports.borrow().len()
    }

    fn channel_name(&self) -> String {
        self.config.channel_name(&self.code)
    }

    fn load_backup(store: &dyn KeyValueStore, key: &str) -> Option<SyncedGameData> {
        let json = store.get(key).ok()??;
        SyncedGameData::from_json(&json).ok()
    }
}

impl SyncTransport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Channel
    }

    fn is_available(&self) -> bool {
        !self.is_closed()
    }

    fn publish(&self, data: &SyncedGameData) -> Result<String> {
        if self.is_closed() {
            return Err(GameError::transport(self.kind().name(), "closed"));
        }
        self.store
            .set(&self.config.sync_key(&self.code), &data.to_json()?)?;

        let port = self
            .factory
            .open(&self.channel_name(), Box::new(|_: SyncedGameData| {}))
            .map_err(|e| GameError::transport(self.kind().name(), e.to_string()))?;
        let posted = port.post(data);
        port.close();
        posted.map_err(|e| GameError::transport(self.kind().name(), e.to_string()))?;

        Ok(self.code.clone())
    }

    /// `token` is a game code
    fn fetch(&self, token: &str) -> Option<SyncedGameData> {
        Self::load_backup(self.store.as_ref(), &self.config.sync_key(token))
    }

    fn subscribe(&self, callback: SyncCallback) -> Option<Subscription> {
        if self.is_closed() {
            return None;
        }

        // Last delivered `lastUpdated`; the poll skips copies already delivered
        let last_seen: Rc<Cell<Option<u64>>> = Rc::new(Cell::new(None));

        let on_message = {
            let callback = callback.clone();
            let last_seen = last_seen.clone();
            let closed = self.closed.clone();
            Box::new(move |data: SyncedGameData| {
                if closed.get() {
                    return;
                }
                last_seen.set(Some(data.last_updated));
                callback(data);
            })
        };
        let port = match self.factory.open(&self.channel_name(), on_message) {
            Ok(port) => port,
            Err(e) => {
                log::warn!("Channel {} unavailable: {}", self.channel_name(), e);
                return None;
            }
        };

        let poll = {
            let store = self.store.clone();
            let key = self.config.sync_key(&self.code);
            let closed = self.closed.clone();
            Box::new(move || {
                if closed.get() {
                    return;
                }
                let Some(data) = Self::load_backup(store.as_ref(), &key) else {
                    return;
                };
                if last_seen.get() == Some(data.last_updated) {
                    return;
                }
                last_seen.set(Some(data.last_updated));
                callback(data);
            })
        };
        let timer = Rc::new(
            self.scheduler
                .every(self.config.channel_poll_interval(), poll),
        );

        self.ports.borrow_mut().push(port.clone());
        self.timers.borrow_mut().push(timer.clone());

        let ports = self.ports.clone();
        let timers = self.timers.clone();
        Some(Subscription::new(move || {
            timer.cancel();
            port.close();
            ports.borrow_mut().retain(|p| !Rc::ptr_eq(p, &port));
            timers.borrow_mut().retain(|t| !Rc::ptr_eq(t, &timer));
        }))
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::StateGenerator;
    use crate::runtime::ManualScheduler;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    struct Tab {
        transport: ChannelTransport,
        seen: Rc<RefCell<Vec<u64>>>,
    }

    fn tab(hub: &MemoryChannelHub, store: &Rc<MemoryStorage>, scheduler: &ManualScheduler) -> Tab {
        Tab {
            transport: ChannelTransport::new(
                "ABCDCF2",
                Rc::new(hub.clone()),
                store.clone(),
                Rc::new(scheduler.clone()),
                SyncConfig::default(),
            ),
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn watch(tab: &Tab) -> Subscription {
        let seen = tab.seen.clone();
        tab.transport
            .subscribe(Rc::new(move |d: SyncedGameData| {
                seen.borrow_mut().push(d.last_updated)
            }))
            .unwrap()
    }

    fn record(last_updated: u64) -> SyncedGameData {
        let empty: [&str; 0] = [];
        let state = StateGenerator::default()
            .generate("ABCDCF2", 2, "Food", 5, &empty)
            .unwrap();
        SyncedGameData::new(state, "h0st", last_updated)
    }

    #[test]
    fn test_post_reaches_other_tabs() {
        let hub = MemoryChannelHub::new();
        let store = Rc::new(MemoryStorage::new());
        let scheduler = ManualScheduler::new();
        let host = tab(&hub, &store, &scheduler);
        let guest = tab(&hub, &store, &scheduler);
        let _host_sub = watch(&host);
        let _guest_sub = watch(&guest);

        assert_eq!(host.transport.publish(&record(10)).unwrap(), "ABCDCF2");

        // every subscribed port hears it; the publishing port was temporary
        assert_eq!(*guest.seen.borrow(), vec![10]);
        assert_eq!(*host.seen.borrow(), vec![10]);
        assert!(store.get("impostor-sync-ABCDCF2").unwrap().is_some());
        assert_eq!(guest.transport.fetch("ABCDCF2"), Some(record(10)));
        assert_eq!(hub.port_count("impostor-ABCDCF2"), 2);
    }

    #[test]
    fn test_backup_poll_delivers_missed_updates_once() {
        let hub = MemoryChannelHub::new();
        let store = Rc::new(MemoryStorage::new());
        let scheduler = ManualScheduler::new();
        let guest = tab(&hub, &store, &scheduler);
        let _sub = watch(&guest);

        // written by a tab whose post never arrived
        store
            .set("impostor-sync-ABCDCF2", &record(20).to_json().unwrap())
            .unwrap();
        scheduler.advance(Duration::from_secs(3));
        scheduler.advance(Duration::from_secs(3));
        assert_eq!(*guest.seen.borrow(), vec![20]);
    }

    #[test]
    fn test_poll_skips_copy_already_posted() {
        let hub = MemoryChannelHub::new();
        let store = Rc::new(MemoryStorage::new());
        let scheduler = ManualScheduler::new();
        let host = tab(&hub, &store, &scheduler);
        let guest = tab(&hub, &store, &scheduler);
        let _sub = watch(&guest);

        host.transport.publish(&record(30)).unwrap();
        scheduler.advance(Duration::from_secs(9));
        assert_eq!(*guest.seen.borrow(), vec![30]);
    }

    #[test]
    fn test_unsubscribe_and_close() {
        let hub = MemoryChannelHub::new();
        let store = Rc::new(MemoryStorage::new());
        let scheduler = ManualScheduler::new();
        let host = tab(&hub, &store, &scheduler);
        let guest = tab(&hub, &store, &scheduler);

        let sub = watch(&guest);
        sub.unsubscribe();
        sub.unsubscribe();
        host.transport.publish(&record(40)).unwrap();
        scheduler.advance(Duration::from_secs(3));
        assert!(guest.seen.borrow().is_empty());

        let _live = watch(&guest);
        guest.transport.close();
        guest.transport.close();
        host.transport.publish(&record(41)).unwrap();
        scheduler.advance(Duration::from_secs(3));
        assert!(guest.seen.borrow().is_empty());
        assert_eq!(hub.port_count("impostor-ABCDCF2"), 0);
        assert_eq!(scheduler.active_tasks(), 0);

        assert!(!guest.transport.is_available());
        assert!(guest.transport.publish(&record(42)).is_err());
        assert!(guest
            .transport
            .subscribe(Rc::new(|_: SyncedGameData| {}))
            .is_none());
    }

    #[test]
    fn test_unsubscribe_releases_ports_and_timers() {
        let hub = MemoryChannelHub::new();
        let store = Rc::new(MemoryStorage::new());
        let scheduler = ManualScheduler::new();
        let guest = tab(&hub, &store, &scheduler);

        for _ in 0..5 {
            watch(&guest).unsubscribe();
        }
        assert_eq!(guest.transport.subscription_count(), 0);
        assert_eq!(hub.port_count("impostor-ABCDCF2"), 0);
        assert_eq!(scheduler.active_tasks(), 0);

        let live = watch(&guest);
        let _kept = watch(&guest);
        drop(live);
        assert_eq!(guest.transport.subscription_count(), 1);
        assert_eq!(hub.port_count("impostor-ABCDCF2"), 1);

        guest.transport.close();
        assert_eq!(guest.transport.subscription_count(), 0);
    }

    #[test]
    fn test_channels_are_per_game() {
        let hub = MemoryChannelHub::new();
        let store = Rc::new(MemoryStorage::new());
        let scheduler = ManualScheduler::new();
        let guest = tab(&hub, &store, &scheduler);
        let _sub = watch(&guest);

        let other = ChannelTransport::new(
            "WXYZCF2",
            Rc::new(hub.clone()),
            store.clone(),
            Rc::new(scheduler.clone()),
            SyncConfig::default(),
        );
        other.publish(&record(50)).unwrap();
        scheduler.advance(Duration::from_secs(3));
        assert!(guest.seen.borrow().is_empty());
    }
}
