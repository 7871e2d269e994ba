//! The session object.
//!
//! A [`Manager`] owns the bus [`Client`], the [`ObjectTree`] and the signal
//! router for one connection to one service. It moves through
//!
//! ```text
//! Disconnected -> Connecting -> Synced -> Watching -> Disconnected
//! ```
//!
//! `connect()` opens the transport and loads the whole tree with
//! `GetManagedObjects`. `watch()` installs the router and subscribes to the
//! object-manager and properties signals of a subtree; from then on every
//! inbound signal mutates the tree in delivery order. Reads of the tree never
//! touch the bus.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::bus::{Bus, Clock, Codec, MessageHandler, SystemClock};
use crate::client::Client;
use crate::config::Config;
use crate::error::{ErrorKind, Result};
use crate::match_rule::MatchRule;
use crate::message::Message;
use crate::sansio::{BusEvent, SignalHandler};
use crate::tree::{object_map_from_value, ObjectTree};
use crate::value::{PropertyMap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Disconnected,
    /// Transport open, initial resync in progress
    Connecting,
    /// Tree loaded, no signals routed
    Synced,
    /// At least one subtree watched
    Watching,
}

/// Result of an event sink. Errors are logged and otherwise ignored.
pub type SinkResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type EventSink = Arc<dyn Fn(&BusEvent) -> SinkResult + Send + Sync>;

/// Handle returned by [`Manager::add_event_sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}

/// Routes inbound messages through the signal handler into the tree, then
/// hands the applied events to the sinks.
struct Router {
    tree: Arc<RwLock<ObjectTree>>,
    handler: Mutex<SignalHandler>,
    sinks: RwLock<Vec<(SinkId, EventSink)>>,
}

impl Router {
    fn notify(&self, event: &BusEvent) {
        let sinks: Vec<(SinkId, EventSink)> = read(&self.sinks).clone();
        for (id, sink) in sinks {
            match catch_unwind(AssertUnwindSafe(|| sink(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(sink = id.0, error = %e, "event sink failed"),
                Err(_) => warn!(sink = id.0, "event sink panicked"),
            }
        }
    }
}

impl MessageHandler for Router {
    fn handle_message(&self, message: &Message) {
        let events = {
            let mut handler = lock(&self.handler);
            let mut tree = write(&self.tree);
            if !handler.handle_message(&mut tree, message) {
                return;
            }
            std::iter::from_fn(|| handler.poll_event()).collect::<Vec<_>>()
        };

        for event in &events {
            self.notify(event);
        }
    }
}

pub struct Manager {
    service: String,
    client: Client,
    tree: Arc<RwLock<ObjectTree>>,
    router: Arc<Router>,
    /// Identity under which the router is installed on the bus
    router_handle: Arc<dyn MessageHandler>,
    state: RwLock<ManagerState>,
    watched: Mutex<BTreeMap<String, Vec<MatchRule>>>,
    /// Serializes lifecycle transitions
    transition: tokio::sync::Mutex<()>,
    next_sink: AtomicU64,
}

impl Manager {
    pub fn new(service: &str, bus: Arc<dyn Bus>, codec: Arc<dyn Codec>) -> Self {
        Self::with_clock(service, bus, codec, Arc::new(SystemClock))
    }

    pub fn with_clock(
        service: &str,
        bus: Arc<dyn Bus>,
        codec: Arc<dyn Codec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tree = Arc::new(RwLock::new(ObjectTree::new()));
        let router = Arc::new(Router {
            tree: tree.clone(),
            handler: Mutex::new(SignalHandler::with_parts(codec.clone(), clock)),
            sinks: RwLock::new(Vec::new()),
        });
        let router_handle: Arc<dyn MessageHandler> = router.clone();

        Manager {
            service: service.to_string(),
            client: Client::new(bus, codec),
            tree,
            router,
            router_handle,
            state: RwLock::new(ManagerState::Disconnected),
            watched: Mutex::new(BTreeMap::new()),
            transition: tokio::sync::Mutex::new(()),
            next_sink: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config, bus: Arc<dyn Bus>, codec: Arc<dyn Codec>) -> Self {
        Self::new(&config.service, bus, codec)
    }

    /// The well-known bus name of the service this manager mirrors.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn state(&self) -> ManagerState {
        *read(&self.state)
    }

    fn set_state(&self, state: ManagerState) {
        debug!(service = %self.service, ?state, "manager state");
        *write(&self.state) = state;
    }

    pub fn watched_paths(&self) -> Vec<String> {
        lock(&self.watched).keys().cloned().collect()
    }

    /// Opens the transport and loads the whole tree.
    ///
    /// A failed resync closes the transport again and leaves the manager
    /// disconnected.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        if self.state() != ManagerState::Disconnected {
            return Ok(());
        }

        self.set_state(ManagerState::Connecting);
        if let Err(e) = self.client.connect().await {
            self.set_state(ManagerState::Disconnected);
            return Err(e);
        }

        if let Err(e) = self.reset_tree().await {
            if let Err(close) = self.client.disconnect().await {
                warn!(error = %close, "closing transport after failed resync");
            }
            self.set_state(ManagerState::Disconnected);
            return Err(e);
        }

        self.set_state(ManagerState::Synced);
        Ok(())
    }

    /// Replaces the tree wholesale with the service's current objects.
    pub async fn reset_tree(&self) -> Result<()> {
        let objects = object_map_from_value(&self.get_managed_objects().await?)?;
        debug!(service = %self.service, objects = objects.len(), "resync");
        *write(&self.tree) = ObjectTree::from_objects(objects);
        Ok(())
    }

    /// Subscribes to the tree signals of everything at or below `path`.
    ///
    /// The router is installed before the match rules are added, so no
    /// signal the daemon sends after subscribing is missed. Watching a path
    /// twice is a no-op.
    pub async fn watch(&self, path: &str) -> Result<()> {
        let _guard = self.transition.lock().await;
        match self.state() {
            ManagerState::Synced | ManagerState::Watching => {}
            _ => return Err(ErrorKind::NotConnected.into()),
        }
        if lock(&self.watched).contains_key(path) {
            return Ok(());
        }

        let rules = MatchRule::default_rules(path)?;
        let first = lock(&self.watched).is_empty();
        if first {
            self.client.bus().add_message_handler(self.router_handle.clone());
        }

        for (added, rule) in rules.iter().enumerate() {
            if let Err(e) = self.client.add_match(rule).await {
                self.remove_rules(&rules[..added]).await;
                if first {
                    self.client.bus().remove_message_handler(&self.router_handle);
                }
                return Err(e);
            }
        }

        lock(&self.watched).insert(path.to_string(), rules);
        self.set_state(ManagerState::Watching);
        Ok(())
    }

    /// Drops the subscription for `path`.
    ///
    /// Rule removal is best-effort: failures are logged and the path is
    /// forgotten anyway. When no path is left the router is detached.
    pub async fn unwatch(&self, path: &str) -> Result<()> {
        let _guard = self.transition.lock().await;
        self.unwatch_locked(path).await;
        Ok(())
    }

    async fn unwatch_locked(&self, path: &str) {
        let Some(rules) = lock(&self.watched).remove(path) else {
            return;
        };
        self.remove_rules(&rules).await;

        if lock(&self.watched).is_empty() {
            self.client.bus().remove_message_handler(&self.router_handle);
            if self.state() == ManagerState::Watching {
                self.set_state(ManagerState::Synced);
            }
        }
    }

    async fn remove_rules(&self, rules: &[MatchRule]) {
        for rule in rules {
            if let Err(e) = self.client.remove_match(rule).await {
                warn!(rule = %rule, error = %e, "failed to remove match rule");
            }
        }
    }

    /// Unwatches every path, detaches the router and closes the transport.
    ///
    /// The manager ends up disconnected even if part of the teardown fails;
    /// only a failure to close the transport is returned.
    pub async fn disconnect(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        if self.state() == ManagerState::Disconnected {
            return Ok(());
        }

        for path in self.watched_paths() {
            self.unwatch_locked(&path).await;
        }
        self.client.bus().remove_message_handler(&self.router_handle);

        let closed = self.client.disconnect().await;
        if let Err(e) = &closed {
            warn!(error = %e, "failed to close transport");
        }
        self.set_state(ManagerState::Disconnected);
        closed
    }

    /// Feeds `message` to the router, as the bus does for inbound traffic.
    pub fn dispatch(&self, message: &Message) {
        self.router.handle_message(message);
    }

    /// Registers a callback for every applied event.
    ///
    /// Sinks run after the tree has been updated and outside any lock. A
    /// failing or panicking sink is logged and does not affect the others.
    pub fn add_event_sink<F>(&self, sink: F) -> SinkId
    where
        F: Fn(&BusEvent) -> SinkResult + Send + Sync + 'static,
    {
        let id = SinkId(self.next_sink.fetch_add(1, Ordering::Relaxed));
        write(&self.router.sinks).push((id, Arc::new(sink)));
        id
    }

    pub fn remove_event_sink(&self, id: SinkId) -> bool {
        let mut sinks = write(&self.router.sinks);
        let before = sinks.len();
        sinks.retain(|(i, _)| *i != id);
        sinks.len() != before
    }

    /// Runs `f` against the current tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&ObjectTree) -> R) -> R {
        f(&read(&self.tree))
    }

    pub fn snapshot(&self) -> ObjectTree {
        read(&self.tree).clone()
    }

    pub async fn call(
        &self,
        path: &str,
        interface: &str,
        member: &str,
        signature: &str,
        body: Vec<Value>,
    ) -> Result<Message> {
        self.client
            .call(&self.service, path, interface, member, signature, body)
            .await
    }

    pub async fn get_property(&self, path: &str, interface: &str, key: &str) -> Result<Value> {
        self.client
            .get_property(&self.service, path, interface, key)
            .await
    }

    pub async fn get_all_properties(&self, path: &str, interface: &str) -> Result<PropertyMap> {
        self.client
            .get_all_properties(&self.service, path, interface)
            .await
    }

    /// Sets a property on the daemon.
    ///
    /// The cached tree is not touched; it changes when the daemon's
    /// `PropertiesChanged` for the write arrives.
    pub async fn set_property(
        &self,
        path: &str,
        interface: &str,
        key: &str,
        value: Value,
        signature: &str,
    ) -> Result<()> {
        self.client
            .set_property(&self.service, path, interface, key, value, signature)
            .await
    }

    pub async fn get_managed_objects(&self) -> Result<Value> {
        self.client.get_managed_objects(&self.service).await
    }

    pub async fn add_match(&self, rule: &MatchRule) -> Result<()> {
        self.client.add_match(rule).await
    }

    pub async fn remove_match(&self, rule: &MatchRule) -> Result<()> {
        self.client.remove_match(rule).await
    }
}
