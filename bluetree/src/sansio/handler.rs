//! Signal handler state machine.
//!
//! This module turns inbound messages into tree mutations without any I/O.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::types::BusEvent;
use crate::bus::{Clock, Codec, SystemClock};
use crate::codec::StandardCodec;
use crate::error::{Error, Result};
use crate::message::{Message, MessageType};
use crate::tree::{interface_map_from_value, property_map_from_value, ObjectTree};
use crate::value::{FromValue, Value};
use crate::{OBJECT_MANAGER_INTERFACE, PROPERTIES_INTERFACE};

/// Sans-IO signal handler.
///
/// The handler contains no I/O code. Feed it messages in delivery order with
/// `handle_message()`; each recognized signal is decoded into a [`BusEvent`],
/// applied to the tree at once, and queued for `poll_event()`.
///
/// - Messages that are not signals are ignored.
/// - Signals with an unknown member yield no event.
/// - Signals that fail to decode are dropped.
///
/// # Example
///
/// ```
/// use bluetree::sansio::SignalHandler;
/// use bluetree::{Message, ObjectTree, Value};
///
/// let mut handler = SignalHandler::new();
/// let mut tree = ObjectTree::new();
///
/// let signal = Message::signal(
///     "/org/bluez",
///     "org.freedesktop.DBus.ObjectManager",
///     "InterfacesRemoved",
/// )
/// .with_signature("oas")
/// .with_body(vec![
///     Value::object_path("/org/bluez/hci0"),
///     Value::from(vec!["org.bluez.Adapter1".to_string()]),
/// ]);
///
/// assert!(handler.handle_message(&mut tree, &signal));
/// assert!(handler.poll_event().is_some());
/// ```
pub struct SignalHandler {
    codec: Arc<dyn Codec>,
    clock: Arc<dyn Clock>,
    /// Applied events not yet polled
    pending_events: VecDeque<BusEvent>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    /// A handler with the [`StandardCodec`] and the system clock.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(StandardCodec), Arc::new(SystemClock))
    }

    pub fn with_parts(codec: Arc<dyn Codec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec,
            clock,
            pending_events: VecDeque::new(),
        }
    }

    /// Decodes `message` into an event.
    ///
    /// # Returns
    ///
    /// `Ok(None)` for anything that is not an object-manager or properties
    /// signal, an error if a recognized signal has a malformed body.
    pub fn parse(&self, message: &Message) -> Result<Option<BusEvent>> {
        if message.message_type != MessageType::Signal {
            return Ok(None);
        }

        let interface = message.interface.as_deref().unwrap_or_default();
        let member = message.member.as_deref().unwrap_or_default();
        let body = &message.body;
        let arg = |n: usize| {
            body.get(n).map(|v| self.codec.unpack(v)).ok_or_else(|| {
                Error::decode(format!("{}.{} without argument {}", interface, member, n))
            })
        };

        // Keyed on interface and member: a member name alone does not identify
        // the object-manager and properties signals.
        let event = match (interface, member) {
            (OBJECT_MANAGER_INTERFACE, "InterfacesAdded") => BusEvent::InterfacesAdded {
                timestamp: self.clock.now(),
                path: String::from_value(&arg(0)?)?,
                interfaces: interface_map_from_value(&arg(1)?)?,
            },
            (OBJECT_MANAGER_INTERFACE, "InterfacesRemoved") => BusEvent::InterfacesRemoved {
                timestamp: self.clock.now(),
                path: String::from_value(&arg(0)?)?,
                interfaces: Vec::<String>::from_value(&arg(1)?)?,
            },
            (PROPERTIES_INTERFACE, "PropertiesChanged") => {
                let path = message
                    .path
                    .clone()
                    .ok_or_else(|| Error::decode("PropertiesChanged without path"))?;
                BusEvent::PropertiesChanged {
                    timestamp: self.clock.now(),
                    path,
                    interface: String::from_value(&arg(0)?)?,
                    changed: property_map_from_value(&arg(1)?)?,
                    invalidated: match body.get(2) {
                        Some(v) => Vec::<String>::from_value(v)?,
                        None => Vec::new(),
                    },
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Applies one event to `tree`.
    pub fn apply(tree: &mut ObjectTree, event: &BusEvent) {
        match event {
            BusEvent::InterfacesAdded {
                path, interfaces, ..
            } => {
                for (interface, properties) in interfaces {
                    tree.set_interface(path, interface, properties.clone());
                }
            }
            BusEvent::InterfacesRemoved {
                path, interfaces, ..
            } => {
                for interface in interfaces {
                    tree.remove_interface(path, interface);
                }
            }
            BusEvent::PropertiesChanged {
                path,
                interface,
                changed,
                invalidated,
                ..
            } => tree.update_interface(path, interface, changed.clone(), invalidated.as_slice()),
        }
    }

    /// Processes one inbound message.
    ///
    /// # Returns
    ///
    /// `true` if the message was a recognized signal and the tree was
    /// updated. Decode failures are logged and dropped.
    pub fn handle_message(&mut self, tree: &mut ObjectTree, message: &Message) -> bool {
        match self.parse(message) {
            Ok(Some(event)) => {
                Self::apply(tree, &event);
                self.pending_events.push_back(event);
                true
            }
            Ok(None) => false,
            Err(e) => {
                debug!(
                    interface = message.interface.as_deref().unwrap_or_default(),
                    member = message.member.as_deref().unwrap_or_default(),
                    error = %e,
                    "dropping undecodable signal"
                );
                false
            }
        }
    }

    /// Next applied event, oldest first.
    pub fn poll_event(&mut self) -> Option<BusEvent> {
        self.pending_events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }
}

/// Builds an `InterfacesAdded` signal; `interfaces` must be `a{sa{sv}}`.
pub fn interfaces_added(path: &str, interfaces: Value) -> Message {
    Message::signal("/", OBJECT_MANAGER_INTERFACE, "InterfacesAdded")
        .with_signature("oa{sa{sv}}")
        .with_body(vec![Value::object_path(path), interfaces])
}

pub fn interfaces_removed(path: &str, interfaces: &[&str]) -> Message {
    Message::signal("/", OBJECT_MANAGER_INTERFACE, "InterfacesRemoved")
        .with_signature("oas")
        .with_body(vec![
            Value::object_path(path),
            Value::Array(interfaces.iter().map(|&i| i.into()).collect()),
        ])
}

/// Builds a `PropertiesChanged` signal the way the daemon sends it.
pub fn properties_changed(
    path: &str,
    interface: &str,
    changed: Vec<(&str, Value)>,
    invalidated: &[&str],
) -> Message {
    Message::signal(path, PROPERTIES_INTERFACE, "PropertiesChanged")
        .with_signature("sa{sv}as")
        .with_body(vec![
            interface.into(),
            Value::dict(changed),
            Value::Array(invalidated.iter().map(|&k| k.into()).collect()),
        ])
}
