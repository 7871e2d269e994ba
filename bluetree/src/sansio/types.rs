//! Events decoded from bus signals.

use std::time::SystemTime;

use serde::Serialize;

use crate::value::{InterfaceMap, PropertyMap};

/// A change to the object tree announced by the daemon.
///
/// Every variant carries the time it was received and the object path it
/// targets.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum BusEvent {
    /// `ObjectManager.InterfacesAdded`
    InterfacesAdded {
        timestamp: SystemTime,
        path: String,
        /// Interface name → initial properties
        interfaces: InterfaceMap,
    },
    /// `ObjectManager.InterfacesRemoved`
    InterfacesRemoved {
        timestamp: SystemTime,
        path: String,
        interfaces: Vec<String>,
    },
    /// `Properties.PropertiesChanged`
    PropertiesChanged {
        timestamp: SystemTime,
        path: String,
        interface: String,
        changed: PropertyMap,
        /// Keys whose value the daemon dropped without sending a new one
        invalidated: Vec<String>,
    },
}

impl BusEvent {
    pub fn path(&self) -> &str {
        match self {
            BusEvent::InterfacesAdded { path, .. }
            | BusEvent::InterfacesRemoved { path, .. }
            | BusEvent::PropertiesChanged { path, .. } => path,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            BusEvent::InterfacesAdded { timestamp, .. }
            | BusEvent::InterfacesRemoved { timestamp, .. }
            | BusEvent::PropertiesChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Whether the event concerns `interface`.
    pub fn touches(&self, interface: &str) -> bool {
        match self {
            BusEvent::InterfacesAdded { interfaces, .. } => interfaces.contains_key(interface),
            BusEvent::InterfacesRemoved { interfaces, .. } => {
                interfaces.iter().any(|i| i == interface)
            }
            BusEvent::PropertiesChanged { interface: i, .. } => i == interface,
        }
    }

    /// Properties carried by the event for `interface`, if any.
    pub fn properties(&self, interface: &str) -> Option<&PropertyMap> {
        match self {
            BusEvent::InterfacesAdded { interfaces, .. } => interfaces.get(interface),
            BusEvent::PropertiesChanged {
                interface: i,
                changed,
                ..
            } if i == interface => Some(changed),
            _ => None,
        }
    }
}
