//! Predicates over [`BusEvent`]s for event sinks.
//!
//! ```rust
//! # use bluetree_interfaces::filters::device_connected;
//! # fn sinks(client: &bluetree_interfaces::BluezClient) {
//! client.add_event_sink(|event| {
//!     if device_connected(event) {
//!         println!("{} connected", event.path());
//!     }
//!     Ok(())
//! });
//! # }
//! ```

use bluetree::BusEvent;

use crate::org_bluez_device1::DEVICE_INTERFACE;

/// A device was seen advertising: its `RSSI` appeared or changed.
pub fn device_discovered(event: &BusEvent) -> bool {
    event
        .properties(DEVICE_INTERFACE)
        .is_some_and(|props| props.contains_key("RSSI"))
}

/// A device reports `Connected` as true.
pub fn device_connected(event: &BusEvent) -> bool {
    event
        .properties(DEVICE_INTERFACE)
        .and_then(|props| props.get("Connected"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}
