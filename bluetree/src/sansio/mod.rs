//! Sans-IO handling of bus signals.
//!
//! This module keeps the signal-to-mutation pipeline independent of any
//! transport, so it can be tested by feeding it messages directly.
//!
//! # Architecture
//!
//! The handler follows the same poll-based pattern as a protocol state
//! machine:
//!
//! - `handle_message()`: feed one inbound message; a recognized signal is
//!   decoded into a [`BusEvent`] and applied to the tree immediately
//! - `poll_event()`: take the applied events, in order, e.g. to forward them
//!   to event sinks
//!
//! Events are applied in exactly the order they are fed, one at a time.
//! `PropertiesChanged` deltas are not snapshots; reordering them would
//! corrupt the tree.

pub mod handler;
pub mod types;

pub use self::handler::{interfaces_added, interfaces_removed, properties_changed, SignalHandler};
pub use self::types::BusEvent;
