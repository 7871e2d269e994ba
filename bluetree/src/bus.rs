//! The transport boundary.
//!
//! The engine never touches a socket. A backend implements [`Bus`] for the
//! round trips and delivers inbound traffic to every installed
//! [`MessageHandler`]; a [`Codec`] converts between native values and the
//! tagged form the wire expects.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Message, MessageFields};
use crate::value::Value;

/// A connection to a message bus.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Sends `message` and waits for the reply correlated with it.
    ///
    /// The reply is returned whatever its type; checking it is up to the
    /// caller.
    async fn call(&self, message: Message) -> Result<Message>;

    /// Installs a router for inbound messages.
    ///
    /// Handlers are invoked in delivery order, one message at a time.
    fn add_message_handler(&self, handler: Arc<dyn MessageHandler>);

    /// Removes a router previously installed with
    /// [`add_message_handler`](Bus::add_message_handler), compared by
    /// identity.
    fn remove_message_handler(&self, handler: &Arc<dyn MessageHandler>);
}

pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: &Message);
}

pub trait Codec: Send + Sync {
    /// Wraps `value` into a variant tagged with `signature`, checking that it
    /// conforms.
    fn encode(&self, value: Value, signature: &str) -> Result<Value>;

    /// Strips one variant layer, if any.
    fn decode(&self, value: &Value) -> Value;

    /// Strips every variant layer, recursively.
    fn unpack(&self, value: &Value) -> Value;

    fn message(&self, fields: MessageFields) -> Result<Message>;
}

/// Source of event timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Compares two handler handles by the object they point to.
pub(crate) fn same_handler(a: &Arc<dyn MessageHandler>, b: &Arc<dyn MessageHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
