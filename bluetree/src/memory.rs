//! An in-process [`Bus`].
//!
//! `MemoryBus` answers calls from registered responders, keeps a log of every
//! outbound call, and delivers injected messages to the installed handlers in
//! order. It stands in for a daemon in tests and in embedders that drive the
//! engine from recorded traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::bus::{same_handler, Bus, MessageHandler};
use crate::error::{ErrorKind, Result};
use crate::message::Message;

type Responder = Box<dyn Fn(&Message) -> Message + Send + Sync>;

#[derive(Default)]
struct Inner {
    connected: bool,
    serial: u32,
    responders: HashMap<(String, String), Responder>,
    calls: Vec<Message>,
    handlers: Vec<Arc<dyn MessageHandler>>,
}

#[derive(Default)]
pub struct MemoryBus {
    inner: Mutex<Inner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking responder must not wedge the bus for later callers.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answers every call to `interface.member` with the reply built by
    /// `responder`, replacing any previous responder for that pair.
    pub fn respond<F>(&self, interface: &str, member: &str, responder: F)
    where
        F: Fn(&Message) -> Message + Send + Sync + 'static,
    {
        self.lock()
            .responders
            .insert((interface.into(), member.into()), Box::new(responder));
    }

    /// Delivers `message` to the installed handlers, in installation order.
    pub fn emit(&self, message: &Message) {
        let handlers = self.lock().handlers.clone();
        for handler in handlers {
            handler.handle_message(message);
        }
    }

    /// Every call sent so far, oldest first.
    pub fn calls(&self) -> Vec<Message> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls to `interface.member` sent so far.
    pub fn calls_to(&self, interface: &str, member: &str) -> Vec<Message> {
        self.lock()
            .calls
            .iter()
            .filter(|m| {
                m.interface.as_deref() == Some(interface) && m.member.as_deref() == Some(member)
            })
            .cloned()
            .collect()
    }

    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn connect(&self) -> Result<()> {
        self.lock().connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.lock().connected = false;
        Ok(())
    }

    async fn call(&self, mut message: Message) -> Result<Message> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(ErrorKind::NotConnected.into());
        }

        inner.serial += 1;
        message.serial = inner.serial;
        inner.calls.push(message.clone());

        let key = (
            message.interface.clone().unwrap_or_default(),
            message.member.clone().unwrap_or_default(),
        );
        let mut reply = match inner.responders.get(&key) {
            Some(responder) => responder(&message),
            None => Message::error(&message, "org.freedesktop.DBus.Error.UnknownMethod")
                .with_signature("s")
                .with_body(vec![format!("no responder for {}.{}", key.0, key.1).into()]),
        };
        reply.reply_serial = Some(message.serial);
        Ok(reply)
    }

    fn add_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.lock().handlers.push(handler);
    }

    fn remove_message_handler(&self, handler: &Arc<dyn MessageHandler>) {
        self.lock().handlers.retain(|h| !same_handler(h, handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl MessageHandler for Counter {
        fn handle_message(&self, _message: &Message) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_call_requires_connection() {
        let bus = MemoryBus::new();
        let call = Message::method_call("org.bluez", "/", "a.b", "C");
        let e = bus.call(call.clone()).await.unwrap_err();
        assert_eq!(e.kind(), &ErrorKind::NotConnected);

        bus.connect().await.unwrap();
        let reply = bus.call(call).await.unwrap();
        assert_eq!(reply.message_type, MessageType::Error);
        assert_eq!(reply.reply_serial, Some(1));
        assert_eq!(bus.call_count(), 1);
    }

    #[tokio::test]
    async fn test_handlers_added_and_removed_by_identity() {
        let bus = MemoryBus::new();
        let a: Arc<dyn MessageHandler> = Arc::new(Counter(AtomicUsize::new(0)));
        let b: Arc<dyn MessageHandler> = Arc::new(Counter(AtomicUsize::new(0)));
        bus.add_message_handler(a.clone());
        bus.add_message_handler(b.clone());
        bus.remove_message_handler(&a);
        assert_eq!(bus.handler_count(), 1);

        bus.emit(&Message::signal("/", "a.b", "C"));
        bus.remove_message_handler(&b);
        assert_eq!(bus.handler_count(), 0);
    }
}
