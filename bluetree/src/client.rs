//! Round trips to the bus.
//!
//! [`Client`] turns the raw [`Bus::call`] into checked calls: every reply goes
//! through [`check_reply`], so callers only ever see a method return, a
//! [`ErrorKind::Remote`] error carrying the daemon's error name and body, or a
//! fatal [`ErrorKind::ProtocolViolation`].

use std::sync::Arc;

use tracing::{debug, trace};

use crate::bus::{Bus, Codec};
use crate::error::{Error, ErrorKind, Result};
use crate::match_rule::MatchRule;
use crate::message::{Message, MessageFields, MessageType};
use crate::tree::property_map_from_value;
use crate::value::{PropertyMap, Value};
use crate::{
    BUS_INTERFACE, BUS_NAME, BUS_PATH, OBJECT_MANAGER_INTERFACE, PROPERTIES_INTERFACE,
};

/// Checks a reply, turning error replies into [`ErrorKind::Remote`].
///
/// Anything other than a method return or an error is a
/// [`ErrorKind::ProtocolViolation`].
pub fn check_reply(reply: Message) -> Result<Message> {
    match reply.message_type {
        MessageType::MethodReturn => Ok(reply),
        MessageType::Error => {
            let name = reply.error_name.unwrap_or_default();
            debug!(%name, "remote error reply");
            Err(ErrorKind::Remote {
                name,
                body: reply.body,
            }
            .into())
        }
        other => Err(ErrorKind::ProtocolViolation(other).into()),
    }
}

/// The first body argument of a reply.
fn first_arg(reply: Message, what: &str) -> Result<Value> {
    reply
        .body
        .into_iter()
        .next()
        .ok_or_else(|| Error::decode(format!("empty reply to {}", what)))
}

pub struct Client {
    bus: Arc<dyn Bus>,
    codec: Arc<dyn Codec>,
}

impl Client {
    pub fn new(bus: Arc<dyn Bus>, codec: Arc<dyn Codec>) -> Self {
        Client { bus, codec }
    }

    pub fn bus(&self) -> &Arc<dyn Bus> {
        &self.bus
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub async fn connect(&self) -> Result<()> {
        self.bus.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.bus.disconnect().await
    }

    /// Calls `interface.member` on `path` at `destination` and checks the
    /// reply.
    ///
    /// # Arguments
    ///
    /// * `signature` - type signature of `body`, `""` for no arguments
    /// * `body` - the call arguments
    ///
    /// # Returns
    ///
    /// The method return message. Error replies are returned as
    /// [`ErrorKind::Remote`] without retrying.
    pub async fn call(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        member: &str,
        signature: &str,
        body: Vec<Value>,
    ) -> Result<Message> {
        trace!(destination, path, interface, member, signature, "call");
        let message = self.codec.message(
            MessageFields::method_call(destination, path, interface, member)
                .with_body(signature, body),
        )?;
        check_reply(self.bus.call(message).await?)
    }

    /// `org.freedesktop.DBus.Properties.Get`, decoded to a plain value.
    pub async fn get_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        key: &str,
    ) -> Result<Value> {
        let reply = self
            .call(
                destination,
                path,
                PROPERTIES_INTERFACE,
                "Get",
                "ss",
                vec![interface.into(), key.into()],
            )
            .await?;
        let value = first_arg(reply, "Get")?;
        Ok(self.codec.unpack(&self.codec.decode(&value)))
    }

    /// `org.freedesktop.DBus.Properties.GetAll`, decoded to a property map.
    pub async fn get_all_properties(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
    ) -> Result<PropertyMap> {
        let reply = self
            .call(
                destination,
                path,
                PROPERTIES_INTERFACE,
                "GetAll",
                "s",
                vec![interface.into()],
            )
            .await?;
        property_map_from_value(&self.codec.unpack(&first_arg(reply, "GetAll")?))
    }

    /// `org.freedesktop.DBus.Properties.Set`, with `value` encoded as
    /// `signature`.
    pub async fn set_property(
        &self,
        destination: &str,
        path: &str,
        interface: &str,
        key: &str,
        value: Value,
        signature: &str,
    ) -> Result<()> {
        let variant = self.codec.encode(value, signature)?;
        self.call(
            destination,
            path,
            PROPERTIES_INTERFACE,
            "Set",
            "ssv",
            vec![interface.into(), key.into(), variant],
        )
        .await?;
        Ok(())
    }

    /// `org.freedesktop.DBus.ObjectManager.GetManagedObjects` on `/`.
    ///
    /// Returns the raw nested map with every variant unpacked; see
    /// [`object_map_from_value`](crate::tree::object_map_from_value).
    pub async fn get_managed_objects(&self, destination: &str) -> Result<Value> {
        let reply = self
            .call(
                destination,
                "/",
                OBJECT_MANAGER_INTERFACE,
                "GetManagedObjects",
                "",
                Vec::new(),
            )
            .await?;
        Ok(self.codec.unpack(&first_arg(reply, "GetManagedObjects")?))
    }

    pub async fn add_match(&self, rule: &MatchRule) -> Result<()> {
        self.add_match_str(&rule.to_string()).await
    }

    pub async fn add_match_str(&self, rule: &str) -> Result<()> {
        self.bus_call("AddMatch", rule).await
    }

    pub async fn remove_match(&self, rule: &MatchRule) -> Result<()> {
        self.remove_match_str(&rule.to_string()).await
    }

    pub async fn remove_match_str(&self, rule: &str) -> Result<()> {
        self.bus_call("RemoveMatch", rule).await
    }

    async fn bus_call(&self, member: &str, rule: &str) -> Result<()> {
        self.call(
            BUS_NAME,
            BUS_PATH,
            BUS_INTERFACE,
            member,
            "s",
            vec![rule.into()],
        )
        .await?;
        Ok(())
    }
}
