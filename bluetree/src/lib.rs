//!Client-side mirror of a bus service's object tree.
//!
//!`bluetree` keeps an in-memory copy of every object, interface and property a
//!service such as BlueZ exposes through the object-manager convention, and
//!keeps it consistent from the service's `InterfacesAdded`,
//!`InterfacesRemoved` and `PropertiesChanged` signals.
//!
//!The transport is pluggable: anything implementing [`Bus`] can carry the
//!traffic, with a [`Codec`] for the value conversions. [`MemoryBus`] is an
//!in-process implementation.
//!
//!```rust
//!# use std::sync::Arc;
//!# use bluetree::{Bus, Manager, MemoryBus, Message, StandardCodec, Value};
//!# use bluetree::sansio::properties_changed;
//!# fn main() -> bluetree::Result<()> {
//!# let rt = tokio::runtime::Builder::new_current_thread().build()?;
//!# rt.block_on(async {
//!let bus = Arc::new(MemoryBus::new());
//!bus.respond("org.freedesktop.DBus.ObjectManager", "GetManagedObjects", |m| {
//!    Message::method_return(m).with_signature("a{oa{sa{sv}}}").with_body(vec![
//!        Value::Dict(vec![(
//!            Value::object_path("/org/bluez/hci0"),
//!            Value::dict([(
//!                "org.bluez.Adapter1",
//!                Value::dict([("Powered", Value::variant("b", Value::Bool(false)))]),
//!            )]),
//!        )]),
//!    ])
//!});
//!bus.respond("org.freedesktop.DBus", "AddMatch", Message::method_return);
//!
//!let manager = Manager::new("org.bluez", bus.clone(), Arc::new(StandardCodec));
//!manager.connect().await?;
//!manager.watch("/org/bluez").await?;
//!
//!bus.emit(&properties_changed(
//!    "/org/bluez/hci0",
//!    "org.bluez.Adapter1",
//!    vec![("Powered", Value::variant("b", Value::Bool(true)))],
//!    &[],
//!));
//!
//!let powered = manager.with_tree(|t| {
//!    t.get_property("/org/bluez/hci0", "org.bluez.Adapter1", "Powered").cloned()
//!})?;
//!assert_eq!(powered, Value::Bool(true));
//!# Ok(())
//!# })
//!# }
//!```
//!
//!Typed views over single interfaces are built on [`interface::Proxy`].

pub mod bus;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod interface;
pub mod manager;
pub mod match_rule;
pub mod memory;
pub mod message;
pub mod sansio;
pub mod signature;
pub mod tree;
pub mod value;


pub use crate::bus::{Bus, Clock, Codec, MessageHandler, SystemClock};
pub use crate::client::{check_reply, Client};
pub use crate::codec::StandardCodec;
pub use crate::config::Config;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::interface::{Interface, PropertyKey, Proxy};
pub use crate::manager::{Manager, ManagerState, SinkId, SinkResult};
pub use crate::match_rule::{MatchRule, MatchRuleDef};
pub use crate::memory::MemoryBus;
pub use crate::message::{Message, MessageFields, MessageFlags, MessageType};
pub use crate::sansio::BusEvent;
pub use crate::tree::ObjectTree;
pub use crate::value::{FromValue, InterfaceMap, ObjectMap, PropertyMap, Value, Variant};

/// Name of the bus daemon itself.
pub const BUS_NAME: &str = "org.freedesktop.DBus";
pub const BUS_PATH: &str = "/org/freedesktop/DBus";
pub const BUS_INTERFACE: &str = "org.freedesktop.DBus";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

pub const BLUEZ_SERVICE: &str = "org.bluez";
/// Parent of every adapter object.
pub const BLUEZ_ROOT_PATH: &str = "/org/bluez";
