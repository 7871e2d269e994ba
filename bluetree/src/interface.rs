//! Typed views over one interface of one object.
//!
//! An entity is a [`Proxy`] (object path, interface name and owning
//! [`Manager`]) plus typed accessors. Cached readers look the property up in
//! the manager's tree and never touch the bus; setters and methods are round
//! trips through the manager.
//!
//! Property names are closed enums implementing [`PropertyKey`], each key
//! marked optional or required. A missing required key is
//! [`ErrorKind::NotFound`](crate::ErrorKind::NotFound); a missing optional key
//! reads as `None`.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::message::Message;
use crate::value::{FromValue, PropertyMap, Value};

/// A property name of one interface.
pub trait PropertyKey: Copy + fmt::Debug {
    /// The name on the bus.
    fn name(self) -> &'static str;

    /// Whether the daemon may leave the property out.
    fn is_optional(self) -> bool {
        false
    }
}

#[derive(Clone)]
pub struct Proxy {
    path: String,
    interface: &'static str,
    manager: Arc<Manager>,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("path", &self.path)
            .field("interface", &self.interface)
            .finish()
    }
}

impl Proxy {
    pub fn new(manager: Arc<Manager>, path: &str, interface: &'static str) -> Self {
        Proxy {
            path: path.to_string(),
            interface,
            manager,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last element of the object path, e.g. `hci0`.
    pub fn short_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Whether the object currently exposes this interface in the cache.
    pub fn exists(&self) -> bool {
        self.manager
            .with_tree(|t| t.has_interface(&self.path, self.interface))
    }

    /// All cached properties of this interface.
    pub fn cached_properties(&self) -> Result<PropertyMap> {
        self.manager
            .with_tree(|t| t.get_all_properties(&self.path, self.interface))
    }

    /// Cached raw value of `key`, `None` if absent.
    pub fn cached_value<K: PropertyKey>(&self, key: K) -> Result<Option<Value>> {
        self.manager.with_tree(|t| {
            t.get_interface(&self.path, self.interface)
                .map(|props| props.get(key.name()).cloned())
        })
    }

    /// Cached value of a required property.
    pub fn cached<T: FromValue, K: PropertyKey>(&self, key: K) -> Result<T> {
        match self.cached_value(key)? {
            Some(value) => T::from_value(&value),
            None => Err(Error::not_found(format!(
                "{}.{} on {}",
                self.interface,
                key.name(),
                self.path
            ))),
        }
    }

    /// Cached value of an optional property, `None` when the daemon left it
    /// out.
    pub fn cached_optional<T: FromValue, K: PropertyKey>(&self, key: K) -> Result<Option<T>> {
        self.cached_value(key)?
            .map(|value| T::from_value(&value))
            .transpose()
    }

    /// Calls `member` on this interface.
    pub async fn call(&self, member: &str, signature: &str, body: Vec<Value>) -> Result<Message> {
        self.manager
            .call(&self.path, self.interface, member, signature, body)
            .await
    }

    /// Fetches `key` from the daemon, bypassing the cache.
    pub async fn get_property<T: FromValue, K: PropertyKey>(&self, key: K) -> Result<T> {
        let value = self
            .manager
            .get_property(&self.path, self.interface, key.name())
            .await?;
        T::from_value(&value)
    }

    pub async fn get_all_properties(&self) -> Result<PropertyMap> {
        self.manager
            .get_all_properties(&self.path, self.interface)
            .await
    }

    /// Writes `key` on the daemon. The cache follows once the daemon
    /// announces the change.
    pub async fn set_property<K: PropertyKey>(
        &self,
        key: K,
        value: Value,
        signature: &str,
    ) -> Result<()> {
        self.manager
            .set_property(&self.path, self.interface, key.name(), value, signature)
            .await
    }
}

/// A typed entity bound to one bus interface.
pub trait Interface: Sized {
    const NAME: &'static str;

    fn from_proxy(proxy: Proxy) -> Self;

    fn proxy(&self) -> &Proxy;

    fn new(manager: Arc<Manager>, path: &str) -> Self {
        Self::from_proxy(Proxy::new(manager, path, Self::NAME))
    }

    fn path(&self) -> &str {
        self.proxy().path()
    }
}
