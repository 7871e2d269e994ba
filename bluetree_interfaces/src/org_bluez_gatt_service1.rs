//! `org.bluez.GattService1`

use bluetree::{Interface, Proxy, Result};

use crate::org_bluez_gatt_characteristic1::{GattCharacteristic, GATT_CHARACTERISTIC_INTERFACE};

pub const GATT_SERVICE_INTERFACE: &str = "org.bluez.GattService1";

properties! {
    pub enum GattService1Property {
        Uuid = "UUID",
        Primary = "Primary",
        Device = "Device",
        Includes = "Includes" (optional),
        Handle = "Handle" (optional),
    }
}

#[derive(Debug, Clone)]
pub struct GattService {
    proxy: Proxy,
}

impl Interface for GattService {
    const NAME: &'static str = GATT_SERVICE_INTERFACE;

    fn from_proxy(proxy: Proxy) -> Self {
        GattService { proxy }
    }

    fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

impl GattService {
    pub fn uuid(&self) -> Result<String> {
        self.proxy.cached(GattService1Property::Uuid)
    }

    pub fn primary(&self) -> Result<bool> {
        self.proxy.cached(GattService1Property::Primary)
    }

    /// Object path of the owning device.
    pub fn device(&self) -> Result<String> {
        self.proxy.cached(GattService1Property::Device)
    }

    /// Object paths of included services.
    pub fn includes(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(GattService1Property::Includes)?
            .unwrap_or_default())
    }

    pub fn handle(&self) -> Result<Option<u16>> {
        self.proxy.cached_optional(GattService1Property::Handle)
    }

    /// Cached characteristics below this service, in path order.
    pub fn characteristics(&self) -> Vec<GattCharacteristic> {
        let manager = self.proxy.manager();
        manager
            .with_tree(|t| t.get_all_interfaces(GATT_CHARACTERISTIC_INTERFACE, Some(self.path())))
            .into_iter()
            .map(|(path, _)| GattCharacteristic::new(manager.clone(), &path))
            .collect()
    }
}
