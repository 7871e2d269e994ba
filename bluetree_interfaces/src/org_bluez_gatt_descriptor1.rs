//! `org.bluez.GattDescriptor1`

use bluetree::{ErrorKind, FromValue, Interface, Proxy, Result, Value};

use crate::io_options;

pub const GATT_DESCRIPTOR_INTERFACE: &str = "org.bluez.GattDescriptor1";

properties! {
    pub enum GattDescriptor1Property {
        Uuid = "UUID",
        Characteristic = "Characteristic",
        Value = "Value" (optional),
        Flags = "Flags" (optional),
        Handle = "Handle" (optional),
    }
}

members! {
    pub enum GattDescriptor1Member {
        ReadValue = "ReadValue",
        WriteValue = "WriteValue",
    }
}

#[derive(Debug, Clone)]
pub struct GattDescriptor {
    proxy: Proxy,
}

impl Interface for GattDescriptor {
    const NAME: &'static str = GATT_DESCRIPTOR_INTERFACE;

    fn from_proxy(proxy: Proxy) -> Self {
        GattDescriptor { proxy }
    }

    fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

impl GattDescriptor {
    pub fn uuid(&self) -> Result<String> {
        self.proxy.cached(GattDescriptor1Property::Uuid)
    }

    /// Object path of the owning characteristic.
    pub fn characteristic(&self) -> Result<String> {
        self.proxy.cached(GattDescriptor1Property::Characteristic)
    }

    pub fn value(&self) -> Result<Option<Vec<u8>>> {
        self.proxy.cached_optional(GattDescriptor1Property::Value)
    }

    pub fn flags(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(GattDescriptor1Property::Flags)?
            .unwrap_or_default())
    }

    pub fn handle(&self) -> Result<Option<u16>> {
        self.proxy.cached_optional(GattDescriptor1Property::Handle)
    }

    pub async fn get_value(&self) -> Result<Vec<u8>> {
        self.proxy.get_property(GattDescriptor1Property::Value).await
    }

    pub async fn read_value(&self, offset: Option<u16>) -> Result<Vec<u8>> {
        let codec = self.proxy.manager().client().codec();
        let options = io_options(codec.as_ref(), offset, None)?;
        let reply = self
            .proxy
            .call(GattDescriptor1Member::ReadValue.as_str(), "a{sv}", vec![options])
            .await?;
        match reply.body.first() {
            Some(value) => Vec::<u8>::from_value(value),
            None => Err(ErrorKind::Decode("empty ReadValue reply".into()).into()),
        }
    }

    pub async fn write_value(
        &self,
        value: &[u8],
        offset: Option<u16>,
        prepare_authorize: Option<bool>,
    ) -> Result<usize> {
        let codec = self.proxy.manager().client().codec();
        let options = io_options(codec.as_ref(), offset, prepare_authorize)?;
        self.proxy
            .call(
                GattDescriptor1Member::WriteValue.as_str(),
                "aya{sv}",
                vec![Value::Bytes(value.to_vec()), options],
            )
            .await?;
        Ok(value.len())
    }
}
