//! `org.bluez.GattCharacteristic1`

use bluetree::{Error, ErrorKind, FromValue, Interface, Message, Proxy, Result, Value};

use crate::io_options;

pub const GATT_CHARACTERISTIC_INTERFACE: &str = "org.bluez.GattCharacteristic1";

properties! {
    pub enum GattCharacteristic1Property {
        Uuid = "UUID",
        Service = "Service",
        Value = "Value" (optional),
        WriteAcquired = "WriteAcquired" (optional),
        NotifyAcquired = "NotifyAcquired" (optional),
        Notifying = "Notifying" (optional),
        Flags = "Flags" (optional),
        Handle = "Handle" (optional),
        Mtu = "MTU" (optional),
    }
}

members! {
    pub enum GattCharacteristic1Member {
        ReadValue = "ReadValue",
        WriteValue = "WriteValue",
        AcquireWrite = "AcquireWrite",
        AcquireNotify = "AcquireNotify",
        StartNotify = "StartNotify",
        StopNotify = "StopNotify",
    }
}

#[derive(Debug, Clone)]
pub struct GattCharacteristic {
    proxy: Proxy,
}

impl Interface for GattCharacteristic {
    const NAME: &'static str = GATT_CHARACTERISTIC_INTERFACE;

    fn from_proxy(proxy: Proxy) -> Self {
        GattCharacteristic { proxy }
    }

    fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

impl GattCharacteristic {
    pub fn uuid(&self) -> Result<String> {
        self.proxy.cached(GattCharacteristic1Property::Uuid)
    }

    /// Object path of the owning service.
    pub fn service(&self) -> Result<String> {
        self.proxy.cached(GattCharacteristic1Property::Service)
    }

    /// Last value the daemon cached for this characteristic.
    pub fn value(&self) -> Result<Option<Vec<u8>>> {
        self.proxy.cached_optional(GattCharacteristic1Property::Value)
    }

    pub fn write_acquired(&self) -> Result<Option<bool>> {
        self.proxy
            .cached_optional(GattCharacteristic1Property::WriteAcquired)
    }

    pub fn notify_acquired(&self) -> Result<Option<bool>> {
        self.proxy
            .cached_optional(GattCharacteristic1Property::NotifyAcquired)
    }

    pub fn notifying(&self) -> Result<bool> {
        Ok(self
            .proxy
            .cached_optional(GattCharacteristic1Property::Notifying)?
            .unwrap_or(false))
    }

    pub fn flags(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(GattCharacteristic1Property::Flags)?
            .unwrap_or_default())
    }

    pub fn handle(&self) -> Result<Option<u16>> {
        self.proxy.cached_optional(GattCharacteristic1Property::Handle)
    }

    pub fn mtu(&self) -> Result<Option<u16>> {
        self.proxy.cached_optional(GattCharacteristic1Property::Mtu)
    }

    pub async fn get_value(&self) -> Result<Vec<u8>> {
        self.proxy
            .get_property(GattCharacteristic1Property::Value)
            .await
    }

    pub async fn get_notifying(&self) -> Result<bool> {
        self.proxy
            .get_property(GattCharacteristic1Property::Notifying)
            .await
    }

    /// Issues a GATT read.
    ///
    /// # Arguments
    ///
    /// * `offset` - byte offset into the value, `None` for the start
    ///
    /// # Returns
    ///
    /// The bytes the remote device returned.
    pub async fn read_value(&self, offset: Option<u16>) -> Result<Vec<u8>> {
        let codec = self.proxy.manager().client().codec();
        let options = io_options(codec.as_ref(), offset, None)?;
        let reply = self
            .proxy
            .call(
                GattCharacteristic1Member::ReadValue.as_str(),
                "a{sv}",
                vec![options],
            )
            .await?;
        match reply.body.first() {
            Some(value) => Vec::<u8>::from_value(value),
            None => Err(ErrorKind::Decode("empty ReadValue reply".into()).into()),
        }
    }

    /// Issues a GATT write and returns the number of bytes written.
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
                GattCharacteristic1Member::WriteValue.as_str(),
                "aya{sv}",
                vec![Value::Bytes(value.to_vec()), options],
            )
            .await?;
        Ok(value.len())
    }

    /// Acquires a socket for writing without response.
    ///
    /// # Returns
    ///
    /// The file descriptor and the negotiated MTU.
    pub async fn acquire_write(&self) -> Result<(i32, u16)> {
        self.acquire(GattCharacteristic1Member::AcquireWrite).await
    }

    /// Acquires a socket delivering notifications.
    pub async fn acquire_notify(&self) -> Result<(i32, u16)> {
        self.acquire(GattCharacteristic1Member::AcquireNotify).await
    }

    pub async fn start_notify(&self) -> Result<()> {
        self.proxy
            .call(
                GattCharacteristic1Member::StartNotify.as_str(),
                "",
                Vec::new(),
            )
            .await?;
        Ok(())
    }

    pub async fn stop_notify(&self) -> Result<()> {
        self.proxy
            .call(
                GattCharacteristic1Member::StopNotify.as_str(),
                "",
                Vec::new(),
            )
            .await?;
        Ok(())
    }

    async fn acquire(&self, member: GattCharacteristic1Member) -> Result<(i32, u16)> {
        let reply = self
            .proxy
            .call(member.as_str(), "a{sv}", vec![Value::Dict(Vec::new())])
            .await?;
        acquired_socket(&reply, member)
    }
}

/// Resolves the `(h, q)` reply of the acquire methods.
fn acquired_socket(reply: &Message, member: GattCharacteristic1Member) -> Result<(i32, u16)> {
    let malformed = || -> Error { ErrorKind::Decode(format!("{} reply", member.as_str())).into() };

    let index = match reply.body.first().map(Value::inner) {
        Some(Value::UnixFd(index)) => *index as usize,
        _ => return Err(malformed()),
    };
    let fd = *reply.unix_fds.get(index).ok_or_else(malformed)?;
    let mtu = u16::from_value(reply.body.get(1).ok_or_else(malformed)?)?;
    Ok((fd, mtu))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> Message {
        Message::method_call(
            "org.bluez",
            "/org/bluez/hci0/dev_AA/service0010/char0011",
            GATT_CHARACTERISTIC_INTERFACE,
            "AcquireNotify",
        )
    }

    #[test]
    fn test_acquired_socket() {
        let reply = Message::method_return(&call())
            .with_signature("hq")
            .with_body(vec![Value::UnixFd(1), Value::UInt16(185)])
            .with_unix_fds(vec![7, 9]);
        assert_eq!(
            acquired_socket(&reply, GattCharacteristic1Member::AcquireNotify).unwrap(),
            (9, 185)
        );
    }

    #[test]
    fn test_acquired_socket_without_fd() {
        let reply = Message::method_return(&call())
            .with_signature("hq")
            .with_body(vec![Value::UnixFd(0), Value::UInt16(23)]);
        let e = acquired_socket(&reply, GattCharacteristic1Member::AcquireNotify).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Decode(_)));
    }
}
