//! `org.bluez.Device1` and `org.bluez.Battery1`

use std::collections::BTreeMap;

use bluetree::{Error, ErrorKind, Interface, PropertyKey, Proxy, Result, Value};
use tracing::debug;

use crate::org_bluez_gatt_characteristic1::{
    GattCharacteristic, GattCharacteristic1Property, GATT_CHARACTERISTIC_INTERFACE,
};

pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";
pub const BATTERY_INTERFACE: &str = "org.bluez.Battery1";

/// The GATT Battery Level characteristic, served by BlueZ through
/// `org.bluez.Battery1` instead of a characteristic object.
pub const BATTERY_LEVEL_UUID: &str = "00002a19-0000-1000-8000-00805f9b34fb";

properties! {
    pub enum Device1Property {
        Address = "Address",
        AddressType = "AddressType" (optional),
        Name = "Name" (optional),
        Icon = "Icon" (optional),
        Class = "Class" (optional),
        Appearance = "Appearance" (optional),
        Uuids = "UUIDs" (optional),
        Paired = "Paired",
        Bonded = "Bonded" (optional),
        Connected = "Connected",
        Trusted = "Trusted",
        Blocked = "Blocked",
        WakeAllowed = "WakeAllowed" (optional),
        Alias = "Alias" (optional),
        Adapter = "Adapter",
        LegacyPairing = "LegacyPairing",
        Modalias = "Modalias" (optional),
        Rssi = "RSSI" (optional),
        TxPower = "TxPower" (optional),
        ManufacturerData = "ManufacturerData" (optional),
        ServiceData = "ServiceData" (optional),
        ServicesResolved = "ServicesResolved" (optional),
        AdvertisingFlags = "AdvertisingFlags" (optional),
        AdvertisingData = "AdvertisingData" (optional),
    }
}

properties! {
    pub enum Battery1Property {
        Percentage = "Percentage" (optional),
    }
}

members! {
    pub enum Device1Member {
        Connect = "Connect",
        Disconnect = "Disconnect",
        ConnectProfile = "ConnectProfile",
        DisconnectProfile = "DisconnectProfile",
        Pair = "Pair",
        CancelPairing = "CancelPairing",
    }
}

/// A remote device known to an adapter, e.g. `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`.
#[derive(Debug, Clone)]
pub struct Device {
    proxy: Proxy,
}

impl Interface for Device {
    const NAME: &'static str = DEVICE_INTERFACE;

    fn from_proxy(proxy: Proxy) -> Self {
        Device { proxy }
    }

    fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

impl Device {
    pub fn address(&self) -> Result<String> {
        self.proxy.cached(Device1Property::Address)
    }

    pub fn address_type(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Device1Property::AddressType)
    }

    pub fn name(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Device1Property::Name)
    }

    pub fn icon(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Device1Property::Icon)
    }

    pub fn class(&self) -> Result<Option<u32>> {
        self.proxy.cached_optional(Device1Property::Class)
    }

    pub fn appearance(&self) -> Result<Option<u16>> {
        self.proxy.cached_optional(Device1Property::Appearance)
    }

    pub fn uuids(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(Device1Property::Uuids)?
            .unwrap_or_default())
    }

    pub fn paired(&self) -> Result<bool> {
        self.proxy.cached(Device1Property::Paired)
    }

    pub fn bonded(&self) -> Result<Option<bool>> {
        self.proxy.cached_optional(Device1Property::Bonded)
    }

    pub fn connected(&self) -> Result<bool> {
        self.proxy.cached(Device1Property::Connected)
    }

    pub fn trusted(&self) -> Result<bool> {
        self.proxy.cached(Device1Property::Trusted)
    }

    pub fn blocked(&self) -> Result<bool> {
        self.proxy.cached(Device1Property::Blocked)
    }

    pub fn wake_allowed(&self) -> Result<Option<bool>> {
        self.proxy.cached_optional(Device1Property::WakeAllowed)
    }

    pub fn alias(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Device1Property::Alias)
    }

    /// Object path of the adapter the device belongs to.
    pub fn adapter(&self) -> Result<String> {
        self.proxy.cached(Device1Property::Adapter)
    }

    pub fn legacy_pairing(&self) -> Result<bool> {
        self.proxy.cached(Device1Property::LegacyPairing)
    }

    pub fn modalias(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Device1Property::Modalias)
    }

    /// Signal strength of the last advertisement, absent when the device is
    /// not in range or connected.
    pub fn rssi(&self) -> Result<Option<i16>> {
        self.proxy.cached_optional(Device1Property::Rssi)
    }

    pub fn tx_power(&self) -> Result<Option<i16>> {
        self.proxy.cached_optional(Device1Property::TxPower)
    }

    /// Manufacturer specific advertisement payloads keyed by company id.
    pub fn manufacturer_data(&self) -> Result<BTreeMap<u16, Vec<u8>>> {
        Ok(self
            .proxy
            .cached_optional(Device1Property::ManufacturerData)?
            .unwrap_or_default())
    }

    /// Service advertisement payloads keyed by service UUID.
    pub fn service_data(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        Ok(self
            .proxy
            .cached_optional(Device1Property::ServiceData)?
            .unwrap_or_default())
    }

    pub fn services_resolved(&self) -> Result<bool> {
        Ok(self
            .proxy
            .cached_optional(Device1Property::ServicesResolved)?
            .unwrap_or(false))
    }

    pub fn advertising_flags(&self) -> Result<Vec<u8>> {
        Ok(self
            .proxy
            .cached_optional(Device1Property::AdvertisingFlags)?
            .unwrap_or_default())
    }

    pub fn advertising_data(&self) -> Result<BTreeMap<u8, Vec<u8>>> {
        Ok(self
            .proxy
            .cached_optional(Device1Property::AdvertisingData)?
            .unwrap_or_default())
    }

    /// Cached battery level in percent, `None` without `org.bluez.Battery1`.
    pub fn battery_level(&self) -> Result<Option<u8>> {
        let battery = self.battery();
        if !battery.exists() {
            return Ok(None);
        }
        battery.cached_optional(Battery1Property::Percentage)
    }

    /// Reads the battery level from the daemon.
    pub async fn read_battery(&self) -> Result<u8> {
        self.battery()
            .get_property(Battery1Property::Percentage)
            .await
    }

    pub async fn get_connected(&self) -> Result<bool> {
        self.proxy.get_property(Device1Property::Connected).await
    }

    pub async fn get_rssi(&self) -> Result<i16> {
        self.proxy.get_property(Device1Property::Rssi).await
    }

    pub async fn set_trusted(&self, trusted: bool) -> Result<()> {
        self.proxy
            .set_property(Device1Property::Trusted, trusted.into(), "b")
            .await
    }

    pub async fn set_blocked(&self, blocked: bool) -> Result<()> {
        self.proxy
            .set_property(Device1Property::Blocked, blocked.into(), "b")
            .await
    }

    pub async fn set_alias(&self, alias: &str) -> Result<()> {
        self.proxy
            .set_property(Device1Property::Alias, alias.into(), "s")
            .await
    }

    pub async fn connect(&self) -> Result<()> {
        self.invoke(Device1Member::Connect, "", Vec::new()).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.invoke(Device1Member::Disconnect, "", Vec::new()).await
    }

    pub async fn connect_profile(&self, uuid: &str) -> Result<()> {
        self.invoke(Device1Member::ConnectProfile, "s", vec![uuid.into()])
            .await
    }

    pub async fn disconnect_profile(&self, uuid: &str) -> Result<()> {
        self.invoke(Device1Member::DisconnectProfile, "s", vec![uuid.into()])
            .await
    }

    pub async fn pair(&self) -> Result<()> {
        self.invoke(Device1Member::Pair, "", Vec::new()).await
    }

    pub async fn cancel_pairing(&self) -> Result<()> {
        self.invoke(Device1Member::CancelPairing, "", Vec::new())
            .await
    }

    /// Finds the cached characteristic with `uuid` below this device.
    ///
    /// UUIDs compare case-insensitively. A characteristic only shows up once
    /// the daemon has resolved the device's services.
    pub fn characteristic(&self, uuid: &str) -> Result<GattCharacteristic> {
        let key = GattCharacteristic1Property::Uuid.name();
        let found = self.proxy.manager().with_tree(|t| {
            t.get_all_interfaces(GATT_CHARACTERISTIC_INTERFACE, Some(self.path()))
                .into_iter()
                .find(|(_, props)| {
                    props
                        .get(key)
                        .and_then(Value::as_str)
                        .is_some_and(|u| u.eq_ignore_ascii_case(uuid))
                })
                .map(|(path, _)| path)
        });
        match found {
            Some(path) => Ok(GattCharacteristic::new(self.proxy.manager().clone(), &path)),
            None => Err(Error::new(ErrorKind::NotFound(format!(
                "characteristic {} on {}",
                uuid,
                self.path()
            )))),
        }
    }

    /// Reads the characteristic with `uuid`.
    ///
    /// The battery level is answered from `org.bluez.Battery1` when the device
    /// exposes it, since BlueZ claims that characteristic for itself.
    pub async fn read(&self, uuid: &str, offset: Option<u16>) -> Result<Vec<u8>> {
        if uuid.eq_ignore_ascii_case(BATTERY_LEVEL_UUID) && self.battery().exists() {
            return Ok(vec![self.read_battery().await?]);
        }
        self.characteristic(uuid)?.read_value(offset).await
    }

    /// Writes `value` to the characteristic with `uuid`.
    pub async fn write(
        &self,
        uuid: &str,
        value: &[u8],
        offset: Option<u16>,
        prepare_authorize: Option<bool>,
    ) -> Result<usize> {
        self.characteristic(uuid)?
            .write_value(value, offset, prepare_authorize)
            .await
    }

    /// Enables notifications on the characteristic with `uuid`.
    ///
    /// Nothing is sent when the cache already reports it notifying, unless
    /// `always` is set.
    pub async fn start_notify(&self, uuid: &str, always: bool) -> Result<()> {
        let characteristic = self.characteristic(uuid)?;
        if !always && characteristic.notifying()? {
            debug!(path = characteristic.path(), "already notifying");
            return Ok(());
        }
        characteristic.start_notify().await
    }

    /// Disables notifications, skipped when the cache reports them off.
    pub async fn stop_notify(&self, uuid: &str, always: bool) -> Result<()> {
        let characteristic = self.characteristic(uuid)?;
        if !always && !characteristic.notifying()? {
            debug!(path = characteristic.path(), "not notifying");
            return Ok(());
        }
        characteristic.stop_notify().await
    }

    fn battery(&self) -> Proxy {
        Proxy::new(self.proxy.manager().clone(), self.path(), BATTERY_INTERFACE)
    }

    async fn invoke(&self, member: Device1Member, signature: &str, body: Vec<Value>) -> Result<()> {
        self.proxy.call(member.as_str(), signature, body).await?;
        Ok(())
    }
}
