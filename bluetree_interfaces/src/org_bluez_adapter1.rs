//! `org.bluez.Adapter1`

use std::collections::BTreeMap;

use bluetree::{FromValue, Interface, Proxy, Result, Value};
use tracing::warn;

pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";

properties! {
    pub enum Adapter1Property {
        Address = "Address",
        AddressType = "AddressType",
        Name = "Name",
        Alias = "Alias" (optional),
        Class = "Class" (optional),
        Powered = "Powered",
        PowerState = "PowerState" (optional),
        Discoverable = "Discoverable",
        Pairable = "Pairable",
        PairableTimeout = "PairableTimeout",
        DiscoverableTimeout = "DiscoverableTimeout",
        Discovering = "Discovering",
        Uuids = "UUIDs" (optional),
        Modalias = "Modalias" (optional),
        Roles = "Roles" (optional),
        ExperimentalFeatures = "ExperimentalFeatures" (optional),
    }
}

members! {
    pub enum Adapter1Member {
        StartDiscovery = "StartDiscovery",
        StopDiscovery = "StopDiscovery",
        RemoveDevice = "RemoveDevice",
        SetDiscoveryFilter = "SetDiscoveryFilter",
        GetDiscoveryFilters = "GetDiscoveryFilters",
        ConnectDevice = "ConnectDevice",
    }
}

/// Signature of each key `SetDiscoveryFilter` understands.
fn filter_signature(key: &str) -> Option<&'static str> {
    match key {
        "UUIDs" => Some("as"),
        "RSSI" => Some("n"),
        "Pathloss" => Some("q"),
        "Transport" => Some("s"),
        "DuplicateData" => Some("b"),
        "Discoverable" => Some("b"),
        "Pattern" => Some("s"),
        _ => None,
    }
}

/// Coerces a loosely typed filter value to the exact wire type of `signature`.
fn filter_value(value: &Value, signature: &str) -> Result<Value> {
    Ok(match signature {
        "as" => Vec::<String>::from_value(value)?.into(),
        "n" => i16::from_value(value)?.into(),
        "q" => u16::from_value(value)?.into(),
        "b" => bool::from_value(value)?.into(),
        _ => String::from_value(value)?.into(),
    })
}

/// A local Bluetooth controller, e.g. `/org/bluez/hci0`.
#[derive(Debug, Clone)]
pub struct Adapter {
    proxy: Proxy,
}

impl Interface for Adapter {
    const NAME: &'static str = ADAPTER_INTERFACE;

    fn from_proxy(proxy: Proxy) -> Self {
        Adapter { proxy }
    }

    fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

impl Adapter {
    /// `hci0` for `/org/bluez/hci0`.
    pub fn name(&self) -> &str {
        self.proxy.short_name()
    }

    pub fn address(&self) -> Result<String> {
        self.proxy.cached(Adapter1Property::Address)
    }

    pub fn address_type(&self) -> Result<String> {
        self.proxy.cached(Adapter1Property::AddressType)
    }

    /// The system name of the controller.
    pub fn system_name(&self) -> Result<String> {
        self.proxy.cached(Adapter1Property::Name)
    }

    pub fn alias(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Adapter1Property::Alias)
    }

    pub fn class(&self) -> Result<Option<u32>> {
        self.proxy.cached_optional(Adapter1Property::Class)
    }

    pub fn powered(&self) -> Result<bool> {
        self.proxy.cached(Adapter1Property::Powered)
    }

    pub fn power_state(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Adapter1Property::PowerState)
    }

    pub fn discoverable(&self) -> Result<bool> {
        self.proxy.cached(Adapter1Property::Discoverable)
    }

    pub fn pairable(&self) -> Result<bool> {
        self.proxy.cached(Adapter1Property::Pairable)
    }

    pub fn pairable_timeout(&self) -> Result<u32> {
        self.proxy.cached(Adapter1Property::PairableTimeout)
    }

    pub fn discoverable_timeout(&self) -> Result<u32> {
        self.proxy.cached(Adapter1Property::DiscoverableTimeout)
    }

    pub fn discovering(&self) -> Result<bool> {
        self.proxy.cached(Adapter1Property::Discovering)
    }

    pub fn uuids(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(Adapter1Property::Uuids)?
            .unwrap_or_default())
    }

    pub fn modalias(&self) -> Result<Option<String>> {
        self.proxy.cached_optional(Adapter1Property::Modalias)
    }

    pub fn roles(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(Adapter1Property::Roles)?
            .unwrap_or_default())
    }

    pub fn experimental_features(&self) -> Result<Vec<String>> {
        Ok(self
            .proxy
            .cached_optional(Adapter1Property::ExperimentalFeatures)?
            .unwrap_or_default())
    }

    /// Reads `Powered` from the daemon instead of the cache.
    pub async fn get_powered(&self) -> Result<bool> {
        self.proxy.get_property(Adapter1Property::Powered).await
    }

    pub async fn get_discovering(&self) -> Result<bool> {
        self.proxy.get_property(Adapter1Property::Discovering).await
    }

    pub async fn get_alias(&self) -> Result<String> {
        self.proxy.get_property(Adapter1Property::Alias).await
    }

    pub async fn set_powered(&self, powered: bool) -> Result<()> {
        self.proxy
            .set_property(Adapter1Property::Powered, powered.into(), "b")
            .await
    }

    pub async fn set_alias(&self, alias: &str) -> Result<()> {
        self.proxy
            .set_property(Adapter1Property::Alias, alias.into(), "s")
            .await
    }

    pub async fn set_discoverable(&self, discoverable: bool) -> Result<()> {
        self.proxy
            .set_property(Adapter1Property::Discoverable, discoverable.into(), "b")
            .await
    }

    pub async fn set_pairable(&self, pairable: bool) -> Result<()> {
        self.proxy
            .set_property(Adapter1Property::Pairable, pairable.into(), "b")
            .await
    }

    pub async fn set_pairable_timeout(&self, seconds: u32) -> Result<()> {
        self.proxy
            .set_property(Adapter1Property::PairableTimeout, seconds.into(), "u")
            .await
    }

    pub async fn set_discoverable_timeout(&self, seconds: u32) -> Result<()> {
        self.proxy
            .set_property(Adapter1Property::DiscoverableTimeout, seconds.into(), "u")
            .await
    }

    pub async fn start_discovery(&self) -> Result<()> {
        self.invoke(Adapter1Member::StartDiscovery, "", Vec::new())
            .await
    }

    pub async fn stop_discovery(&self) -> Result<()> {
        self.invoke(Adapter1Member::StopDiscovery, "", Vec::new())
            .await
    }

    /// Removes the device object at `device_path` along with its pairing.
    pub async fn remove_device(&self, device_path: &str) -> Result<()> {
        self.invoke(
            Adapter1Member::RemoveDevice,
            "o",
            vec![Value::object_path(device_path)],
        )
        .await
    }

    /// Sets the discovery filter.
    ///
    /// # Arguments
    ///
    /// * `filter` - filter keys with plain values, e.g. `RSSI` as any integer
    ///   that fits in 16 bits
    ///
    /// `Transport` defaults to `le`. Keys the daemon does not define are
    /// skipped with a warning.
    pub async fn set_discovery_filter(&self, filter: &BTreeMap<String, Value>) -> Result<()> {
        let codec = self.proxy.manager().client().codec().clone();
        let mut entries = BTreeMap::new();
        entries.insert(
            "Transport".to_string(),
            codec.encode(Value::from("le"), "s")?,
        );
        for (key, value) in filter {
            let Some(signature) = filter_signature(key) else {
                warn!(key = key.as_str(), "unknown discovery filter key skipped");
                continue;
            };
            let encoded = codec.encode(filter_value(value, signature)?, signature)?;
            entries.insert(key.clone(), encoded);
        }
        self.invoke(
            Adapter1Member::SetDiscoveryFilter,
            "a{sv}",
            vec![Value::dict(entries)],
        )
        .await
    }

    /// Clears the discovery filter.
    pub async fn reset_discovery_filter(&self) -> Result<()> {
        self.invoke(
            Adapter1Member::SetDiscoveryFilter,
            "a{sv}",
            vec![Value::Dict(Vec::new())],
        )
        .await
    }

    /// Filter keys the daemon supports.
    pub async fn get_discovery_filters(&self) -> Result<Vec<String>> {
        let reply = self
            .proxy
            .call(Adapter1Member::GetDiscoveryFilters.as_str(), "", Vec::new())
            .await?;
        match reply.body.first() {
            Some(filters) => Vec::<String>::from_value(filters),
            None => Ok(Vec::new()),
        }
    }

    /// Connects a device that was not discovered, by address.
    pub async fn connect_device(&self, address: &str, address_type: &str) -> Result<()> {
        let codec = self.proxy.manager().client().codec().clone();
        let properties = Value::dict([
            ("Address", codec.encode(address.into(), "s")?),
            ("AddressType", codec.encode(address_type.into(), "s")?),
        ]);
        self.invoke(Adapter1Member::ConnectDevice, "a{sv}", vec![properties])
            .await
    }

    async fn invoke(&self, member: Adapter1Member, signature: &str, body: Vec<Value>) -> Result<()> {
        self.proxy.call(member.as_str(), signature, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_coercion() {
        assert_eq!(
            filter_value(&Value::Int64(-70), "n").unwrap(),
            Value::Int16(-70)
        );
        assert_eq!(filter_value(&Value::Int64(3), "q").unwrap(), Value::UInt16(3));
        assert!(filter_value(&Value::Int64(-70_000), "n").is_err());
        assert_eq!(
            filter_value(
                &Value::Array(vec![Value::from("180f")]),
                filter_signature("UUIDs").unwrap()
            )
            .unwrap(),
            Value::Array(vec![Value::from("180f")])
        );
        assert_eq!(filter_signature("Colour"), None);
    }
}
