//! BlueZ session facade.

use std::sync::{Arc, LazyLock};

use bluetree::{
    Bus, BusEvent, Codec, Config, Interface, Manager, Result, SinkId, SinkResult, Value,
};
use regex::Regex;
use tracing::{info, warn};

use crate::org_bluez_adapter1::{Adapter, ADAPTER_INTERFACE};
use crate::org_bluez_device1::{Device, DEVICE_INTERFACE};

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})$").expect("static regex")
});

/// Whether `value` looks like a Bluetooth address, `:` or `-` separated.
pub fn is_address(value: &str) -> bool {
    ADDRESS_PATTERN.is_match(value)
}

/// Joins `name` below `parent` without doubling the separator under `/`.
fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

fn normalize_address(address: &str) -> String {
    address.replace('-', ":").to_ascii_uppercase()
}

/// A [`Manager`] bound to the BlueZ daemon, watching everything below the
/// configured root path.
pub struct BluezClient {
    manager: Arc<Manager>,
    root_path: String,
}

impl BluezClient {
    pub fn new(bus: Arc<dyn Bus>, codec: Arc<dyn Codec>) -> Self {
        Self::with_config(&Config::default(), bus, codec)
    }

    pub fn with_config(config: &Config, bus: Arc<dyn Bus>, codec: Arc<dyn Codec>) -> Self {
        BluezClient {
            manager: Arc::new(Manager::from_config(config, bus, codec)),
            root_path: config.root_path.clone(),
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Connects, loads the object tree and starts following its signals.
    ///
    /// If the watch cannot be set up the session is closed again.
    pub async fn connect(&self) -> Result<()> {
        self.manager.connect().await?;
        if let Err(e) = self.manager.watch(&self.root_path).await {
            if let Err(close) = self.manager.disconnect().await {
                warn!(error = %close, "disconnect after failed watch");
            }
            return Err(e);
        }
        info!(
            root = self.root_path.as_str(),
            objects = self.manager.with_tree(|t| t.list_objects().len()),
            "bluez session ready"
        );
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.manager.disconnect().await
    }

    pub fn add_event_sink<F>(&self, sink: F) -> SinkId
    where
        F: Fn(&BusEvent) -> SinkResult + Send + Sync + 'static,
    {
        self.manager.add_event_sink(sink)
    }

    pub fn remove_event_sink(&self, id: SinkId) -> bool {
        self.manager.remove_event_sink(id)
    }

    /// Every cached adapter, in path order.
    pub fn adapters(&self) -> Vec<Adapter> {
        self.paths_with(ADAPTER_INTERFACE, &self.root_path)
            .iter()
            .map(|path| Adapter::new(self.manager.clone(), path))
            .collect()
    }

    /// Looks up an adapter.
    ///
    /// # Arguments
    ///
    /// * `name` - short name such as `hci1`, `None` for the first adapter
    ///
    /// # Returns
    ///
    /// `None` if no such adapter is cached.
    pub fn get_adapter(&self, name: Option<&str>) -> Option<Adapter> {
        match name {
            None => self.adapters().into_iter().next(),
            Some(name) => {
                let path = child_path(&self.root_path, name);
                self.manager
                    .with_tree(|t| t.has_interface(&path, ADAPTER_INTERFACE))
                    .then(|| Adapter::new(self.manager.clone(), &path))
            }
        }
    }

    /// Cached devices, optionally only those of one adapter.
    pub fn devices(&self, adapter: Option<&Adapter>) -> Vec<Device> {
        let prefix = adapter.map_or(self.root_path.as_str(), |a| a.path());
        self.paths_with(DEVICE_INTERFACE, prefix)
            .iter()
            .map(|path| Device::new(self.manager.clone(), path))
            .collect()
    }

    /// Looks up a device by address, name or alias.
    ///
    /// # Arguments
    ///
    /// * `name_or_address` - an address compares case-insensitively, anything
    ///   else is matched against the names first and the aliases second
    /// * `adapter` - short name of the adapter to search, `None` for all
    ///
    /// # Returns
    ///
    /// The first match in path order, or `None`.
    pub fn get_device(&self, name_or_address: &str, adapter: Option<&str>) -> Option<Device> {
        let adapter = match adapter {
            Some(name) => Some(self.get_adapter(Some(name))?),
            None => None,
        };
        let prefix = adapter
            .as_ref()
            .map_or(self.root_path.as_str(), |a| a.path());
        let devices = self
            .manager
            .with_tree(|t| t.get_all_interfaces(DEVICE_INTERFACE, Some(prefix)));

        let string_of = |props: &bluetree::PropertyMap, key: &str| {
            props.get(key).and_then(Value::as_str).map(str::to_string)
        };

        let found = if is_address(name_or_address) {
            let wanted = normalize_address(name_or_address);
            devices.iter().find(|(_, props)| {
                string_of(props, "Address").is_some_and(|a| normalize_address(&a) == wanted)
            })
        } else {
            devices
                .iter()
                .find(|(_, props)| string_of(props, "Name").as_deref() == Some(name_or_address))
                .or_else(|| {
                    devices.iter().find(|(_, props)| {
                        string_of(props, "Alias").as_deref() == Some(name_or_address)
                    })
                })
        };

        found.map(|(path, _)| Device::new(self.manager.clone(), path))
    }

    fn paths_with(&self, interface: &str, prefix: &str) -> Vec<String> {
        self.manager.with_tree(|t| {
            t.get_all_interfaces(interface, Some(prefix))
                .into_iter()
                .map(|(path, _)| path)
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_address() {
        assert!(is_address("AA:BB:CC:DD:EE:FF"));
        assert!(is_address("aa-bb-cc-dd-ee-0f"));
        assert!(!is_address("AA:BB:CC:DD:EE"));
        assert!(!is_address("AA:BB:CC:DD:EE:FG"));
        assert!(!is_address("Keyboard"));
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("/org/bluez", "hci0"), "/org/bluez/hci0");
        assert_eq!(child_path("/", "hci0"), "/hci0");
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("aa-bb-cc-dd-ee-ff"), "AA:BB:CC:DD:EE:FF");
    }
}
