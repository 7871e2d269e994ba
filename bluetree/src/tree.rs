//! The cached object tree.
//!
//! [`ObjectTree`] maps object path → interface name → property map. It never
//! holds an empty object: removing the last interface of an object removes the
//! object. Empty interfaces are kept, since only `InterfacesRemoved` takes an
//! interface away.
//!
//! Every mutation is idempotent at the key level; setting a value twice or
//! removing something absent is a no-op.

use crate::error::{Error, Result};
use crate::value::{InterfaceMap, ObjectMap, PropertyMap, Value};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ObjectTree {
    objects: ObjectMap,
}

/// Whether `path` lies at or below `prefix`, respecting path elements.
///
/// A trailing `/` on `prefix` is ignored; `/` alone matches every path.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() || path == prefix {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects(objects: ObjectMap) -> Self {
        let mut tree = ObjectTree::new();
        tree.update(objects);
        tree
    }

    /// A copy of this tree with `update` merged in.
    pub fn copy_with(&self, update: Option<ObjectMap>) -> Self {
        let mut tree = self.clone();
        if let Some(update) = update {
            tree.update(update);
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn list_objects(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    pub fn list_interfaces(&self, path: &str) -> Vec<String> {
        self.objects
            .get(path)
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_properties(&self, path: &str, interface: &str) -> Vec<String> {
        self.objects
            .get(path)
            .and_then(|o| o.get(interface))
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_object(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    pub fn has_interface(&self, path: &str, interface: &str) -> bool {
        self.objects
            .get(path)
            .is_some_and(|o| o.contains_key(interface))
    }

    pub fn get_object(&self, path: &str) -> Result<&InterfaceMap> {
        self.objects
            .get(path)
            .ok_or_else(|| Error::not_found(path))
    }

    pub fn get_interface(&self, path: &str, interface: &str) -> Result<&PropertyMap> {
        self.get_object(path)?
            .get(interface)
            .ok_or_else(|| Error::not_found(format!("{} on {}", interface, path)))
    }

    /// Fails with `NotFound` if the path, the interface or the key is absent.
    pub fn get_property(&self, path: &str, interface: &str, key: &str) -> Result<&Value> {
        self.get_interface(path, interface)?
            .get(key)
            .ok_or_else(|| Error::not_found(format!("{}.{} on {}", interface, key, path)))
    }

    pub fn get_all_properties(&self, path: &str, interface: &str) -> Result<PropertyMap> {
        self.get_interface(path, interface).cloned()
    }

    pub fn get_all_objects(&self) -> &ObjectMap {
        &self.objects
    }

    /// Properties of `interface` for every object that implements it,
    /// optionally restricted to paths at or below `prefix`.
    pub fn get_all_interfaces(
        &self,
        interface: &str,
        prefix: Option<&str>,
    ) -> Vec<(String, PropertyMap)> {
        self.objects
            .iter()
            .filter(|(path, _)| prefix.map_or(true, |p| path_has_prefix(path, p)))
            .filter_map(|(path, ifaces)| {
                ifaces
                    .get(interface)
                    .map(|props| (path.clone(), props.clone()))
            })
            .collect()
    }

    /// Replaces every interface of `path`; an empty map removes the object.
    pub fn set_object(&mut self, path: &str, interfaces: InterfaceMap) {
        if interfaces.is_empty() {
            self.objects.remove(path);
        } else {
            self.objects.insert(path.to_string(), interfaces);
        }
    }

    /// Replaces the full property set of one interface, creating the object.
    pub fn set_interface(&mut self, path: &str, interface: &str, properties: PropertyMap) {
        self.objects
            .entry(path.to_string())
            .or_default()
            .insert(interface.to_string(), properties);
    }

    pub fn set_property(&mut self, path: &str, interface: &str, key: &str, value: Value) {
        self.objects
            .entry(path.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn remove_property(&mut self, path: &str, interface: &str, key: &str) {
        if let Some(props) = self
            .objects
            .get_mut(path)
            .and_then(|o| o.get_mut(interface))
        {
            props.remove(key);
        }
    }

    pub fn remove_interface(&mut self, path: &str, interface: &str) {
        let Some(object) = self.objects.get_mut(path) else {
            return;
        };
        object.remove(interface);
        if object.is_empty() {
            self.objects.remove(path);
        }
    }

    pub fn remove_object(&mut self, path: &str) {
        self.objects.remove(path);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Merges a snapshot into the tree, object by object.
    pub fn update(&mut self, objects: ObjectMap) {
        for (path, interfaces) in objects {
            self.update_object(&path, interfaces);
        }
    }

    /// Merges interfaces into one object; properties not named are kept.
    pub fn update_object(&mut self, path: &str, interfaces: InterfaceMap) {
        for (interface, properties) in interfaces {
            self.update_interface::<&str>(path, &interface, properties, &[]);
        }
    }

    /// Applies a property delta: `invalidated` keys are removed first, then
    /// `changed` keys are set. The interface is created if missing.
    pub fn update_interface<S: AsRef<str>>(
        &mut self,
        path: &str,
        interface: &str,
        changed: PropertyMap,
        invalidated: &[S],
    ) {
        let props = self
            .objects
            .entry(path.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default();
        for key in invalidated {
            props.remove(key.as_ref());
        }
        props.extend(changed);
    }
}

fn dict_entries<'a>(value: &'a Value, what: &str) -> Result<&'a [(Value, Value)]> {
    match value.inner() {
        Value::Dict(entries) => Ok(entries),
        other => Err(Error::decode(format!("{} as {}", other.type_name(), what))),
    }
}

fn dict_key<'a>(key: &'a Value, what: &str) -> Result<&'a str> {
    key.as_str()
        .ok_or_else(|| Error::decode(format!("{} as {}", key.type_name(), what)))
}

/// Builds a [`PropertyMap`] from an `a{sv}` value, dropping variant layers.
pub fn property_map_from_value(value: &Value) -> Result<PropertyMap> {
    dict_entries(value, "property map")?
        .iter()
        .map(|(k, v)| Ok((dict_key(k, "property name")?.to_string(), v.inner().clone())))
        .collect()
}

/// Builds an [`InterfaceMap`] from an `a{sa{sv}}` value.
pub fn interface_map_from_value(value: &Value) -> Result<InterfaceMap> {
    dict_entries(value, "interface map")?
        .iter()
        .map(|(k, v)| {
            Ok((
                dict_key(k, "interface name")?.to_string(),
                property_map_from_value(v)?,
            ))
        })
        .collect()
}

/// Builds an [`ObjectMap`] from an unpacked `a{oa{sa{sv}}}` value, such as
/// the reply of `GetManagedObjects`.
pub fn object_map_from_value(value: &Value) -> Result<ObjectMap> {
    dict_entries(value, "object map")?
        .iter()
        .map(|(k, v)| {
            Ok((
                dict_key(k, "object path")?.to_string(),
                interface_map_from_value(v)?,
            ))
        })
        .collect()
}
