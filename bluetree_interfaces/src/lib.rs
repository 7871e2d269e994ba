//!Typed BlueZ entities on top of the [`bluetree`] object tree.
//!
//!Each `org_bluez_*` module binds one BlueZ interface: a closed enum of its
//!property names, a closed enum of its methods, and an entity type whose cached
//!readers are served from the tree while setters and methods go to the daemon.
//!
//![`BluezClient`] ties a [`bluetree::Manager`] to the `org.bluez` service and
//!offers the adapter and device lookups.

/// Declares the closed property enum of an interface.
///
/// A key followed by `(optional)` may be left out by the daemon.
macro_rules! properties {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $key:literal $(($optional:ident))?),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),*
        }

        impl bluetree::PropertyKey for $name {
            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $key),*
                }
            }

            fn is_optional(self) -> bool {
                match self {
                    $($name::$variant => properties!(@optional $($optional)?)),*
                }
            }
        }
    };
    (@optional optional) => { true };
    (@optional) => { false };
}

/// Declares the closed method enum of an interface.
macro_rules! members {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $member:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $member),*
                }
            }
        }
    };
}

pub mod client;
pub mod filters;
pub mod org_bluez_adapter1;
pub mod org_bluez_device1;
pub mod org_bluez_gatt_characteristic1;
pub mod org_bluez_gatt_descriptor1;
pub mod org_bluez_gatt_service1;

pub use crate::client::{is_address, BluezClient};
pub use crate::org_bluez_adapter1::{Adapter, Adapter1Member, Adapter1Property, ADAPTER_INTERFACE};
pub use crate::org_bluez_device1::{
    Battery1Property, Device, Device1Member, Device1Property, BATTERY_INTERFACE, DEVICE_INTERFACE,
};
pub use crate::org_bluez_gatt_characteristic1::{
    GattCharacteristic, GattCharacteristic1Member, GattCharacteristic1Property,
    GATT_CHARACTERISTIC_INTERFACE,
};
pub use crate::org_bluez_gatt_descriptor1::{
    GattDescriptor, GattDescriptor1Member, GattDescriptor1Property, GATT_DESCRIPTOR_INTERFACE,
};
pub use crate::org_bluez_gatt_service1::{
    GattService, GattService1Property, GATT_SERVICE_INTERFACE,
};

use bluetree::{Codec, Result, Value};

/// Builds the `a{sv}` options of `ReadValue` / `WriteValue`.
pub(crate) fn io_options(
    codec: &dyn Codec,
    offset: Option<u16>,
    prepare_authorize: Option<bool>,
) -> Result<Value> {
    let mut options = Vec::new();
    if let Some(offset) = offset {
        options.push(("offset", codec.encode(Value::UInt16(offset), "q")?));
    }
    if let Some(prepare) = prepare_authorize {
        options.push(("prepare-authorize", codec.encode(Value::Bool(prepare), "b")?));
    }
    Ok(Value::dict(options))
}
