use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bluetree::sansio::{interfaces_added, interfaces_removed, properties_changed};
use bluetree::{
    Interface, MemoryBus, Message, StandardCodec, Value, BUS_INTERFACE, OBJECT_MANAGER_INTERFACE,
    PROPERTIES_INTERFACE,
};
use bluetree_interfaces::filters::{device_connected, device_discovered};
use bluetree_interfaces::org_bluez_device1::BATTERY_LEVEL_UUID;
use bluetree_interfaces::*;

const HCI0: &str = "/org/bluez/hci0";
const HCI1: &str = "/org/bluez/hci1";
const DEV_A: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";
const DEV_B: &str = "/org/bluez/hci1/dev_11_22_33_44_55_66";
const SERVICE: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/service0010";
const CHAR: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/service0010/char0011";
const HEART_RATE: &str = "00002a37-0000-1000-8000-00805f9b34fb";

fn props(entries: Vec<(&str, &str, Value)>) -> Value {
    Value::dict(
        entries
            .into_iter()
            .map(|(key, signature, value)| (key, Value::variant(signature, value))),
    )
}

fn adapter(powered: bool) -> Value {
    props(vec![
        ("Address", "s", "00:1A:7D:DA:71:13".into()),
        ("AddressType", "s", "public".into()),
        ("Name", "s", "host".into()),
        ("Powered", "b", powered.into()),
        ("Discoverable", "b", false.into()),
        ("Pairable", "b", true.into()),
        ("PairableTimeout", "u", 0u32.into()),
        ("DiscoverableTimeout", "u", 180u32.into()),
        ("Discovering", "b", false.into()),
    ])
}

fn device(address: &str, adapter: &str, extra: Vec<(&str, &str, Value)>) -> Value {
    let mut entries = vec![
        ("Address", "s", address.into()),
        ("Paired", "b", false.into()),
        ("Connected", "b", false.into()),
        ("Trusted", "b", false.into()),
        ("Blocked", "b", false.into()),
        ("Adapter", "o", Value::object_path(adapter)),
        ("LegacyPairing", "b", false.into()),
    ];
    entries.extend(extra);
    props(entries)
}

fn managed_objects() -> Value {
    let manufacturer = Value::Dict(vec![(
        Value::UInt16(76),
        Value::variant("ay", Value::Bytes(vec![1, 2])),
    )]);
    let objects = vec![
        (HCI0, vec![(ADAPTER_INTERFACE, adapter(false))]),
        (HCI1, vec![(ADAPTER_INTERFACE, adapter(true))]),
        (
            DEV_A,
            vec![
                (
                    DEVICE_INTERFACE,
                    device(
                        "AA:BB:CC:DD:EE:FF",
                        HCI0,
                        vec![
                            ("Name", "s", "Keyboard".into()),
                            ("Alias", "s", "Keyboard".into()),
                            ("RSSI", "n", Value::Int16(-60)),
                            ("ManufacturerData", "a{qv}", manufacturer),
                        ],
                    ),
                ),
                (BATTERY_INTERFACE, props(vec![("Percentage", "y", Value::Byte(87))])),
            ],
        ),
        (
            DEV_B,
            vec![(
                DEVICE_INTERFACE,
                device("11:22:33:44:55:66", HCI1, vec![("Alias", "s", "Speaker".into())]),
            )],
        ),
        (
            SERVICE,
            vec![(
                GATT_SERVICE_INTERFACE,
                props(vec![
                    ("UUID", "s", "0000180d-0000-1000-8000-00805f9b34fb".into()),
                    ("Primary", "b", true.into()),
                    ("Device", "o", Value::object_path(DEV_A)),
                ]),
            )],
        ),
        (
            CHAR,
            vec![(
                GATT_CHARACTERISTIC_INTERFACE,
                props(vec![
                    ("UUID", "s", HEART_RATE.into()),
                    ("Service", "o", Value::object_path(SERVICE)),
                    ("Notifying", "b", false.into()),
                    ("Flags", "as", vec!["read".to_string(), "notify".to_string()].into()),
                ]),
            )],
        ),
    ];

    Value::Dict(
        objects
            .into_iter()
            .map(|(path, ifaces)| (Value::object_path(path), Value::dict(ifaces)))
            .collect(),
    )
}

fn bluez() -> Arc<MemoryBus> {
    let bus = Arc::new(MemoryBus::new());
    let objects = managed_objects();
    bus.respond(OBJECT_MANAGER_INTERFACE, "GetManagedObjects", move |m| {
        Message::method_return(m)
            .with_signature("a{oa{sa{sv}}}")
            .with_body(vec![objects.clone()])
    });
    bus.respond(BUS_INTERFACE, "AddMatch", Message::method_return);
    bus.respond(BUS_INTERFACE, "RemoveMatch", Message::method_return);
    bus.respond(PROPERTIES_INTERFACE, "Set", Message::method_return);
    bus.respond(PROPERTIES_INTERFACE, "Get", |m| {
        Message::method_return(m)
            .with_signature("v")
            .with_body(vec![Value::variant("y", Value::Byte(90))])
    });
    for member in ["SetDiscoveryFilter", "StartDiscovery"] {
        bus.respond(ADAPTER_INTERFACE, member, Message::method_return);
    }
    bus.respond(ADAPTER_INTERFACE, "GetDiscoveryFilters", |m| {
        Message::method_return(m)
            .with_signature("as")
            .with_body(vec![vec!["UUIDs".to_string(), "RSSI".to_string()].into()])
    });
    for member in ["WriteValue", "StartNotify", "StopNotify"] {
        bus.respond(GATT_CHARACTERISTIC_INTERFACE, member, Message::method_return);
    }
    bus.respond(GATT_CHARACTERISTIC_INTERFACE, "ReadValue", |m| {
        Message::method_return(m)
            .with_signature("ay")
            .with_body(vec![Value::Bytes(vec![0x06, 0x48])])
    });
    bus.respond(GATT_CHARACTERISTIC_INTERFACE, "AcquireNotify", |m| {
        Message::method_return(m)
            .with_signature("hq")
            .with_body(vec![Value::UnixFd(0), Value::UInt16(185)])
            .with_unix_fds(vec![11])
    });
    bus
}

async fn connected(bus: &Arc<MemoryBus>) -> BluezClient {
    let client = BluezClient::new(bus.clone(), Arc::new(StandardCodec));
    client.connect().await.unwrap();
    client
}

#[tokio::test]
async fn test_connect_lists_adapters() {
    let bus = bluez();
    let client = connected(&bus).await;

    assert_eq!(bus.calls_to(BUS_INTERFACE, "AddMatch").len(), 3);
    assert_eq!(client.adapters().len(), 2);

    let first = client.get_adapter(None).unwrap();
    assert_eq!(first.name(), "hci0");
    assert_eq!(first.address().unwrap(), "00:1A:7D:DA:71:13");
    assert!(!first.powered().unwrap());
    assert_eq!(first.discoverable_timeout().unwrap(), 180);
    assert_eq!(first.alias().unwrap(), None);
    assert!(first.uuids().unwrap().is_empty());

    assert_eq!(client.get_adapter(Some("hci1")).unwrap().path(), HCI1);
    assert!(client.get_adapter(Some("hci9")).is_none());
}

#[tokio::test]
async fn test_powered_follows_signal() {
    let bus = bluez();
    let client = connected(&bus).await;
    let adapter = client.get_adapter(Some("hci0")).unwrap();
    let calls = bus.call_count();

    bus.emit(&properties_changed(
        HCI0,
        ADAPTER_INTERFACE,
        vec![("Powered", Value::variant("b", Value::Bool(true)))],
        &[],
    ));

    assert!(adapter.powered().unwrap());
    assert_eq!(bus.call_count(), calls);
}

#[tokio::test]
async fn test_device_lookup() {
    let bus = bluez();
    let client = connected(&bus).await;

    assert_eq!(client.devices(None).len(), 2);
    let hci1 = client.get_adapter(Some("hci1")).unwrap();
    assert_eq!(client.devices(Some(&hci1)).len(), 1);

    for query in ["AA:BB:CC:DD:EE:FF", "aa:bb:cc:dd:ee:ff", "aa-bb-cc-dd-ee-ff"] {
        assert_eq!(client.get_device(query, None).unwrap().path(), DEV_A);
    }
    assert_eq!(client.get_device("Keyboard", None).unwrap().path(), DEV_A);
    // No Name on DEV_B, found by alias.
    assert_eq!(client.get_device("Speaker", None).unwrap().path(), DEV_B);
    assert_eq!(
        client.get_device("Speaker", Some("hci1")).unwrap().path(),
        DEV_B
    );

    assert!(client.get_device("Keyboard", Some("hci1")).is_none());
    assert!(client.get_device("Keyboard", Some("hci9")).is_none());
    assert!(client.get_device("00:00:00:00:00:00", None).is_none());
}

#[tokio::test]
async fn test_device_readers() {
    let bus = bluez();
    let client = connected(&bus).await;
    let keyboard = client.get_device("Keyboard", None).unwrap();
    let speaker = client.get_device("Speaker", None).unwrap();

    assert_eq!(keyboard.rssi().unwrap(), Some(-60));
    assert_eq!(keyboard.manufacturer_data().unwrap()[&76], vec![1, 2]);
    assert_eq!(keyboard.battery_level().unwrap(), Some(87));
    assert_eq!(keyboard.adapter().unwrap(), HCI0);
    assert!(!keyboard.services_resolved().unwrap());
    assert!(keyboard.uuids().unwrap().is_empty());

    assert_eq!(speaker.name().unwrap(), None);
    assert_eq!(speaker.rssi().unwrap(), None);
    assert_eq!(speaker.battery_level().unwrap(), None);
}

#[tokio::test]
async fn test_device_removed() {
    let bus = bluez();
    let client = connected(&bus).await;
    let speaker = client.get_device("Speaker", None).unwrap();

    bus.emit(&interfaces_removed(DEV_B, &[DEVICE_INTERFACE]));

    assert!(client.get_device("Speaker", None).is_none());
    assert!(speaker.address().unwrap_err().is_not_found());
    assert_eq!(client.devices(None).len(), 1);
}

#[tokio::test]
async fn test_set_alias_waits_for_echo() {
    let bus = bluez();
    let client = connected(&bus).await;
    let keyboard = client.get_device("Keyboard", None).unwrap();

    keyboard.set_alias("Desk").await.unwrap();
    assert_eq!(keyboard.alias().unwrap().as_deref(), Some("Keyboard"));

    let set = &bus.calls_to(PROPERTIES_INTERFACE, "Set")[0];
    assert_eq!(set.path.as_deref(), Some(DEV_A));
    assert_eq!(
        set.body,
        vec![
            Value::from(DEVICE_INTERFACE),
            Value::from("Alias"),
            Value::variant("s", "Desk".into()),
        ]
    );

    bus.emit(&properties_changed(
        DEV_A,
        DEVICE_INTERFACE,
        vec![("Alias", Value::variant("s", "Desk".into()))],
        &[],
    ));
    assert_eq!(keyboard.alias().unwrap().as_deref(), Some("Desk"));
}

#[tokio::test]
async fn test_notify_skipped_when_cached() {
    let bus = bluez();
    let client = connected(&bus).await;
    let keyboard = client.get_device("Keyboard", None).unwrap();

    keyboard.start_notify(HEART_RATE, false).await.unwrap();
    assert_eq!(bus.calls_to(GATT_CHARACTERISTIC_INTERFACE, "StartNotify").len(), 1);

    bus.emit(&properties_changed(
        CHAR,
        GATT_CHARACTERISTIC_INTERFACE,
        vec![("Notifying", Value::variant("b", Value::Bool(true)))],
        &[],
    ));

    keyboard.start_notify(HEART_RATE, false).await.unwrap();
    assert_eq!(bus.calls_to(GATT_CHARACTERISTIC_INTERFACE, "StartNotify").len(), 1);
    keyboard.start_notify(HEART_RATE, true).await.unwrap();
    assert_eq!(bus.calls_to(GATT_CHARACTERISTIC_INTERFACE, "StartNotify").len(), 2);

    keyboard.stop_notify(HEART_RATE, false).await.unwrap();
    assert_eq!(bus.calls_to(GATT_CHARACTERISTIC_INTERFACE, "StopNotify").len(), 1);
}

#[tokio::test]
async fn test_gatt_io() {
    let bus = bluez();
    let client = connected(&bus).await;
    let keyboard = client.get_device("Keyboard", None).unwrap();

    let value = keyboard
        .read(&HEART_RATE.to_uppercase(), Some(4))
        .await
        .unwrap();
    assert_eq!(value, vec![0x06, 0x48]);
    let read = &bus.calls_to(GATT_CHARACTERISTIC_INTERFACE, "ReadValue")[0];
    assert_eq!(read.path.as_deref(), Some(CHAR));
    assert_eq!(
        read.body,
        vec![Value::dict([("offset", Value::variant("q", Value::UInt16(4)))])]
    );

    let written = keyboard
        .write(HEART_RATE, &[1, 2, 3], None, None)
        .await
        .unwrap();
    assert_eq!(written, 3);
    let write = &bus.calls_to(GATT_CHARACTERISTIC_INTERFACE, "WriteValue")[0];
    assert_eq!(write.body[0], Value::Bytes(vec![1, 2, 3]));
    assert_eq!(write.body[1], Value::Dict(Vec::new()));

    let characteristic = keyboard.characteristic(HEART_RATE).unwrap();
    assert_eq!(characteristic.acquire_notify().await.unwrap(), (11, 185));
    assert_eq!(characteristic.flags().unwrap(), vec!["read", "notify"]);

    // Battery level comes from Battery1, not a characteristic.
    assert_eq!(keyboard.read(BATTERY_LEVEL_UUID, None).await.unwrap(), vec![90]);

    let e = keyboard.read("0000ffff-0000-1000-8000-00805f9b34fb", None).await;
    assert!(e.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_gatt_service() {
    let bus = bluez();
    let client = connected(&bus).await;

    let service = GattService::new(client.manager().clone(), SERVICE);
    assert!(service.primary().unwrap());
    assert_eq!(service.device().unwrap(), DEV_A);
    let characteristics = service.characteristics();
    assert_eq!(characteristics.len(), 1);
    assert_eq!(characteristics[0].uuid().unwrap(), HEART_RATE);
    assert_eq!(characteristics[0].service().unwrap(), SERVICE);
}

#[tokio::test]
async fn test_discovery_filter() {
    let bus = bluez();
    let client = connected(&bus).await;
    let adapter = client.get_adapter(None).unwrap();

    let filter = BTreeMap::from([
        ("RSSI".to_string(), Value::Int64(-70)),
        ("UUIDs".to_string(), vec!["180d".to_string()].into()),
        ("Colour".to_string(), Value::from("blue")),
    ]);
    adapter.set_discovery_filter(&filter).await.unwrap();

    let call = &bus.calls_to(ADAPTER_INTERFACE, "SetDiscoveryFilter")[0];
    let sent = &call.body[0];
    assert_eq!(sent.get("RSSI"), Some(&Value::variant("n", Value::Int16(-70))));
    assert_eq!(sent.get("Transport"), Some(&Value::variant("s", "le".into())));
    assert_eq!(
        sent.get("UUIDs"),
        Some(&Value::variant("as", vec!["180d".to_string()].into()))
    );
    assert_eq!(sent.get("Colour"), None);

    adapter.reset_discovery_filter().await.unwrap();
    let reset = &bus.calls_to(ADAPTER_INTERFACE, "SetDiscoveryFilter")[1];
    assert_eq!(reset.body, vec![Value::Dict(Vec::new())]);

    assert_eq!(
        adapter.get_discovery_filters().await.unwrap(),
        vec!["UUIDs", "RSSI"]
    );
}

#[tokio::test]
async fn test_remote_error() {
    let bus = bluez();
    let client = connected(&bus).await;
    let adapter = client.get_adapter(None).unwrap();

    bus.respond(ADAPTER_INTERFACE, "StopDiscovery", |m| {
        Message::error(m, "org.bluez.Error.NotReady")
    });
    let e = adapter.stop_discovery().await.unwrap_err();
    assert_eq!(e.remote_name(), Some("org.bluez.Error.NotReady"));

    adapter.start_discovery().await.unwrap();
}

#[tokio::test]
async fn test_event_filters() {
    let bus = bluez();
    let client = connected(&bus).await;

    let discovered = Arc::new(AtomicUsize::new(0));
    let connections = Arc::new(AtomicUsize::new(0));
    let (d, c) = (discovered.clone(), connections.clone());
    client.add_event_sink(move |event| {
        if device_discovered(event) {
            d.fetch_add(1, Ordering::SeqCst);
        }
        if device_connected(event) {
            c.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });

    bus.emit(&properties_changed(
        DEV_A,
        DEVICE_INTERFACE,
        vec![("Connected", Value::variant("b", Value::Bool(true)))],
        &[],
    ));
    bus.emit(&interfaces_added(
        "/org/bluez/hci0/dev_22_22_22_22_22_22",
        Value::dict([(
            DEVICE_INTERFACE,
            device(
                "22:22:22:22:22:22",
                HCI0,
                vec![("RSSI", "n", Value::Int16(-80))],
            ),
        )]),
    ));

    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(discovered.load(Ordering::SeqCst), 1);
    assert!(client.get_device("22:22:22:22:22:22", None).is_some());
    assert!(client.get_device("Keyboard", None).unwrap().connected().unwrap());
}

#[tokio::test]
async fn test_disconnect() {
    let bus = bluez();
    let client = connected(&bus).await;

    client.disconnect().await.unwrap();
    assert_eq!(bus.calls_to(BUS_INTERFACE, "RemoveMatch").len(), 3);
    assert_eq!(bus.handler_count(), 0);
    assert!(!bus.is_connected());
}

#[tokio::test]
async fn test_failed_watch_closes_session() {
    let bus = bluez();
    bus.respond(BUS_INTERFACE, "AddMatch", |m| {
        Message::error(m, "org.freedesktop.DBus.Error.AccessDenied")
    });
    let client = BluezClient::new(bus.clone(), Arc::new(StandardCodec));

    let e = client.connect().await.unwrap_err();
    assert_eq!(
        e.remote_name(),
        Some("org.freedesktop.DBus.Error.AccessDenied")
    );
    assert_eq!(client.manager().state(), bluetree::ManagerState::Disconnected);
    assert_eq!(bus.handler_count(), 0);
    assert!(!bus.is_connected());
}
