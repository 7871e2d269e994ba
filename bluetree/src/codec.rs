use crate::bus::Codec;
use crate::error::Result;
use crate::message::{Message, MessageFields};
use crate::signature::{parse_single, verify_body};
use crate::value::Value;
use crate::ErrorKind;

/// A [`Codec`] that works purely on [`Value`]s.
///
/// Suitable for any backend that already hands out decoded values, and for
/// [`MemoryBus`](crate::memory::MemoryBus).
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl StandardCodec {
    pub fn new() -> Self {
        StandardCodec
    }
}

impl Codec for StandardCodec {
    fn encode(&self, value: Value, signature: &str) -> Result<Value> {
        let ty = parse_single(signature)?;
        if !ty.verify(&value) {
            return Err(ErrorKind::SignatureMismatch(signature.to_string()).into());
        }
        Ok(Value::variant(signature, value))
    }

    fn decode(&self, value: &Value) -> Value {
        match value {
            Value::Variant(v) => v.value.clone(),
            other => other.clone(),
        }
    }

    fn unpack(&self, value: &Value) -> Value {
        match value {
            Value::Variant(v) => self.unpack(&v.value),
            Value::Array(items) => Value::Array(items.iter().map(|i| self.unpack(i)).collect()),
            Value::Struct(items) => Value::Struct(items.iter().map(|i| self.unpack(i)).collect()),
            Value::Dict(entries) => Value::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (self.unpack(k), self.unpack(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn message(&self, fields: MessageFields) -> Result<Message> {
        verify_body(&fields.signature, &fields.body)?;

        Ok(Message {
            message_type: fields.message_type,
            flags: fields.flags,
            serial: 0,
            reply_serial: None,
            destination: fields.destination,
            sender: None,
            path: fields.path,
            interface: fields.interface,
            member: fields.member,
            error_name: None,
            signature: fields.signature,
            body: fields.body,
            unix_fds: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_checks_signature() {
        let codec = StandardCodec::new();
        let v = codec.encode(Value::UInt32(30), "u").unwrap();
        assert_eq!(v, Value::variant("u", Value::UInt32(30)));
        let e = codec.encode(Value::Str("x".into()), "u").unwrap_err();
        assert_eq!(e.kind(), &ErrorKind::SignatureMismatch("u".into()));
    }

    #[test]
    fn test_decode_strips_one_layer() {
        let codec = StandardCodec::new();
        let nested = Value::variant("v", Value::variant("b", Value::Bool(true)));
        assert_eq!(codec.decode(&nested), Value::variant("b", Value::Bool(true)));
        assert_eq!(codec.unpack(&nested), Value::Bool(true));
    }

    #[test]
    fn test_unpack_nested_map() {
        let codec = StandardCodec::new();
        let tree = Value::Dict(vec![(
            Value::object_path("/org/bluez/hci0"),
            Value::dict([(
                "org.bluez.Adapter1",
                Value::dict([("Powered", Value::variant("b", Value::Bool(false)))]),
            )]),
        )]);
        let plain = codec.unpack(&tree);
        let powered = plain
            .get("/org/bluez/hci0")
            .and_then(|i| i.get("org.bluez.Adapter1"))
            .and_then(|p| p.get("Powered"));
        assert_eq!(powered, Some(&Value::Bool(false)));
    }

    #[test]
    fn test_message_verifies_body() {
        let codec = StandardCodec::new();
        let fields = MessageFields::method_call("org.bluez", "/", "a.b", "C")
            .with_body("ss", vec!["x".into()]);
        assert!(codec.message(fields).is_err());

        let fields = MessageFields::method_call("org.bluez", "/", "a.b", "C")
            .with_body("s", vec!["x".into()]);
        let m = codec.message(fields).unwrap();
        assert_eq!(m.member.as_deref(), Some("C"));
    }
}
