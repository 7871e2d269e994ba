//! Bus messages as seen by the engine.
//!
//! The transport owns framing and marshaling; the engine only ever handles
//! decoded [`Message`] values.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Kind of a bus message, with its wire code.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    MethodCall = 1,
    MethodReturn = 2,
    Error = 3,
    Signal = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, u8> {
        match code {
            1 => Ok(MessageType::MethodCall),
            2 => Ok(MessageType::MethodReturn),
            3 => Ok(MessageType::Error),
            4 => Ok(MessageType::Signal),
            other => Err(other),
        }
    }
}

bitflags::bitflags! {
    /// Header flags of a message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u8 {
        const NO_REPLY_EXPECTED = 0x1;
        const NO_AUTO_START = 0x2;
        const ALLOW_INTERACTIVE_AUTHORIZATION = 0x4;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_type: MessageType,
    pub flags: MessageFlags,
    pub serial: u32,
    pub reply_serial: Option<u32>,
    pub destination: Option<String>,
    pub sender: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub error_name: Option<String>,
    pub signature: String,
    pub body: Vec<Value>,
    /// File descriptors passed alongside the body.
    pub unix_fds: Vec<i32>,
}

impl Message {
    fn empty(message_type: MessageType) -> Self {
        Message {
            message_type,
            flags: MessageFlags::empty(),
            serial: 0,
            reply_serial: None,
            destination: None,
            sender: None,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            signature: String::new(),
            body: Vec::new(),
            unix_fds: Vec::new(),
        }
    }

    pub fn method_call(destination: &str, path: &str, interface: &str, member: &str) -> Self {
        Message {
            destination: Some(destination.into()),
            path: Some(path.into()),
            interface: Some(interface.into()),
            member: Some(member.into()),
            ..Message::empty(MessageType::MethodCall)
        }
    }

    pub fn signal(path: &str, interface: &str, member: &str) -> Self {
        Message {
            path: Some(path.into()),
            interface: Some(interface.into()),
            member: Some(member.into()),
            ..Message::empty(MessageType::Signal)
        }
    }

    /// A successful reply to `call`.
    pub fn method_return(call: &Message) -> Self {
        Message {
            reply_serial: Some(call.serial),
            destination: call.sender.clone(),
            ..Message::empty(MessageType::MethodReturn)
        }
    }

    /// An error reply to `call`.
    pub fn error(call: &Message, error_name: &str) -> Self {
        Message {
            reply_serial: Some(call.serial),
            destination: call.sender.clone(),
            error_name: Some(error_name.into()),
            ..Message::empty(MessageType::Error)
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_body(mut self, body: Vec<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_unix_fds(mut self, fds: Vec<i32>) -> Self {
        self.unix_fds = fds;
        self
    }

    pub fn is_signal(&self, interface: &str, member: &str) -> bool {
        self.message_type == MessageType::Signal
            && self.interface.as_deref() == Some(interface)
            && self.member.as_deref() == Some(member)
    }
}

/// Named fields from which a [`Codec`](crate::Codec) builds a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub struct MessageFields {
    pub message_type: MessageType,
    pub destination: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub signature: String,
    pub body: Vec<Value>,
    pub flags: MessageFlags,
}

impl Default for MessageFields {
    fn default() -> Self {
        MessageFields {
            message_type: MessageType::MethodCall,
            destination: None,
            path: None,
            interface: None,
            member: None,
            signature: String::new(),
            body: Vec::new(),
            flags: MessageFlags::empty(),
        }
    }
}

impl MessageFields {
    pub fn method_call(destination: &str, path: &str, interface: &str, member: &str) -> Self {
        MessageFields {
            destination: Some(destination.into()),
            path: Some(path.into()),
            interface: Some(interface.into()),
            member: Some(member.into()),
            ..MessageFields::default()
        }
    }

    pub fn with_body(mut self, signature: impl Into<String>, body: Vec<Value>) -> Self {
        self.signature = signature.into();
        self.body = body;
        self
    }
}
