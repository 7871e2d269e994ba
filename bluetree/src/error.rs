use std::io;

use crate::message::MessageType;
use crate::value::Value;

#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{name}: {body:?}")]
    Remote { name: String, body: Vec<Value> },
    #[error("unexpected reply of type {0:?}")]
    ProtocolViolation(MessageType),
    #[error("not found: '{0}'")]
    NotFound(String),
    #[error("invalid match rule: {0}")]
    Validation(String),
    #[error("invalid signature: '{0}'")]
    InvalidSignature(String),
    #[error("value does not match signature '{0}'")]
    SignatureMismatch(String),
    #[error("cannot decode {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bus is not connected")]
    NotConnected,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("IO error")]
    Io(io::ErrorKind),
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind, source: None }
    }

    pub fn with_source<E>(kind: ErrorKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error {
            kind,
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The remote error name, if the daemon rejected the call.
    pub fn remote_name(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Remote { name, .. } => Some(name),
            _ => None,
        }
    }

    /// A reply broke the request/response contract; the session is suspect.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::ProtocolViolation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        ErrorKind::NotFound(what.into()).into()
    }

    pub(crate) fn decode(what: impl Into<String>) -> Self {
        ErrorKind::Decode(what.into()).into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        let kind = e.kind();
        Error::with_source(ErrorKind::Io(kind), e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        let message = e.message().to_string();
        Error::with_source(ErrorKind::Config(message), e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
