//! Type signatures.
//!
//! A signature is a string of single complete types, e.g. `"ssv"` for the
//! arguments of `Properties.Set` or `"a{oa{sa{sv}}}"` for the reply of
//! `GetManagedObjects`. [`SignatureType`] is the parsed form of one complete
//! type and can check whether a [`Value`] conforms to it.

use std::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureType {
    Byte,
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    Str,
    ObjectPath,
    Signature,
    UnixFd,
    Variant,
    Array(Box<SignatureType>),
    Dict(Box<SignatureType>, Box<SignatureType>),
    Struct(Vec<SignatureType>),
}

impl SignatureType {
    /// Whether `value` conforms to this type.
    ///
    /// A [`Value::Variant`] only conforms to [`SignatureType::Variant`], and
    /// its inner value must conform to the signature it carries.
    pub fn verify(&self, value: &Value) -> bool {
        use SignatureType as S;

        match (self, value) {
            (S::Byte, Value::Byte(_))
            | (S::Bool, Value::Bool(_))
            | (S::Int16, Value::Int16(_))
            | (S::UInt16, Value::UInt16(_))
            | (S::Int32, Value::Int32(_))
            | (S::UInt32, Value::UInt32(_))
            | (S::Int64, Value::Int64(_))
            | (S::UInt64, Value::UInt64(_))
            | (S::Double, Value::Double(_))
            | (S::Str, Value::Str(_))
            | (S::UnixFd, Value::UnixFd(_)) => true,
            (S::ObjectPath, Value::ObjectPath(p)) => is_object_path(p),
            (S::Signature, Value::Signature(s)) => parse_signature(s).is_ok(),
            (S::Variant, Value::Variant(v)) => match parse_single(&v.signature) {
                Ok(inner) => inner.verify(&v.value),
                Err(_) => false,
            },
            (S::Array(elem), Value::Array(items)) => items.iter().all(|i| elem.verify(i)),
            (S::Array(elem), Value::Bytes(_)) => **elem == S::Byte,
            (S::Dict(k, v), Value::Dict(entries)) => entries
                .iter()
                .all(|(key, val)| k.verify(key) && v.verify(val)),
            (S::Struct(fields), Value::Struct(items)) => {
                fields.len() == items.len()
                    && fields.iter().zip(items).all(|(f, i)| f.verify(i))
            }
            _ => false,
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SignatureType as S;

        match self {
            S::Byte => f.write_str("y"),
            S::Bool => f.write_str("b"),
            S::Int16 => f.write_str("n"),
            S::UInt16 => f.write_str("q"),
            S::Int32 => f.write_str("i"),
            S::UInt32 => f.write_str("u"),
            S::Int64 => f.write_str("x"),
            S::UInt64 => f.write_str("t"),
            S::Double => f.write_str("d"),
            S::Str => f.write_str("s"),
            S::ObjectPath => f.write_str("o"),
            S::Signature => f.write_str("g"),
            S::UnixFd => f.write_str("h"),
            S::Variant => f.write_str("v"),
            S::Array(elem) => write!(f, "a{}", elem),
            S::Dict(k, v) => write!(f, "a{{{}{}}}", k, v),
            S::Struct(fields) => {
                f.write_str("(")?;
                for field in fields {
                    write!(f, "{}", field)?;
                }
                f.write_str(")")
            }
        }
    }
}

peg::parser! {
    grammar signature_grammar() for str {
        use crate::signature::{SignatureType as S, MAX_DEPTH};

        rule basic_type() -> S
            = "y" { S::Byte }
            / "b" { S::Bool }
            / "n" { S::Int16 }
            / "q" { S::UInt16 }
            / "i" { S::Int32 }
            / "u" { S::UInt32 }
            / "x" { S::Int64 }
            / "t" { S::UInt64 }
            / "d" { S::Double }
            / "s" { S::Str }
            / "o" { S::ObjectPath }
            / "g" { S::Signature }
            / "h" { S::UnixFd }

        rule within(depth: usize)
            = "" {? if depth <= MAX_DEPTH { Ok(()) } else { Err("shallower nesting") } }

        rule container(depth: usize) -> S
            = "v" { S::Variant }
            / "a{" k:basic_type() v:complete_type(depth + 1) "}" { S::Dict(Box::new(k), Box::new(v)) }
            / "a" e:complete_type(depth + 1) { S::Array(Box::new(e)) }
            / "(" f:complete_type(depth + 1)+ ")" { S::Struct(f) }

        rule complete_type(depth: usize) -> S
            = within(depth) t:(basic_type() / container(depth)) { t }

        pub rule signature() -> Vec<S>
            = complete_type(0)*
    }
}

/// Parses a signature into its sequence of complete types.
///
/// The empty signature is valid and yields no types. Dictionary keys must be
/// basic types and structs must have at least one field.
pub fn parse_signature(signature: &str) -> Result<Vec<SignatureType>> {
    signature_grammar::signature(signature).map_err(|e| {
        Error::with_source(ErrorKind::InvalidSignature(signature.to_string()), e)
    })
}

/// Parses a signature that must contain exactly one complete type.
pub fn parse_single(signature: &str) -> Result<SignatureType> {
    let mut types = parse_signature(signature)?;
    if types.len() != 1 {
        return Err(ErrorKind::InvalidSignature(signature.to_string()).into());
    }
    Ok(types.remove(0))
}

/// Checks that `body` matches `signature` argument by argument.
pub fn verify_body(signature: &str, body: &[Value]) -> Result<()> {
    let types = parse_signature(signature)?;
    if types.len() != body.len() || !types.iter().zip(body).all(|(t, v)| t.verify(v)) {
        return Err(ErrorKind::SignatureMismatch(signature.to_string()).into());
    }
    Ok(())
}

/// Whether `path` is a syntactically valid object path.
pub fn is_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(|element| {
        !element.is_empty()
            && element
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}
