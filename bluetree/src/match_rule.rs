//! Signal match rules.
//!
//! A [`MatchRule`] is the filter handed to the bus daemon's `AddMatch` and
//! `RemoveMatch`. It is built once, validated, and never changed; its
//! [`Display`](std::fmt::Display) form is the canonical `key=value,...`
//! string the daemon expects.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;
use crate::{OBJECT_MANAGER_INTERFACE, PROPERTIES_INTERFACE};

static ARG_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^arg\d+(path)?$").expect("static regex"));

/// The fields of a match rule before validation.
///
/// `args` holds positional constraints keyed `argN` or `argNpath`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRuleDef {
    pub kind: String,
    pub sender: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub path: Option<String>,
    pub path_namespace: Option<String>,
    pub destination: Option<String>,
    pub arg0namespace: Option<String>,
    pub args: Vec<(String, Value)>,
}

impl Default for MatchRuleDef {
    fn default() -> Self {
        MatchRuleDef {
            kind: "signal".into(),
            sender: None,
            interface: None,
            member: None,
            path: None,
            path_namespace: None,
            destination: None,
            arg0namespace: None,
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchRule {
    kind: String,
    sender: Option<String>,
    interface: Option<String>,
    member: Option<String>,
    path: Option<String>,
    path_namespace: Option<String>,
    destination: Option<String>,
    arg0namespace: Option<String>,
    args: Vec<(String, String)>,
}

impl MatchRule {
    /// Validates `def` into a rule.
    ///
    /// Fails with [`ErrorKind::Validation`] if an argument key is not of the
    /// form `argN` / `argNpath`, or if its value is not a string.
    pub fn from_def(def: MatchRuleDef) -> Result<Self> {
        let mut args = Vec::with_capacity(def.args.len());
        for (key, value) in def.args {
            if !ARG_KEY.is_match(&key) {
                return Err(ErrorKind::Validation(format!(
                    "argument key '{}' must be of the form 'argN' or 'argNpath'",
                    key
                ))
                .into());
            }
            match value {
                Value::Str(s) | Value::ObjectPath(s) => args.push((key, s)),
                other => {
                    return Err(ErrorKind::Validation(format!(
                        "argument '{}' must be a string, got {}",
                        key,
                        other.type_name()
                    ))
                    .into())
                }
            }
        }

        Ok(MatchRule {
            kind: def.kind,
            sender: def.sender,
            interface: def.interface,
            member: def.member,
            path: def.path,
            path_namespace: def.path_namespace,
            destination: def.destination,
            arg0namespace: def.arg0namespace,
            args,
        })
    }

    /// A signal rule for `interface.member` under `path_namespace`.
    pub fn signal(interface: &str, member: &str, path_namespace: &str) -> Result<Self> {
        MatchRule::from_def(MatchRuleDef {
            interface: Some(interface.into()),
            member: Some(member.into()),
            path_namespace: Some(path_namespace.into()),
            ..MatchRuleDef::default()
        })
    }

    /// The rules a watched subtree needs: `InterfacesAdded`,
    /// `InterfacesRemoved` and `PropertiesChanged`.
    pub fn default_rules(path_namespace: &str) -> Result<Vec<Self>> {
        Ok(vec![
            MatchRule::signal(OBJECT_MANAGER_INTERFACE, "InterfacesAdded", path_namespace)?,
            MatchRule::signal(OBJECT_MANAGER_INTERFACE, "InterfacesRemoved", path_namespace)?,
            MatchRule::signal(PROPERTIES_INTERFACE, "PropertiesChanged", path_namespace)?,
        ])
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn path_namespace(&self) -> Option<&str> {
        self.path_namespace.as_deref()
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn arg0namespace(&self) -> Option<&str> {
        self.arg0namespace.as_deref()
    }

    pub fn args(&self) -> &[(String, String)] {
        &self.args
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={}", self.kind)?;

        let named = [
            ("sender", &self.sender),
            ("interface", &self.interface),
            ("member", &self.member),
            ("path", &self.path),
            ("path_namespace", &self.path_namespace),
            ("destination", &self.destination),
        ];
        for (key, value) in named {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                write!(f, ",{}={}", key, value)?;
            }
        }

        for (key, value) in &self.args {
            write!(f, ",{}={}", key, value)?;
        }

        if let Some(ns) = self.arg0namespace.as_deref().filter(|v| !v.is_empty()) {
            write!(f, ",arg0namespace={}", ns)?;
        }
        Ok(())
    }
}

impl FromStr for MatchRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut def = MatchRuleDef::default();

        for item in s.split(',').filter(|i| !i.is_empty()) {
            let (key, value) = item.split_once('=').ok_or_else(|| {
                Error::from(ErrorKind::Validation(format!("'{}' is not key=value", item)))
            })?;
            let value = value.to_string();
            match key {
                "type" => def.kind = value,
                "sender" => def.sender = Some(value),
                "interface" => def.interface = Some(value),
                "member" => def.member = Some(value),
                "path" => def.path = Some(value),
                "path_namespace" => def.path_namespace = Some(value),
                "destination" => def.destination = Some(value),
                "arg0namespace" => def.arg0namespace = Some(value),
                _ => def.args.push((key.to_string(), Value::Str(value))),
            }
        }

        MatchRule::from_def(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let rule = MatchRule::from_def(MatchRuleDef {
            arg0namespace: Some("org.bluez".into()),
            destination: Some(":1.3".into()),
            path: Some("/org/bluez/hci0".into()),
            member: Some("PropertiesChanged".into()),
            interface: Some(PROPERTIES_INTERFACE.into()),
            sender: Some("org.bluez".into()),
            args: vec![("arg0".into(), "org.bluez.Device1".into())],
            ..MatchRuleDef::default()
        })
        .unwrap();

        assert_eq!(
            rule.to_string(),
            "type=signal,sender=org.bluez,interface=org.freedesktop.DBus.Properties,\
             member=PropertiesChanged,path=/org/bluez/hci0,destination=:1.3,\
             arg0=org.bluez.Device1,arg0namespace=org.bluez"
        );
    }

    #[test]
    fn test_default_rules() {
        let rules: Vec<String> = MatchRule::default_rules("/org/bluez")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rules,
            vec![
                "type=signal,interface=org.freedesktop.DBus.ObjectManager,member=InterfacesAdded,path_namespace=/org/bluez",
                "type=signal,interface=org.freedesktop.DBus.ObjectManager,member=InterfacesRemoved,path_namespace=/org/bluez",
                "type=signal,interface=org.freedesktop.DBus.Properties,member=PropertiesChanged,path_namespace=/org/bluez",
            ]
        );
    }

    #[test]
    fn test_parse_back() {
        let text = "type=signal,interface=org.freedesktop.DBus.Properties,arg0=org.bluez.Device1,arg2path=/org/bluez";
        let rule: MatchRule = text.parse().unwrap();
        assert_eq!(rule.interface(), Some(PROPERTIES_INTERFACE));
        assert_eq!(rule.arg("arg0"), Some("org.bluez.Device1"));
        assert_eq!(rule.arg("arg2path"), Some("/org/bluez"));
        assert_eq!(rule.to_string(), text);
    }

    #[test]
    fn test_invalid_arg_key() {
        let e = "type=signal,foo=bar".parse::<MatchRule>().unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Validation(_)));

        let e = MatchRule::from_def(MatchRuleDef {
            args: vec![("argx".into(), "a".into())],
            ..MatchRuleDef::default()
        })
        .unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Validation(_)));
    }

    #[test]
    fn test_non_text_arg_value() {
        let e = MatchRule::from_def(MatchRuleDef {
            args: vec![("arg1".into(), Value::UInt32(1))],
            ..MatchRuleDef::default()
        })
        .unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Validation(_)));
    }
}
