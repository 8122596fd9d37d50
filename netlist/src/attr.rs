use std::collections::BTreeMap;
use std::fmt::Display;

use crate::{Const, Trit};

/// Well-known attribute names.
pub mod names {
    pub const TOP: &str = "top";
    pub const BLACKBOX: &str = "blackbox";
    pub const WHITEBOX: &str = "whitebox";
    pub const KEEP: &str = "keep";
    /// Port of a black-box cell that is driven by a clock buffer.
    pub const CLKBUF_DRIVER: &str = "clkbuf_driver";
    /// Port of a black-box cell that must be fed by a clock buffer.
    pub const CLKBUF_SINK: &str = "clkbuf_sink";
    /// Output port of a black-box inverter; the value names the paired input port.
    pub const CLKBUF_INV: &str = "clkbuf_inv";
    /// Wire that is never considered for clock buffer insertion.
    pub const CLKBUF_INHIBIT: &str = "clkbuf_inhibit";
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttrValue {
    Const(Const),
    String(String),
}

pub type Attributes = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// Returns the value of a flag attribute. Strings are true unless empty.
    pub fn as_bool(&self) -> bool {
        match self {
            AttrValue::Const(value) => value.as_bool(),
            AttrValue::String(value) => !value.is_empty(),
        }
    }

    pub fn as_const(&self) -> Option<&Const> {
        match self {
            AttrValue::Const(value) => Some(value),
            AttrValue::String(_) => None,
        }
    }

    /// Returns the value as a string; constants are decoded 8 bits per character.
    pub fn decode_string(&self) -> String {
        match self {
            AttrValue::Const(value) => value.decode_string(),
            AttrValue::String(value) => value.clone(),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Const(Const::from_uint(value as u64, 32))
    }
}

impl From<Trit> for AttrValue {
    fn from(value: Trit) -> Self {
        Self::Const(value.into())
    }
}

impl From<Const> for AttrValue {
    fn from(value: Const) -> Self {
        Self::Const(value)
    }
}

impl From<&Const> for AttrValue {
    fn from(value: &Const) -> Self {
        Self::Const(value.clone())
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Const(Const::from_uint(value as u64, 32))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

/// Formats the value the way RTLIL does.
impl Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Const(value) => match value.as_uint() {
                Some(int) if value.len() == 32 && int <= i32::MAX as u64 => write!(f, "{int}"),
                _ => write!(f, "{}'{value}", value.len()),
            },
            AttrValue::String(value) => crate::print::write_string(f, value),
        }
    }
}

/// Returns `true` if the attribute is present and set.
pub fn get_bool(attributes: &Attributes, name: &str) -> bool {
    attributes.get(name).is_some_and(AttrValue::as_bool)
}
