//! Lookup keys for pins and LEDs.
//!
//! A key is a closed sum of the shapes callers use to name a pin: a logical
//! number (`10`), a name (`"GPIO10"`, `"P9_12"`), or any displayable
//! identifier rendered once at construction. Every shape normalizes to one
//! canonical string before it is compared against a capability map.

use std::borrow::Cow;
use std::fmt;

/// Pin or LED lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PinKey {
    /// Logical number, compared as its decimal rendering.
    Number(i64),
    /// Name or alias as written by the caller.
    Name(String),
    /// Displayable identifier, already rendered.
    Id(String),
}

impl PinKey {
    /// Build a key from any displayable identifier.
    pub fn ident(id: impl fmt::Display) -> Self {
        Self::Id(id.to_string())
    }

    /// Canonical comparison string.
    ///
    /// Returns `None` for keys with no canonical form (empty names), which
    /// lookups treat as "not found".
    pub fn canonical(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Name(s) | Self::Id(s) if !s.is_empty() => Some(Cow::Borrowed(s.as_str())),
            Self::Name(_) | Self::Id(_) => None,
        }
    }
}

impl fmt::Display for PinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(s) | Self::Id(s) => write!(f, "{s}"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PinKey {
                fn from(n: $t) -> Self {
                    Self::Number(n as i64)
                }
            }
        )*
    };
}

impl_from_int!(u8, u16, u32, i32, i64, usize);

impl From<&str> for PinKey {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for PinKey {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

impl From<&String> for PinKey {
    fn from(s: &String) -> Self {
        Self::Name(s.clone())
    }
}

impl From<&PinKey> for PinKey {
    fn from(k: &PinKey) -> Self {
        k.clone()
    }
}
