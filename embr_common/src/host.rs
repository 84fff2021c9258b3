//! Board identity.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported host boards.
///
/// Names round-trip through [`fmt::Display`] and [`FromStr`]; any other name
/// becomes [`Host::Other`] so custom boards can be registered too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Host {
    /// No host.
    #[default]
    Null,
    /// Raspberry Pi.
    RaspberryPi,
    /// BeagleBone Black.
    BeagleBoneBlack,
    /// Intel Galileo.
    Galileo,
    /// Cubie Truck.
    CubieTruck,
    /// Radxa.
    Radxa,
    /// Intel Edison.
    Edison,
    /// Botanist gateway.
    BotanistGw,
    /// Board registered under a custom name.
    Other(String),
}

impl Host {
    /// Human-readable board name.
    pub fn name(&self) -> &str {
        match self {
            Self::Null => "",
            Self::RaspberryPi => "Raspberry Pi",
            Self::BeagleBoneBlack => "BeagleBone Black",
            Self::Galileo => "Intel Galileo",
            Self::CubieTruck => "CubieTruck",
            Self::Radxa => "Radxa",
            Self::Edison => "Intel Edison",
            Self::BotanistGw => "botanist_gw",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Host {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" => Self::Null,
            "Raspberry Pi" | "rpi" => Self::RaspberryPi,
            "BeagleBone Black" | "bbb" => Self::BeagleBoneBlack,
            "Intel Galileo" | "galileo" => Self::Galileo,
            "CubieTruck" | "cubietruck" => Self::CubieTruck,
            "Radxa" | "radxa" => Self::Radxa,
            "Intel Edison" | "edison" => Self::Edison,
            "botanist_gw" => Self::BotanistGw,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for Host {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(host) => host,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Host> for String {
    fn from(host: Host) -> Self {
        host.name().to_string()
    }
}
