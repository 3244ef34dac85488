//! Integer type/state codes stored in the database.
//!
//! Rows decode these through `TryFrom<i64>` so an unknown code fails at the
//! load boundary instead of travelling into the materializer.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
#[error("unknown {what} code {code}")]
pub struct UnknownCode {
    pub what: &'static str,
    pub code: i64,
}

macro_rules! int_code {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident = $code:literal => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn code(self) -> i64 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = UnknownCode;

            fn try_from(code: i64) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownCode { what: $what, code }),
                }
            }
        }
    };
}

int_code!(
    /// Instance (and image) type.
    InstanceType, "instance type" {
        Container = 0 => "container",
        VirtualMachine = 1 => "virtual-machine",
    }
);

int_code!(
    NetworkType, "network type" {
        Bridge = 0 => "bridge",
        Macvlan = 1 => "macvlan",
        Sriov = 2 => "sriov",
        Ovn = 3 => "ovn",
        Physical = 4 => "physical",
    }
);

int_code!(
    /// State of a network (globally) or of a per-node placement record.
    PlacementState, "placement state" {
        Pending = 0 => "pending",
        Created = 1 => "created",
        Errored = 2 => "errored",
        Unknown = 3 => "unknown",
    }
);

int_code!(
    DeviceType, "device type" {
        Unspecified = 0 => "none",
        Nic = 1 => "nic",
        Disk = 2 => "disk",
        UnixChar = 3 => "unix-char",
        UnixBlock = 4 => "unix-block",
        Usb = 5 => "usb",
        Gpu = 6 => "gpu",
        Infiniband = 7 => "infiniband",
        Proxy = 8 => "proxy",
        UnixHotplug = 9 => "unix-hotplug",
        Tpm = 10 => "tpm",
        Pci = 11 => "pci",
    }
);
