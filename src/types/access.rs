use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Access level attached to a group permission, or requested by a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    Read,
    Write,
    ReadWrite,
}

impl AccessLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::ReadWrite => "read-write",
        }
    }

    pub fn parse(s: &str) -> Option<AccessLevel> {
        match s {
            "read" => Some(AccessLevel::Read),
            "write" => Some(AccessLevel::Write),
            "read-write" => Some(AccessLevel::ReadWrite),
            _ => None,
        }
    }

    /// Returns true if a grant at this level satisfies a request for `requested`.
    /// A grant matches its own level exactly, and `read-write` satisfies anything.
    #[must_use]
    pub const fn grants(self, requested: AccessLevel) -> bool {
        matches!(
            (self, requested),
            (AccessLevel::ReadWrite, _)
                | (AccessLevel::Read, AccessLevel::Read)
                | (AccessLevel::Write, AccessLevel::Write)
        )
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessLevel::parse(s).ok_or_else(|| {
            Error::BadRequest(format!(
                "invalid access level '{s}', expected read, write or read-write"
            ))
        })
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccessLevel::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid access level: {s}")))
    }
}

/// Principal role. Only `admin` is special; every other stored string reads
/// back as `Standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Admin,
    #[default]
    Standard,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Standard => "user",
        }
    }

    #[must_use]
    pub fn from_stored(s: &str) -> Role {
        if s == "admin" { Role::Admin } else { Role::Standard }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::from_stored(&s))
    }
}
