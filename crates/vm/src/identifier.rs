//! Names used by programs: identifiers, program ids and locators.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::VmError;

/// A program-level name: function, mapping, struct or struct member.
///
/// Must start with an ASCII letter and contain only ASCII alphanumerics and
/// underscores.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Parse and validate an identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, VmError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(VmError::InvalidName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A program id of the form `name.aleo`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(String);

impl ProgramId {
    /// Network suffix every program id carries.
    pub const NETWORK: &'static str = "aleo";

    pub fn new(id: impl Into<String>) -> Result<Self, VmError> {
        let id = id.into();
        match id.split_once('.') {
            Some((name, network)) if network == Self::NETWORK => {
                Identifier::new(name).map_err(|_| VmError::InvalidName(id.clone()))?;
                Ok(Self(id))
            }
            _ => Err(VmError::InvalidName(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A fully qualified resource: `program/function` or `program/mapping`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Locator {
    pub program: ProgramId,
    pub resource: Identifier,
}

impl Locator {
    pub fn new(program: ProgramId, resource: Identifier) -> Self {
        Self { program, resource }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.program, self.resource)
    }
}

impl FromStr for Locator {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (program, resource) = s
            .split_once('/')
            .ok_or_else(|| VmError::InvalidName(s.to_string()))?;
        Ok(Self::new(ProgramId::new(program)?, Identifier::new(resource)?))
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

macro_rules! string_newtype {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self.0)
            }
        }

        impl FromStr for $ty {
            type Err = VmError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_newtype!(Identifier);
string_newtype!(ProgramId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::new("transfer_public").is_ok());
        assert!(Identifier::new("a1").is_ok());
        assert!(Identifier::new("1a").is_err());
        assert!(Identifier::new("").is_err());
        assert!(Identifier::new("has-dash").is_err());
    }

    #[test]
    fn test_program_id_validation() {
        assert!(ProgramId::new("credits.aleo").is_ok());
        assert!(ProgramId::new("credits").is_err());
        assert!(ProgramId::new("credits.eth").is_err());
        assert!(ProgramId::new(".aleo").is_err());
    }

    #[test]
    fn test_locator_parse_and_display() {
        let locator: Locator = "token.aleo/mint".parse().unwrap();
        assert_eq!(locator.program.as_str(), "token.aleo");
        assert_eq!(locator.resource.as_str(), "mint");
        assert_eq!(locator.to_string(), "token.aleo/mint");
        assert!("token.aleo".parse::<Locator>().is_err());
    }
}
