use pulsevm_error::ChainError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

mod utils;
pub use utils::{NAME_CHARS, NAME_MAX_LEN, ParseNameError, name_from_bytes, name_to_bytes};

/// Account identifier: up to 13 base-32 characters packed into a `u64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(u64);

impl Name {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn empty(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Name {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<Name> for u64 {
    fn from(n: Name) -> Self {
        n.0
    }
}

impl FromStr for Name {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        name_from_bytes(s.as_bytes())
            .map(Name)
            .map_err(|e| ChainError::ParseError(format!("invalid name '{}': {}", s, e)))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = name_to_bytes(self.0);
        let value = std::str::from_utf8(&bytes).map_err(|_| fmt::Error)?;
        f.write_str(value.trim_end_matches('.'))
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Name::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        let name = Name::new(6138663577826885632);
        assert_eq!(name.as_u64(), 6138663577826885632);
        assert_eq!(name.to_string(), "eosio");
    }

    #[test]
    fn test_name_from_str() {
        assert_eq!(Name::from_str("eosio").unwrap().as_u64(), 6138663577826885632);
        assert_eq!(Name::from_str("pulse").unwrap().as_u64(), 12584048018849792000);
        assert_eq!(Name::from_str("").unwrap(), Name::default());
    }

    #[test]
    fn test_thirteenth_char() {
        let name = Name::from_str("aaaaaaaaaaaaj").unwrap();
        assert_eq!(name.to_string(), "aaaaaaaaaaaaj");
        assert!(matches!(
            Name::from_str("aaaaaaaaaaaak"),
            Err(ChainError::ParseError(_))
        ));
        assert!(Name::from_str("aaaaaaaaaaaaaa").is_err());
    }

    #[test]
    fn test_bad_char() {
        let err = Name::from_str("Alice").unwrap_err();
        assert_eq!(
            err,
            ChainError::ParseError("invalid name 'Alice': bad character in name: 'A'".into())
        );
    }

    #[test]
    fn test_serde_round_trip_as_string() {
        let name = Name::from_str("alice").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn test_ordering_follows_value() {
        assert!(Name::new(1) < Name::new(2));
        assert_eq!(Name::new(1).to_string(), "............1");
    }
}
