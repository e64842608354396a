//! Unique identifiers for engine entities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique key of a job, assigned by the engine.
///
/// The gateway may send 64-bit keys either as JSON numbers or as strings,
/// so both forms are accepted. Keys are always written back as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey(i64);

impl JobKey {
    /// Wrap a raw key.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw key value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobKey {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl Serialize for JobKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawKey {
            Number(i64),
            Text(String),
        }

        match RawKey::deserialize(deserializer)? {
            RawKey::Number(n) => Ok(Self(n)),
            RawKey::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
