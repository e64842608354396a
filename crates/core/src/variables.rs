//! Variables exchanged with DoMath jobs.

use serde::{Deserialize, Serialize};

/// Input and output variables of a DoMath job.
///
/// Missing fields read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathVariables {
    /// Amount added to `count`
    #[serde(default)]
    pub add: i64,

    /// Running total
    #[serde(default)]
    pub count: i64,
}

impl MathVariables {
    /// Field names, in wire order.
    pub const FIELDS: [&'static str; 2] = ["add", "count"];

    /// Create a new variable set.
    pub fn new(add: i64, count: i64) -> Self {
        Self { add, count }
    }

    /// Add `add` into `count`. Overflow wraps.
    pub fn apply(&mut self) {
        self.count = self.count.wrapping_add(self.add);
    }

    /// Fields absent from a raw object payload. These read as zero.
    ///
    /// Non-objects report nothing; they fail to parse anyway.
    pub fn missing_fields(payload: &serde_json::Value) -> Vec<&'static str> {
        match payload.as_object() {
            Some(map) => Self::FIELDS
                .into_iter()
                .filter(|field| !map.contains_key(*field))
                .collect(),
            None => Vec::new(),
        }
    }
}
