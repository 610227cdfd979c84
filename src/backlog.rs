// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// How far back into a feed's backlog a subscription is willing to reach.
///
/// `Finite(0)` means no entries at all, including the newest one and including
/// the very first sync of a subscription. `Unbounded` means the whole feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogLimit {
    Finite(u32),
    Unbounded,
}

impl BacklogLimit {
    /// Number of entries eligible for download from a feed of `total` entries,
    /// counted from the newest end.
    pub fn window(self, total: usize) -> usize {
        match self {
            BacklogLimit::Finite(n) => (n as usize).min(total),
            BacklogLimit::Unbounded => total,
        }
    }
}

impl fmt::Display for BacklogLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacklogLimit::Finite(n) => write!(f, "{}", n),
            BacklogLimit::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for BacklogLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LimitVisitor;

        impl Visitor<'_> for LimitVisitor {
            type Value = BacklogLimit;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or the string \"unbounded\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                let value = u32::try_from(value)
                    .map_err(|_| E::custom(format!("backlog limit {} is too large", value)))?;
                Ok(BacklogLimit::Finite(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                if value < 0 {
                    return Err(E::custom(format!(
                        "backlog limit must not be negative, got {}",
                        value
                    )));
                }
                self.visit_u64(value as u64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                match value {
                    "unbounded" => Ok(BacklogLimit::Unbounded),
                    other => Err(E::custom(format!(
                        "expected \"unbounded\" or an integer, got \"{}\"",
                        other
                    ))),
                }
            }
        }

        deserializer.deserialize_any(LimitVisitor)
    }
}
