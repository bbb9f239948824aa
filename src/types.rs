use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
};

/// Token used on the wire for the current irreversible block.
pub const IRREVERSIBLE_TOKEN: &str = "LIB";

/// Opaque identifier the server assigns to an accepted subscription (`reqUUID`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubscriptionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A `start_from` / `read_until` position.
///
/// Serialized as `0` for [`BlockPosition::Head`], the block number for
/// [`BlockPosition::Number`] and `"LIB"` for [`BlockPosition::Irreversible`]. Parsing accepts the
/// token in any letter case and block numbers given as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockPosition {
    /// `0`: start at the chain head, or never stop when used as an upper bound.
    #[default]
    Head,
    /// A concrete, non-zero block number.
    Number(u64),
    /// The current irreversible block, resolved right before submission.
    Irreversible,
}

impl BlockPosition {
    /// Returns the concrete block number, if any. [`BlockPosition::Head`] has none.
    #[must_use]
    pub fn block_number(self) -> Option<u64> {
        match self {
            BlockPosition::Number(n) => Some(n),
            BlockPosition::Head | BlockPosition::Irreversible => None,
        }
    }

    #[must_use]
    pub fn is_head(self) -> bool {
        matches!(self, BlockPosition::Head)
    }

    #[must_use]
    pub fn is_irreversible(self) -> bool {
        matches!(self, BlockPosition::Irreversible)
    }

    fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case(IRREVERSIBLE_TOKEN) {
            return Some(BlockPosition::Irreversible);
        }
        token.parse::<u64>().ok().map(BlockPosition::from)
    }
}

impl From<u64> for BlockPosition {
    fn from(value: u64) -> Self {
        if value == 0 { BlockPosition::Head } else { BlockPosition::Number(value) }
    }
}

impl fmt::Display for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockPosition::Head => f.write_str("0"),
            BlockPosition::Number(n) => write!(f, "{n}"),
            BlockPosition::Irreversible => f.write_str(IRREVERSIBLE_TOKEN),
        }
    }
}

impl Serialize for BlockPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BlockPosition::Head => serializer.serialize_u64(0),
            BlockPosition::Number(n) => serializer.serialize_u64(*n),
            BlockPosition::Irreversible => serializer.serialize_str(IRREVERSIBLE_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for BlockPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl Visitor<'_> for PositionVisitor {
            type Value = BlockPosition;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a block number or the \"LIB\" token")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(BlockPosition::from(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .map(BlockPosition::from)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                BlockPosition::parse_token(value)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(PositionVisitor)
    }
}

/// Whether a record comes from the historical backfill or from the live head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Live,
    History,
}

/// Kind of trace carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Action,
    Delta,
}
