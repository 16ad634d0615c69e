//! Consensus change events, the unit of subscription delivery.

use std::fmt;

use quartz_consensus::{hash256_from_hex, hash256_to_hex, Hash256, HexError};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::block::Block;

/// Stable identifier of a consensus change. The zero id addresses the
/// beginning of the chain.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct ConsensusChangeId(pub Hash256);

impl ConsensusChangeId {
    pub fn beginning() -> Self {
        Self::default()
    }

    pub fn is_beginning(&self) -> bool {
        self.0 == Hash256::default()
    }

    pub fn hex(&self) -> String {
        hash256_to_hex(&self.0)
    }

    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        hash256_from_hex(input).map(Self)
    }
}

impl fmt::Display for ConsensusChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for ConsensusChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsensusChangeId({})", self.hex())
    }
}

impl Serialize for ConsensusChangeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for ConsensusChangeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ConsensusChangeId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 64-digit hex change id")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ConsensusChangeId, E> {
                ConsensusChangeId::from_hex(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(IdVisitor)
    }
}

/// One atomic unit of the consensus stream: the blocks dropped from the
/// old fork followed by the blocks of the new one, both in order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsensusChange {
    pub id: ConsensusChangeId,
    #[serde(default, rename = "revertedblocks")]
    pub reverted_blocks: Vec<Block>,
    #[serde(default, rename = "appliedblocks")]
    pub applied_blocks: Vec<Block>,
}
