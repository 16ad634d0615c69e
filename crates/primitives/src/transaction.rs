//! Transactions and coin outputs.

use quartz_consensus::Hash256;
use serde::{Deserialize, Serialize};

use crate::condition::UnlockCondition;
use crate::currency::Currency;
use crate::encoding::{encode, Encodable, Encoder};
use crate::hash::sha256;

pub type TransactionId = Hash256;
pub type CoinOutputId = Hash256;

const SPECIFIER_TRANSACTION: &[u8; 16] = b"transaction\0\0\0\0\0";
const SPECIFIER_COIN_OUTPUT: &[u8; 16] = b"coin output\0\0\0\0\0";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoinInput {
    #[serde(rename = "parentid", with = "crate::hash_hex")]
    pub parent_id: CoinOutputId,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoinOutput {
    pub value: Currency,
    pub condition: UnlockCondition,
}

/// Block stakes are not indexed; outputs are carried only so the
/// value-transaction rule can count them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockStakeOutput {
    pub value: Currency,
    pub condition: UnlockCondition,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, rename = "coininputs")]
    pub coin_inputs: Vec<CoinInput>,
    #[serde(default, rename = "coinoutputs")]
    pub coin_outputs: Vec<CoinOutput>,
    #[serde(default, rename = "blockstakeoutputs")]
    pub block_stake_outputs: Vec<BlockStakeOutput>,
}

impl Transaction {
    /// A value transaction moves coins or redistributes block stakes.
    pub fn is_value_transaction(&self) -> bool {
        !self.coin_inputs.is_empty() || self.block_stake_outputs.len() > 1
    }

    pub fn id(&self) -> TransactionId {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(SPECIFIER_TRANSACTION);
        data.extend_from_slice(&encode(self));
        sha256(&data)
    }

    pub fn coin_output_id(&self, index: u64) -> CoinOutputId {
        let mut data = Vec::with_capacity(56);
        data.extend_from_slice(SPECIFIER_COIN_OUTPUT);
        data.extend_from_slice(&self.id());
        data.extend_from_slice(&index.to_le_bytes());
        sha256(&data)
    }
}

impl Encodable for CoinOutput {
    fn binary_encode(&self, encoder: &mut Encoder) {
        self.value.binary_encode(encoder);
        self.condition.binary_encode(encoder);
    }
}

impl Encodable for BlockStakeOutput {
    fn binary_encode(&self, encoder: &mut Encoder) {
        self.value.binary_encode(encoder);
        self.condition.binary_encode(encoder);
    }
}

impl Encodable for Transaction {
    fn binary_encode(&self, encoder: &mut Encoder) {
        encoder.write_varint(self.coin_inputs.len() as u64);
        for input in &self.coin_inputs {
            encoder.write_hash(&input.parent_id);
        }
        encoder.write_varint(self.coin_outputs.len() as u64);
        for output in &self.coin_outputs {
            output.binary_encode(encoder);
        }
        encoder.write_varint(self.block_stake_outputs.len() as u64);
        for output in &self.block_stake_outputs {
            output.binary_encode(encoder);
        }
    }
}
