//! Blocks as delivered by the consensus stream.

use quartz_consensus::Hash256;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::currency::Currency;
use crate::encoding::{encode, Encodable, Encoder};
use crate::hash::sha256;
use crate::transaction::Transaction;

pub type BlockId = Hash256;

const SPECIFIER_BLOCK: &[u8; 16] = b"block\0\0\0\0\0\0\0\0\0\0\0";
const SPECIFIER_MINER_PAYOUT: &[u8; 16] = b"miner payout\0\0\0\0";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MinerPayout {
    pub value: Currency,
    #[serde(rename = "unlockhash")]
    pub unlock_hash: Address,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, rename = "parentid", with = "crate::hash_hex")]
    pub parent_id: BlockId,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, rename = "minerpayouts")]
    pub miner_payouts: Vec<MinerPayout>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The genesis block is the only block without a parent.
    pub fn is_genesis(&self) -> bool {
        self.parent_id == BlockId::default()
    }

    pub fn id(&self) -> BlockId {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(SPECIFIER_BLOCK);
        data.extend_from_slice(&encode(self));
        sha256(&data)
    }

    pub fn miner_payout_id(&self, index: u64) -> Hash256 {
        let mut data = Vec::with_capacity(56);
        data.extend_from_slice(SPECIFIER_MINER_PAYOUT);
        data.extend_from_slice(&self.id());
        data.extend_from_slice(&index.to_le_bytes());
        sha256(&data)
    }
}

impl Encodable for Block {
    fn binary_encode(&self, encoder: &mut Encoder) {
        encoder.write_hash(&self.parent_id);
        encoder.write_u64_le(self.timestamp);
        encoder.write_varint(self.miner_payouts.len() as u64);
        for payout in &self.miner_payouts {
            payout.value.binary_encode(encoder);
            encoder.write_hash(payout.unlock_hash.as_bytes());
        }
        encoder.write_varint(self.transactions.len() as u64);
        for transaction in &self.transactions {
            transaction.binary_encode(encoder);
        }
    }
}
