//! Per-block reversal records, written when a block is applied and
//! consumed when it is reverted.

use quartz_primitives::encoding::{DecodeError, Decoder, Encoder};
use quartz_primitives::CoinOutputId;

use crate::lock::LockedOutputRecord;
use crate::ucos::UnspentOutputRecord;

const BLOCK_UNDO_VERSION: u8 = 1;

/// An unspent record consumed by one of the block's coin inputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpentOutput {
    pub id: CoinOutputId,
    pub record: UnspentOutputRecord,
}

/// A lock-index record the block's promotion step matured, together
/// with the JSON coin output removed from `outputs.locked`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PromotedOutput {
    pub record: LockedOutputRecord,
    pub output_json: Vec<u8>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockUndo {
    /// Chain timestamp before the block was applied; reverting restores
    /// the post-revert tip's timestamp exactly.
    pub prev_timestamp: u64,
    pub spent: Vec<SpentOutput>,
    pub promoted: Vec<PromotedOutput>,
}

impl BlockUndo {
    pub fn take_spent(&mut self, id: &CoinOutputId) -> Option<UnspentOutputRecord> {
        let index = self.spent.iter().position(|entry| entry.id == *id)?;
        Some(self.spent.remove(index).record)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_u8(BLOCK_UNDO_VERSION);
        encoder.write_u64_le(self.prev_timestamp);
        encoder.write_varint(self.spent.len() as u64);
        for spent in &self.spent {
            encoder.write_hash(&spent.id);
            encoder.write_var_bytes(&spent.record.encode());
        }
        encoder.write_varint(self.promoted.len() as u64);
        for promoted in &self.promoted {
            encoder.write_var_bytes(&promoted.record.encode());
            encoder.write_var_bytes(&promoted.output_json);
        }
        encoder.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let version = decoder.read_u8()?;
        if version != BLOCK_UNDO_VERSION {
            return Err(DecodeError::InvalidData("unsupported block undo version"));
        }
        let prev_timestamp = decoder.read_u64_le()?;
        let spent_len = decoder.read_varint()? as usize;
        let mut spent = Vec::with_capacity(spent_len);
        for _ in 0..spent_len {
            let id = decoder.read_hash()?;
            let record_bytes = decoder.read_var_bytes()?;
            let record = UnspentOutputRecord::decode(&record_bytes)
                .map_err(|_| DecodeError::InvalidData("invalid unspent record in undo"))?;
            spent.push(SpentOutput { id, record });
        }
        let promoted_len = decoder.read_varint()? as usize;
        let mut promoted = Vec::with_capacity(promoted_len);
        for _ in 0..promoted_len {
            let record_bytes = decoder.read_var_bytes()?;
            let record = LockedOutputRecord::decode(&record_bytes)
                .map_err(|_| DecodeError::InvalidData("invalid locked record in undo"))?;
            let output_json = decoder.read_var_bytes()?;
            promoted.push(PromotedOutput {
                record,
                output_json,
            });
        }
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            prev_timestamp,
            spent,
            promoted,
        })
    }
}
