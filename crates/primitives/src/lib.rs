//! Core chain types: currency, addresses, conditions, outputs, blocks.

pub mod address;
pub mod block;
pub mod change;
pub mod condition;
pub mod currency;
pub mod encoding;
pub mod hash;
pub mod transaction;

mod hash_hex;

pub use address::Address;
pub use block::{Block, BlockId, MinerPayout};
pub use change::{ConsensusChange, ConsensusChangeId};
pub use condition::{LockKind, UnlockCondition};
pub use currency::Currency;
pub use transaction::{
    BlockStakeOutput, CoinInput, CoinOutput, CoinOutputId, Transaction, TransactionId,
};
