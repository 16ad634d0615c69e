//! Persisted explorer state and global chain statistics.

use quartz_primitives::{ConsensusChangeId, Currency};
use serde::{Deserialize, Serialize};

/// Stored under `state`; read back on startup to resume the consensus
/// subscription where the previous run left off.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExplorerState {
    #[serde(default, rename = "currentchangeid")]
    pub current_change_id: ConsensusChangeId,
    /// Most recently promoted time bucket; bounds the maturation walk.
    #[serde(default, rename = "lasttimebucket")]
    pub last_time_bucket: u64,
}

/// Stored under `stats`; every field is an absolute value recomputed
/// per change, never an increment.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, rename = "blockHeight")]
    pub block_height: u64,
    #[serde(default, rename = "txCount")]
    pub tx_count: u64,
    #[serde(default, rename = "valueTxCount")]
    pub value_tx_count: u64,
    #[serde(default, rename = "coinOutputCount")]
    pub coin_output_count: u64,
    #[serde(default, rename = "coinInputCount")]
    pub coin_input_count: u64,
    #[serde(default, rename = "minerPayoutCount")]
    pub miner_payout_count: u64,
    #[serde(default, rename = "minerPayouts")]
    pub miner_payouts: Currency,
    #[serde(default)]
    pub coins: Currency,
}
