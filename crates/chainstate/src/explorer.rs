//! The projection engine: consumes consensus changes one at a time and
//! keeps the datastore an exact function of the consensus tip.

use quartz_consensus::constants::time_bucket;
use quartz_consensus::{hash256_to_hex, ChainParams};
use quartz_primitives::condition::{LockKind, UnlockCondition};
use quartz_primitives::{
    Block, CoinOutput, CoinOutputId, ConsensusChange, ConsensusChangeId, Currency,
};
use quartz_storage::{get_json, to_json_vec, Datastore, KeySpace};

use crate::lock;
use crate::stats::{ExplorerState, NetworkStats};
use crate::ucos::UnspentOutputRecord;
use crate::undo::{BlockUndo, SpentOutput};
use crate::view::StateView;
use crate::ProjectionError;

pub struct Explorer<S> {
    store: S,
    keys: KeySpace,
    params: ChainParams,
    state: ExplorerState,
    stats: NetworkStats,
}

impl<S: Datastore> Explorer<S> {
    /// Loads the persisted state and statistics; a fresh datastore
    /// yields a projection positioned at the beginning of the chain.
    pub fn open(store: S, params: ChainParams) -> Result<Self, ProjectionError> {
        let keys = KeySpace::new(params.chain_name, params.network.name());
        let state: ExplorerState = get_json(&store, keys.state().as_bytes())?;
        let stats: NetworkStats = get_json(&store, keys.stats().as_bytes())?;
        Ok(Self {
            store,
            keys,
            params,
            state,
            stats,
        })
    }

    /// Where the consensus subscription should resume.
    pub fn current_change_id(&self) -> ConsensusChangeId {
        self.state.current_change_id
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Projects one consensus change. All mutations, the updated stats,
    /// and the new change id land in a single atomic batch; on error
    /// the datastore is untouched and the change may be re-delivered.
    pub fn process_consensus_change(
        &mut self,
        change: &ConsensusChange,
    ) -> Result<(), ProjectionError> {
        let mut run = ChangeRun {
            view: StateView::new(&self.store, &self.keys),
            stats: self.stats.clone(),
            state: self.state.clone(),
            params: &self.params,
        };

        for block in &change.reverted_blocks {
            run.revert_block(block)?;
        }
        for block in &change.applied_blocks {
            run.apply_block(block)?;
        }

        run.state.current_change_id = change.id;
        let ChangeRun {
            view, stats, state, ..
        } = run;
        let batch = view.into_batch(&stats, &state)?;
        self.store.write_batch(&batch)?;

        self.stats = stats;
        self.state = state;
        Ok(())
    }
}

struct ChangeRun<'a, S: Datastore> {
    view: StateView<'a, S>,
    stats: NetworkStats,
    state: ExplorerState,
    params: &'a ChainParams,
}

impl<S: Datastore> ChangeRun<'_, S> {
    fn apply_block(&mut self, block: &Block) -> Result<(), ProjectionError> {
        let mut undo = BlockUndo {
            prev_timestamp: self.stats.timestamp,
            ..BlockUndo::default()
        };

        if !block.is_genesis() {
            self.stats.block_height += 1;
        }
        self.stats.timestamp = block.timestamp;

        // Maturation runs before the block's own payouts and
        // transactions, so nothing locked in this block promotes in the
        // same step.
        let (promoted, bucket) = lock::promote(
            &mut self.view,
            self.stats.block_height,
            self.stats.timestamp,
            self.state.last_time_bucket,
        )?;
        undo.promoted = promoted;
        self.state.last_time_bucket = bucket;

        for (index, payout) in block.miner_payouts.iter().enumerate() {
            self.stats.miner_payout_count += 1;
            self.stats.miner_payouts =
                add_currency(self.stats.miner_payouts, payout.value, "miner payouts")?;
            // Payouts and genesis outputs are the only ways coins enter
            // circulation.
            self.stats.coins = add_currency(self.stats.coins, payout.value, "coins")?;
            let id = block.miner_payout_id(index as u64);
            let output = CoinOutput {
                value: payout.value,
                condition: UnlockCondition::TimeLock {
                    lock_time: self.stats.block_height + self.params.maturity_delay,
                    condition: Box::new(UnlockCondition::UnlockHash(payout.unlock_hash)),
                },
            };
            self.add_coin_output(id, &output)?;
        }

        for tx in &block.transactions {
            self.stats.tx_count += 1;
            if tx.is_value_transaction() {
                self.stats.value_tx_count += 1;
            }
            for input in &tx.coin_inputs {
                self.stats.coin_input_count += 1;
                self.spend_coin_output(&input.parent_id, &mut undo)?;
            }
            for (index, output) in tx.coin_outputs.iter().enumerate() {
                self.stats.coin_output_count += 1;
                if block.is_genesis() {
                    self.stats.coins = add_currency(self.stats.coins, output.value, "coins")?;
                }
                self.add_coin_output(tx.coin_output_id(index as u64), output)?;
            }
        }

        self.view.put_block_undo(block.id(), undo);
        Ok(())
    }

    /// The exact inverse of `apply_block`. Transactions unwind in
    /// reverse so an output spent later in the block exists again
    /// before its creation is removed.
    fn revert_block(&mut self, block: &Block) -> Result<(), ProjectionError> {
        let block_id = block.id();
        let mut undo = self.view.block_undo(&block_id)?.ok_or_else(|| {
            ProjectionError::Invariant(format!(
                "reverted block {} has no undo record",
                hash256_to_hex(&block_id)
            ))
        })?;

        for tx in block.transactions.iter().rev() {
            self.stats.tx_count = sub_count(self.stats.tx_count, "transaction count")?;
            if tx.is_value_transaction() {
                self.stats.value_tx_count =
                    sub_count(self.stats.value_tx_count, "value transaction count")?;
            }
            for (index, output) in tx.coin_outputs.iter().enumerate().rev() {
                self.stats.coin_output_count =
                    sub_count(self.stats.coin_output_count, "coin output count")?;
                if block.is_genesis() {
                    self.stats.coins = sub_currency(self.stats.coins, output.value, "coins")?;
                }
                self.revert_coin_output(&tx.coin_output_id(index as u64))?;
            }
            for input in tx.coin_inputs.iter().rev() {
                self.stats.coin_input_count =
                    sub_count(self.stats.coin_input_count, "coin input count")?;
                let record = undo.take_spent(&input.parent_id).ok_or_else(|| {
                    ProjectionError::Invariant(format!(
                        "reverted input {} has no undo record",
                        hash256_to_hex(&input.parent_id)
                    ))
                })?;
                self.view.credit_unlocked(&record.address, record.value)?;
                self.view.put_unspent_output(&input.parent_id, record);
            }
        }

        for (index, payout) in block.miner_payouts.iter().enumerate().rev() {
            self.stats.miner_payout_count =
                sub_count(self.stats.miner_payout_count, "miner payout count")?;
            self.stats.miner_payouts =
                sub_currency(self.stats.miner_payouts, payout.value, "miner payouts")?;
            self.stats.coins = sub_currency(self.stats.coins, payout.value, "coins")?;
            self.revert_coin_output(&block.miner_payout_id(index as u64))?;
        }

        // Whatever this block's promotion matured goes back into the
        // lock index.
        for promoted in undo.promoted.iter().rev() {
            lock::relock(&mut self.view, promoted)?;
            if promoted.record.kind == LockKind::Time {
                self.lower_time_cursor(time_bucket(promoted.record.unlock_point));
            }
        }

        if !block.is_genesis() {
            self.stats.block_height = sub_count(self.stats.block_height, "block height")?;
        }
        self.stats.timestamp = undo.prev_timestamp;
        self.view.delete_block_undo(&block_id);
        Ok(())
    }

    fn add_coin_output(
        &mut self,
        id: CoinOutputId,
        output: &CoinOutput,
    ) -> Result<(), ProjectionError> {
        if let Some(owners) = output.condition.multisig_unlock_hashes() {
            let wallet = output.condition.unlock_hash();
            self.view.link_multisig(&wallet, owners);
        }

        let address = output.condition.unlock_hash();
        if output
            .condition
            .fulfillable_at(self.stats.block_height, self.stats.timestamp)
        {
            self.view.record_address(&address);
            self.view.credit_unlocked(&address, output.value)?;
            self.view.put_unspent_output(
                &id,
                UnspentOutputRecord {
                    address,
                    value: output.value,
                    lock: None,
                },
            );
            return Ok(());
        }

        // Only a time lock can defer fulfillment.
        let Some((kind, unlock_point)) = output.condition.time_lock() else {
            return Err(ProjectionError::Invariant(format!(
                "unfulfillable output {} carries no time lock",
                hash256_to_hex(&id)
            )));
        };
        let output_json = to_json_vec(output)?;
        lock::add_locked(
            &mut self.view,
            id,
            address,
            output.value,
            kind,
            unlock_point,
            output_json,
        )
    }

    fn spend_coin_output(
        &mut self,
        id: &CoinOutputId,
        undo: &mut BlockUndo,
    ) -> Result<(), ProjectionError> {
        let record = self.view.unspent_output(id)?.ok_or_else(|| {
            ProjectionError::Invariant(format!(
                "spent output {} has no unspent record",
                hash256_to_hex(id)
            ))
        })?;
        if record.lock.is_some() {
            return Err(ProjectionError::Invariant(format!(
                "spent output {} is still locked",
                hash256_to_hex(id)
            )));
        }
        self.view.debit_unlocked(&record.address, record.value)?;
        self.view.remove_unspent_output(id);
        undo.spent.push(SpentOutput { id: *id, record });
        Ok(())
    }

    fn revert_coin_output(&mut self, id: &CoinOutputId) -> Result<(), ProjectionError> {
        let record = self.view.unspent_output(id)?.ok_or_else(|| {
            ProjectionError::Invariant(format!(
                "reverted output {} has no unspent record",
                hash256_to_hex(id)
            ))
        })?;
        if record.lock.is_some() {
            return lock::remove_locked(&mut self.view, id, &record);
        }
        self.view.debit_unlocked(&record.address, record.value)?;
        self.view.remove_unspent_output(id);
        Ok(())
    }

    fn lower_time_cursor(&mut self, bucket: u64) {
        if self.state.last_time_bucket == 0 || bucket < self.state.last_time_bucket {
            self.state.last_time_bucket = bucket;
        }
    }
}

fn add_currency(
    total: Currency,
    amount: Currency,
    what: &str,
) -> Result<Currency, ProjectionError> {
    total
        .checked_add(amount)
        .ok_or_else(|| ProjectionError::Invariant(format!("{what} overflow")))
}

fn sub_currency(
    total: Currency,
    amount: Currency,
    what: &str,
) -> Result<Currency, ProjectionError> {
    total
        .checked_sub(amount)
        .ok_or_else(|| ProjectionError::Invariant(format!("{what} drops below zero")))
}

fn sub_count(counter: u64, what: &str) -> Result<u64, ProjectionError> {
    counter
        .checked_sub(1)
        .ok_or_else(|| ProjectionError::Invariant(format!("{what} drops below zero")))
}
