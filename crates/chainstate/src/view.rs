//! Read-through working view over the datastore for one consensus
//! change. Every mutation stays in memory until `into_batch` renders
//! the whole change as a single atomic write batch whose final two ops
//! persist `stats` and `state`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use quartz_consensus::{hash256_to_hex, Hash256};
use quartz_primitives::{Address, CoinOutputId, Currency};
use quartz_storage::{get_json, to_json_vec, Datastore, KeySpace, WriteBatch};

use crate::balance::Balance;
use crate::lock::LockedOutputRecord;
use crate::stats::{ExplorerState, NetworkStats};
use crate::ucos::UnspentOutputRecord;
use crate::undo::BlockUndo;
use crate::ProjectionError;

enum BucketOp {
    Add,
    Remove,
}

struct BucketCache {
    /// Current membership as seen by this change.
    records: Vec<LockedOutputRecord>,
    /// Mutations in arrival order; replayed verbatim into the batch.
    ops: Vec<(BucketOp, LockedOutputRecord)>,
}

pub struct StateView<'a, S> {
    store: &'a S,
    keys: &'a KeySpace,
    balances: HashMap<Address, Balance>,
    dirty_balances: BTreeSet<Address>,
    new_addresses: BTreeSet<Address>,
    multisig_links: BTreeSet<(Address, Address)>,
    unspent: HashMap<CoinOutputId, Option<UnspentOutputRecord>>,
    dirty_unspent: BTreeSet<CoinOutputId>,
    lock_buckets: BTreeMap<String, BucketCache>,
    locked_json: BTreeMap<(Address, CoinOutputId), Option<Vec<u8>>>,
    undo_writes: BTreeMap<Hash256, Option<BlockUndo>>,
}

impl<'a, S: Datastore> StateView<'a, S> {
    pub fn new(store: &'a S, keys: &'a KeySpace) -> Self {
        Self {
            store,
            keys,
            balances: HashMap::new(),
            dirty_balances: BTreeSet::new(),
            new_addresses: BTreeSet::new(),
            multisig_links: BTreeSet::new(),
            unspent: HashMap::new(),
            dirty_unspent: BTreeSet::new(),
            lock_buckets: BTreeMap::new(),
            locked_json: BTreeMap::new(),
            undo_writes: BTreeMap::new(),
        }
    }

    pub fn keys(&self) -> &KeySpace {
        self.keys
    }

    fn load_balance(&mut self, address: &Address) -> Result<(), ProjectionError> {
        if self.balances.contains_key(address) {
            return Ok(());
        }
        let key = self.keys.address_balance(&address.hex());
        let balance: Balance = get_json(self.store, key.as_bytes())?;
        self.balances.insert(*address, balance);
        Ok(())
    }

    pub fn credit_unlocked(
        &mut self,
        address: &Address,
        amount: Currency,
    ) -> Result<(), ProjectionError> {
        self.load_balance(address)?;
        let balance = self.balances.get_mut(address).expect("balance loaded");
        balance.unlocked = balance
            .unlocked
            .checked_add(amount)
            .ok_or_else(|| overflow(address))?;
        self.dirty_balances.insert(*address);
        Ok(())
    }

    pub fn debit_unlocked(
        &mut self,
        address: &Address,
        amount: Currency,
    ) -> Result<(), ProjectionError> {
        self.load_balance(address)?;
        let balance = self.balances.get_mut(address).expect("balance loaded");
        balance.unlocked = balance.unlocked.checked_sub(amount).ok_or_else(|| {
            ProjectionError::Invariant(format!("unlocked balance of {address} drops below zero"))
        })?;
        self.dirty_balances.insert(*address);
        Ok(())
    }

    pub fn credit_locked(
        &mut self,
        address: &Address,
        amount: Currency,
    ) -> Result<(), ProjectionError> {
        self.load_balance(address)?;
        let balance = self.balances.get_mut(address).expect("balance loaded");
        balance.locked = balance
            .locked
            .checked_add(amount)
            .ok_or_else(|| overflow(address))?;
        self.dirty_balances.insert(*address);
        Ok(())
    }

    pub fn debit_locked(
        &mut self,
        address: &Address,
        amount: Currency,
    ) -> Result<(), ProjectionError> {
        self.load_balance(address)?;
        let balance = self.balances.get_mut(address).expect("balance loaded");
        balance.locked = balance.locked.checked_sub(amount).ok_or_else(|| {
            ProjectionError::Invariant(format!("locked balance of {address} drops below zero"))
        })?;
        self.dirty_balances.insert(*address);
        Ok(())
    }

    /// Membership in the global address set; append-only.
    pub fn record_address(&mut self, address: &Address) {
        self.new_addresses.insert(*address);
    }

    /// Links a multisig wallet with its owners, both directions. The
    /// link sets never shrink.
    pub fn link_multisig(&mut self, wallet: &Address, owners: &[Address]) {
        self.record_address(wallet);
        for owner in owners {
            self.record_address(owner);
            self.multisig_links.insert((*wallet, *owner));
            self.multisig_links.insert((*owner, *wallet));
        }
    }

    pub fn unspent_output(
        &mut self,
        id: &CoinOutputId,
    ) -> Result<Option<UnspentOutputRecord>, ProjectionError> {
        if let Some(entry) = self.unspent.get(id) {
            return Ok(entry.clone());
        }
        let key = self.keys.unspent_outputs();
        let field = hash256_to_hex(id);
        let entry = match self.store.hash_get(key.as_bytes(), field.as_bytes())? {
            Some(bytes) => Some(UnspentOutputRecord::decode(&bytes).map_err(|err| {
                ProjectionError::Codec(format!("invalid unspent record {field}: {err}"))
            })?),
            None => None,
        };
        self.unspent.insert(*id, entry.clone());
        Ok(entry)
    }

    pub fn put_unspent_output(&mut self, id: &CoinOutputId, record: UnspentOutputRecord) {
        self.unspent.insert(*id, Some(record));
        self.dirty_unspent.insert(*id);
    }

    pub fn remove_unspent_output(&mut self, id: &CoinOutputId) {
        self.unspent.insert(*id, None);
        self.dirty_unspent.insert(*id);
    }

    fn load_bucket(&mut self, key: &str) -> Result<(), ProjectionError> {
        if self.lock_buckets.contains_key(key) {
            return Ok(());
        }
        let members = self.store.set_members(key.as_bytes())?;
        let mut records = Vec::with_capacity(members.len());
        for member in members {
            records.push(LockedOutputRecord::decode(&member).map_err(|err| {
                ProjectionError::Codec(format!("invalid locked output record in {key}: {err}"))
            })?);
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        self.lock_buckets.insert(
            key.to_string(),
            BucketCache {
                records,
                ops: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn bucket_records(
        &mut self,
        key: &str,
    ) -> Result<Vec<LockedOutputRecord>, ProjectionError> {
        self.load_bucket(key)?;
        Ok(self.lock_buckets[key].records.clone())
    }

    pub fn bucket_add(
        &mut self,
        key: &str,
        record: LockedOutputRecord,
    ) -> Result<(), ProjectionError> {
        self.load_bucket(key)?;
        let bucket = self.lock_buckets.get_mut(key).expect("bucket loaded");
        bucket.records.push(record.clone());
        bucket.ops.push((BucketOp::Add, record));
        Ok(())
    }

    pub fn bucket_remove(
        &mut self,
        key: &str,
        record: &LockedOutputRecord,
    ) -> Result<(), ProjectionError> {
        self.load_bucket(key)?;
        let bucket = self.lock_buckets.get_mut(key).expect("bucket loaded");
        bucket.records.retain(|existing| existing.id != record.id);
        bucket.ops.push((BucketOp::Remove, record.clone()));
        Ok(())
    }

    pub fn locked_output_json(
        &mut self,
        address: &Address,
        id: &CoinOutputId,
    ) -> Result<Option<Vec<u8>>, ProjectionError> {
        if let Some(entry) = self.locked_json.get(&(*address, *id)) {
            return Ok(entry.clone());
        }
        let key = self.keys.address_locked_outputs(&address.hex());
        let field = hash256_to_hex(id);
        Ok(self.store.hash_get(key.as_bytes(), field.as_bytes())?)
    }

    pub fn put_locked_output_json(
        &mut self,
        address: &Address,
        id: &CoinOutputId,
        json: Vec<u8>,
    ) {
        self.locked_json.insert((*address, *id), Some(json));
    }

    pub fn remove_locked_output_json(&mut self, address: &Address, id: &CoinOutputId) {
        self.locked_json.insert((*address, *id), None);
    }

    pub fn block_undo(&mut self, block_id: &Hash256) -> Result<Option<BlockUndo>, ProjectionError> {
        if let Some(entry) = self.undo_writes.get(block_id) {
            return Ok(entry.clone());
        }
        let key = self.keys.block_undo(&hash256_to_hex(block_id));
        match self.store.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(BlockUndo::decode(&bytes).map_err(|err| {
                ProjectionError::Codec(format!(
                    "invalid undo record for block {}: {err}",
                    hash256_to_hex(block_id)
                ))
            })?)),
            None => Ok(None),
        }
    }

    pub fn put_block_undo(&mut self, block_id: Hash256, undo: BlockUndo) {
        self.undo_writes.insert(block_id, Some(undo));
    }

    pub fn delete_block_undo(&mut self, block_id: &Hash256) {
        self.undo_writes.insert(*block_id, None);
    }

    /// Renders every pending mutation. `stats` and `state` are the
    /// final two ops so the change id only lands once the rest does.
    pub fn into_batch(
        self,
        stats: &NetworkStats,
        state: &ExplorerState,
    ) -> Result<WriteBatch, ProjectionError> {
        let mut batch = WriteBatch::new();

        let addresses_key = self.keys.addresses();
        for address in &self.new_addresses {
            batch.set_add(addresses_key.clone(), address.hex());
        }
        for (holder, member) in &self.multisig_links {
            batch.set_add(self.keys.address_multisig(&holder.hex()), member.hex());
        }

        for address in &self.dirty_balances {
            let key = self.keys.address_balance(&address.hex());
            let balance = self.balances.get(address).expect("dirty balance loaded");
            if balance.is_zero() {
                batch.delete(key);
            } else {
                batch.put(key, to_json_vec(balance)?);
            }
        }

        let ucos_key = self.keys.unspent_outputs();
        for id in &self.dirty_unspent {
            let field = hash256_to_hex(id);
            match self.unspent.get(id).expect("dirty unspent loaded") {
                Some(record) => batch.hash_put(ucos_key.clone(), field, record.encode()),
                None => batch.hash_delete(ucos_key.clone(), field),
            }
        }

        for (key, bucket) in &self.lock_buckets {
            for (op, record) in &bucket.ops {
                match op {
                    BucketOp::Add => batch.set_add(key.clone(), record.encode()),
                    BucketOp::Remove => batch.set_remove(key.clone(), record.encode()),
                }
            }
        }

        for ((address, id), entry) in &self.locked_json {
            let key = self.keys.address_locked_outputs(&address.hex());
            let field = hash256_to_hex(id);
            match entry {
                Some(json) => batch.hash_put(key, field, json.clone()),
                None => batch.hash_delete(key, field),
            }
        }

        for (block_id, entry) in &self.undo_writes {
            let key = self.keys.block_undo(&hash256_to_hex(block_id));
            match entry {
                Some(undo) => batch.put(key, undo.encode()),
                None => batch.delete(key),
            }
        }

        batch.put(self.keys.stats(), to_json_vec(stats)?);
        batch.put(self.keys.state(), to_json_vec(state)?);
        Ok(batch)
    }
}

fn overflow(address: &Address) -> ProjectionError {
    ProjectionError::Invariant(format!("balance overflow for {address}"))
}
