//! The lock index: outputs waiting on a height or timestamp, and their
//! promotion into unlocked balances.

use quartz_consensus::constants::time_bucket;
use quartz_consensus::hash256_to_hex;
use quartz_primitives::condition::LockKind;
use quartz_primitives::currency::Currency;
use quartz_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use quartz_primitives::{Address, CoinOutputId};
use quartz_storage::{Datastore, KeySpace};

use crate::ucos::{OutputLock, UnspentOutputRecord};
use crate::undo::PromotedOutput;
use crate::view::StateView;
use crate::ProjectionError;

/// Member encoding of the `lcos.height:<H>` and `lcos.time:<B>` sets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockedOutputRecord {
    pub id: CoinOutputId,
    pub address: Address,
    pub value: Currency,
    pub kind: LockKind,
    pub unlock_point: u64,
}

impl LockedOutputRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_hash(&self.id);
        self.address.binary_encode(&mut encoder);
        self.value.binary_encode(&mut encoder);
        encoder.write_u8(self.kind.as_u8());
        encoder.write_u64_le(self.unlock_point);
        encoder.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let id = decoder.read_hash()?;
        let address = Address::binary_decode(&mut decoder)?;
        let value = Currency::binary_decode(&mut decoder)?;
        let kind = LockKind::from_u8(decoder.read_u8()?)
            .ok_or(DecodeError::InvalidData("invalid lock kind"))?;
        let unlock_point = decoder.read_u64_le()?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            id,
            address,
            value,
            kind,
            unlock_point,
        })
    }

    pub fn bucket_key(&self, keys: &KeySpace) -> String {
        match self.kind {
            LockKind::Height => keys.locked_at_height(self.unlock_point),
            LockKind::Time => keys.locked_in_time_bucket(time_bucket(self.unlock_point)),
        }
    }

    fn matured_at(&self, height: u64, timestamp: u64) -> bool {
        match self.kind {
            LockKind::Height => self.unlock_point <= height,
            LockKind::Time => self.unlock_point <= timestamp,
        }
    }
}

/// Inserts a locked output: bucket membership, locked balance, the
/// per-address `outputs.locked` entry, and the unspent record.
pub fn add_locked<S: Datastore>(
    view: &mut StateView<'_, S>,
    id: CoinOutputId,
    address: Address,
    value: Currency,
    kind: LockKind,
    unlock_point: u64,
    output_json: Vec<u8>,
) -> Result<(), ProjectionError> {
    let record = LockedOutputRecord {
        id,
        address,
        value,
        kind,
        unlock_point,
    };
    view.record_address(&address);
    view.credit_locked(&address, value)?;
    let key = record.bucket_key(view.keys());
    view.bucket_add(&key, record)?;
    view.put_locked_output_json(&address, &id, output_json);
    view.put_unspent_output(
        &id,
        UnspentOutputRecord {
            address,
            value,
            lock: Some(OutputLock { kind, unlock_point }),
        },
    );
    Ok(())
}

/// Removes a still-locked output again (revert of the creating block).
pub fn remove_locked<S: Datastore>(
    view: &mut StateView<'_, S>,
    id: &CoinOutputId,
    record: &UnspentOutputRecord,
) -> Result<(), ProjectionError> {
    let lock = record.lock.ok_or_else(|| {
        ProjectionError::Invariant(format!("output {} is not locked", hash256_to_hex(id)))
    })?;
    let locked = LockedOutputRecord {
        id: *id,
        address: record.address,
        value: record.value,
        kind: lock.kind,
        unlock_point: lock.unlock_point,
    };
    view.debit_locked(&record.address, record.value)?;
    let key = locked.bucket_key(view.keys());
    view.bucket_remove(&key, &locked)?;
    view.remove_locked_output_json(&record.address, id);
    view.remove_unspent_output(id);
    Ok(())
}

/// Promotes every record matured at `(height, timestamp)`. Returns the
/// promoted outputs for the block's undo record and the new time bucket
/// cursor.
///
/// Height buckets are exact: promotion runs once per applied block and
/// the height advances one step at a time, so only the bucket of the
/// current height can hold matured records. Time buckets are walked
/// from the cursor up to the bucket of the current timestamp.
pub fn promote<S: Datastore>(
    view: &mut StateView<'_, S>,
    height: u64,
    timestamp: u64,
    last_time_bucket: u64,
) -> Result<(Vec<PromotedOutput>, u64), ProjectionError> {
    let mut promoted = Vec::new();

    let height_key = view.keys().locked_at_height(height);
    promote_bucket(view, &height_key, height, timestamp, &mut promoted)?;

    let current = time_bucket(timestamp);
    // A zero cursor means nothing was ever promoted; no time-locked
    // record can predate the first block.
    let start = if last_time_bucket == 0 {
        current
    } else {
        last_time_bucket.min(current)
    };
    for bucket in start..=current {
        let key = view.keys().locked_in_time_bucket(bucket);
        promote_bucket(view, &key, height, timestamp, &mut promoted)?;
    }

    Ok((promoted, current))
}

fn promote_bucket<S: Datastore>(
    view: &mut StateView<'_, S>,
    key: &str,
    height: u64,
    timestamp: u64,
    promoted: &mut Vec<PromotedOutput>,
) -> Result<(), ProjectionError> {
    for record in view.bucket_records(key)? {
        if !record.matured_at(height, timestamp) {
            continue;
        }
        view.debit_locked(&record.address, record.value)?;
        view.credit_unlocked(&record.address, record.value)?;
        view.bucket_remove(key, &record)?;
        let output_json = view
            .locked_output_json(&record.address, &record.id)?
            .ok_or_else(|| {
                ProjectionError::Invariant(format!(
                    "locked output {} has no stored coin output",
                    hash256_to_hex(&record.id)
                ))
            })?;
        view.remove_locked_output_json(&record.address, &record.id);
        let unspent = view.unspent_output(&record.id)?.ok_or_else(|| {
            ProjectionError::Invariant(format!(
                "locked output {} has no unspent record",
                hash256_to_hex(&record.id)
            ))
        })?;
        if unspent.lock.is_none() {
            return Err(ProjectionError::Invariant(format!(
                "output {} is already unlocked",
                hash256_to_hex(&record.id)
            )));
        }
        view.put_unspent_output(
            &record.id,
            UnspentOutputRecord {
                lock: None,
                ..unspent
            },
        );
        promoted.push(PromotedOutput {
            record,
            output_json,
        });
    }
    Ok(())
}

/// Puts a promoted output back into the lock index (revert of the
/// promoting block).
pub fn relock<S: Datastore>(
    view: &mut StateView<'_, S>,
    promoted: &PromotedOutput,
) -> Result<(), ProjectionError> {
    let record = &promoted.record;
    view.debit_unlocked(&record.address, record.value)?;
    view.credit_locked(&record.address, record.value)?;
    let key = record.bucket_key(view.keys());
    view.bucket_add(&key, record.clone())?;
    view.put_locked_output_json(&record.address, &record.id, promoted.output_json.clone());
    let unspent = view.unspent_output(&record.id)?.ok_or_else(|| {
        ProjectionError::Invariant(format!(
            "relocked output {} has no unspent record",
            hash256_to_hex(&record.id)
        ))
    })?;
    view.put_unspent_output(
        &record.id,
        UnspentOutputRecord {
            lock: Some(OutputLock {
                kind: record.kind,
                unlock_point: record.unlock_point,
            }),
            ..unspent
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_storage::KeySpace;

    #[test]
    fn record_roundtrip() {
        let record = LockedOutputRecord {
            id: [8u8; 32],
            address: Address::new([9u8; 32]),
            value: Currency::from(55u64),
            kind: LockKind::Time,
            unlock_point: 1_700_000_123,
        };
        let decoded = LockedOutputRecord::decode(&record.encode()).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn bucket_keys_follow_lock_kind() {
        let keys = KeySpace::new("quartz", "standard");
        let height_record = LockedOutputRecord {
            id: [0u8; 32],
            address: Address::new([1u8; 32]),
            value: Currency::from(1u64),
            kind: LockKind::Height,
            unlock_point: 4_000,
        };
        assert_eq!(
            height_record.bucket_key(&keys),
            "quartz:standard:lcos.height:4000"
        );
        let time_record = LockedOutputRecord {
            kind: LockKind::Time,
            unlock_point: 1_700_012_345,
            ..height_record
        };
        assert_eq!(
            time_record.bucket_key(&keys),
            "quartz:standard:lcos.time:17000"
        );
    }
}
