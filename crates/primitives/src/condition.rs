//! Spend conditions and their inspection surface.

use quartz_consensus::constants::LOCK_TIME_MIN_TIMESTAMP;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::encoding::{Encodable, Encoder};
use crate::hash::sha256;

pub const CONDITION_TYPE_UNLOCK_HASH: u8 = 1;
pub const CONDITION_TYPE_TIME_LOCK: u8 = 3;
pub const CONDITION_TYPE_MULTISIG: u8 = 4;

/// How a time lock's unlock point is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockKind {
    Height,
    Time,
}

impl LockKind {
    /// Unlock points below `LOCK_TIME_MIN_TIMESTAMP` are block heights.
    pub fn classify(lock_time: u64) -> Self {
        if lock_time < LOCK_TIME_MIN_TIMESTAMP {
            LockKind::Height
        } else {
            LockKind::Time
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            LockKind::Height => 0,
            LockKind::Time => 1,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LockKind::Height),
            1 => Some(LockKind::Time),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum UnlockCondition {
    UnlockHash(Address),
    MultiSignature {
        unlock_hashes: Vec<Address>,
        minimum_signatures: u64,
    },
    TimeLock {
        lock_time: u64,
        condition: Box<UnlockCondition>,
    },
}

impl UnlockCondition {
    /// The address the condition pays out to. For a multi-signature
    /// condition this is the wallet address derived from the condition
    /// itself; owner order must not change it.
    pub fn unlock_hash(&self) -> Address {
        match self {
            UnlockCondition::UnlockHash(address) => *address,
            UnlockCondition::TimeLock { condition, .. } => condition.unlock_hash(),
            UnlockCondition::MultiSignature {
                unlock_hashes,
                minimum_signatures,
            } => {
                let mut sorted: Vec<&Address> = unlock_hashes.iter().collect();
                sorted.sort();
                let mut encoder = Encoder::new();
                encoder.write_u8(CONDITION_TYPE_MULTISIG);
                encoder.write_u64_le(*minimum_signatures);
                encoder.write_varint(sorted.len() as u64);
                for address in sorted {
                    encoder.write_hash(address.as_bytes());
                }
                Address::new(sha256(&encoder.into_inner()))
            }
        }
    }

    /// Whether the time/height predicate holds at the evaluation point,
    /// independent of signature checks.
    pub fn fulfillable_at(&self, height: u64, timestamp: u64) -> bool {
        match self {
            UnlockCondition::UnlockHash(_) | UnlockCondition::MultiSignature { .. } => true,
            UnlockCondition::TimeLock {
                lock_time,
                condition,
            } => {
                let unlocked = match LockKind::classify(*lock_time) {
                    LockKind::Height => height >= *lock_time,
                    LockKind::Time => timestamp >= *lock_time,
                };
                unlocked && condition.fulfillable_at(height, timestamp)
            }
        }
    }

    /// The owner addresses of a multi-signature condition, looking
    /// through a time-lock wrapper.
    pub fn multisig_unlock_hashes(&self) -> Option<&[Address]> {
        match self {
            UnlockCondition::MultiSignature { unlock_hashes, .. } => Some(unlock_hashes),
            UnlockCondition::TimeLock { condition, .. } => condition.multisig_unlock_hashes(),
            UnlockCondition::UnlockHash(_) => None,
        }
    }

    /// The unlock point and kind of a time-locked condition.
    pub fn time_lock(&self) -> Option<(LockKind, u64)> {
        match self {
            UnlockCondition::TimeLock { lock_time, .. } => {
                Some((LockKind::classify(*lock_time), *lock_time))
            }
            _ => None,
        }
    }
}

impl Encodable for UnlockCondition {
    fn binary_encode(&self, encoder: &mut Encoder) {
        match self {
            UnlockCondition::UnlockHash(address) => {
                encoder.write_u8(CONDITION_TYPE_UNLOCK_HASH);
                encoder.write_hash(address.as_bytes());
            }
            UnlockCondition::MultiSignature {
                unlock_hashes,
                minimum_signatures,
            } => {
                encoder.write_u8(CONDITION_TYPE_MULTISIG);
                encoder.write_u64_le(*minimum_signatures);
                encoder.write_varint(unlock_hashes.len() as u64);
                for address in unlock_hashes {
                    encoder.write_hash(address.as_bytes());
                }
            }
            UnlockCondition::TimeLock {
                lock_time,
                condition,
            } => {
                encoder.write_u8(CONDITION_TYPE_TIME_LOCK);
                encoder.write_u64_le(*lock_time);
                condition.binary_encode(encoder);
            }
        }
    }
}

// Wire form: the chain's tagged `{"type": N, "data": {...}}` encoding.

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RawCondition {
    #[serde(rename = "type", default)]
    kind: u8,
    #[serde(default, skip_serializing_if = "RawConditionData::is_empty")]
    data: RawConditionData,
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct RawConditionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unlockhash: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locktime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Box<RawCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unlockhashes: Option<Vec<Address>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimumsignaturecount: Option<u64>,
}

impl RawConditionData {
    fn is_empty(&self) -> bool {
        self.unlockhash.is_none()
            && self.locktime.is_none()
            && self.condition.is_none()
            && self.unlockhashes.is_none()
            && self.minimumsignaturecount.is_none()
    }
}

impl From<UnlockCondition> for RawCondition {
    fn from(condition: UnlockCondition) -> Self {
        match condition {
            UnlockCondition::UnlockHash(address) => RawCondition {
                kind: CONDITION_TYPE_UNLOCK_HASH,
                data: RawConditionData {
                    unlockhash: Some(address),
                    ..RawConditionData::default()
                },
            },
            UnlockCondition::MultiSignature {
                unlock_hashes,
                minimum_signatures,
            } => RawCondition {
                kind: CONDITION_TYPE_MULTISIG,
                data: RawConditionData {
                    unlockhashes: Some(unlock_hashes),
                    minimumsignaturecount: Some(minimum_signatures),
                    ..RawConditionData::default()
                },
            },
            UnlockCondition::TimeLock {
                lock_time,
                condition,
            } => RawCondition {
                kind: CONDITION_TYPE_TIME_LOCK,
                data: RawConditionData {
                    locktime: Some(lock_time),
                    condition: Some(Box::new(RawCondition::from(*condition))),
                    ..RawConditionData::default()
                },
            },
        }
    }
}

impl TryFrom<RawCondition> for UnlockCondition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw.kind {
            CONDITION_TYPE_UNLOCK_HASH => {
                let address = raw
                    .data
                    .unlockhash
                    .ok_or_else(|| "unlock hash condition misses unlockhash".to_string())?;
                Ok(UnlockCondition::UnlockHash(address))
            }
            CONDITION_TYPE_MULTISIG => {
                let unlock_hashes = raw
                    .data
                    .unlockhashes
                    .ok_or_else(|| "multisig condition misses unlockhashes".to_string())?;
                let minimum_signatures = raw
                    .data
                    .minimumsignaturecount
                    .ok_or_else(|| "multisig condition misses minimumsignaturecount".to_string())?;
                if minimum_signatures == 0 || minimum_signatures > unlock_hashes.len() as u64 {
                    return Err("multisig signature count out of range".to_string());
                }
                Ok(UnlockCondition::MultiSignature {
                    unlock_hashes,
                    minimum_signatures,
                })
            }
            CONDITION_TYPE_TIME_LOCK => {
                let lock_time = raw
                    .data
                    .locktime
                    .ok_or_else(|| "time lock condition misses locktime".to_string())?;
                let inner = raw
                    .data
                    .condition
                    .ok_or_else(|| "time lock condition misses inner condition".to_string())?;
                let condition = UnlockCondition::try_from(*inner)?;
                if matches!(condition, UnlockCondition::TimeLock { .. }) {
                    return Err("time lock cannot wrap another time lock".to_string());
                }
                Ok(UnlockCondition::TimeLock {
                    lock_time,
                    condition: Box::new(condition),
                })
            }
            other => Err(format!("unknown condition type {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::new([tag; 32])
    }

    #[test]
    fn classify_lock_time() {
        assert_eq!(LockKind::classify(0), LockKind::Height);
        assert_eq!(LockKind::classify(499_999_999), LockKind::Height);
        assert_eq!(LockKind::classify(500_000_000), LockKind::Time);
    }

    #[test]
    fn multisig_wallet_address_ignores_owner_order() {
        let forward = UnlockCondition::MultiSignature {
            unlock_hashes: vec![addr(1), addr(2)],
            minimum_signatures: 2,
        };
        let backward = UnlockCondition::MultiSignature {
            unlock_hashes: vec![addr(2), addr(1)],
            minimum_signatures: 2,
        };
        assert_eq!(forward.unlock_hash(), backward.unlock_hash());
        assert_ne!(forward.unlock_hash(), addr(1));
    }

    #[test]
    fn time_lock_fulfillable() {
        let height_locked = UnlockCondition::TimeLock {
            lock_time: 100,
            condition: Box::new(UnlockCondition::UnlockHash(addr(7))),
        };
        assert!(!height_locked.fulfillable_at(99, 0));
        assert!(height_locked.fulfillable_at(100, 0));

        let time_locked = UnlockCondition::TimeLock {
            lock_time: 600_000_000,
            condition: Box::new(UnlockCondition::UnlockHash(addr(7))),
        };
        assert!(!time_locked.fulfillable_at(1_000, 599_999_999));
        assert!(time_locked.fulfillable_at(1_000, 600_000_000));
    }

    #[test]
    fn owners_seen_through_time_lock() {
        let condition = UnlockCondition::TimeLock {
            lock_time: 4_000,
            condition: Box::new(UnlockCondition::MultiSignature {
                unlock_hashes: vec![addr(1), addr(2)],
                minimum_signatures: 1,
            }),
        };
        let owners = condition.multisig_unlock_hashes().expect("owners");
        assert_eq!(owners, &[addr(1), addr(2)]);
    }
}
