//! In-memory store with the same value-kind semantics as the external
//! one; used by every test.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use crate::{Datastore, StoreError, WriteBatch, WriteOp};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoredValue {
    Blob(Vec<u8>),
    Set(BTreeSet<Vec<u8>>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
}

type MemoryStoreMap = BTreeMap<Vec<u8>, StoredValue>;

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full copy of the store contents, for state-equality assertions
    /// in tests.
    pub fn snapshot(&self) -> MemoryStoreMap {
        let guard = self.inner.read().expect("memory store lock");
        guard.clone()
    }
}

fn wrong_kind(key: &[u8]) -> StoreError {
    StoreError::Backend(format!(
        "wrong value kind under key {}",
        String::from_utf8_lossy(key)
    ))
}

impl Datastore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.inner.read().expect("memory store lock");
        match guard.get(key) {
            None => Ok(None),
            Some(StoredValue::Blob(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_kind(key)),
        }
    }

    fn set_members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let guard = self.inner.read().expect("memory store lock");
        match guard.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_kind(key)),
        }
    }

    fn hash_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.inner.read().expect("memory store lock");
        match guard.get(key) {
            None => Ok(None),
            Some(StoredValue::Hash(fields)) => Ok(fields.get(field).cloned()),
            Some(_) => Err(wrong_kind(key)),
        }
    }

    fn hash_entries(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let guard = self.inner.read().expect("memory store lock");
        match guard.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::Hash(fields)) => Ok(fields
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            Some(_) => Err(wrong_kind(key)),
        }
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut guard = self.inner.write().expect("memory store lock");
        for op in batch.iter() {
            match op {
                WriteOp::Put { key, value } => {
                    guard.insert(
                        key.as_slice().to_vec(),
                        StoredValue::Blob(value.as_slice().to_vec()),
                    );
                }
                WriteOp::Delete { key } => {
                    guard.remove(key.as_slice());
                }
                WriteOp::SetAdd { key, member } => {
                    let entry = guard
                        .entry(key.as_slice().to_vec())
                        .or_insert_with(|| StoredValue::Set(BTreeSet::new()));
                    match entry {
                        StoredValue::Set(members) => {
                            members.insert(member.as_slice().to_vec());
                        }
                        _ => return Err(wrong_kind(key.as_slice())),
                    }
                }
                WriteOp::SetRemove { key, member } => {
                    let remove_key = match guard.get_mut(key.as_slice()) {
                        None => false,
                        Some(StoredValue::Set(members)) => {
                            members.remove(member.as_slice());
                            members.is_empty()
                        }
                        Some(_) => return Err(wrong_kind(key.as_slice())),
                    };
                    // An emptied set disappears, matching the external
                    // store's behavior.
                    if remove_key {
                        guard.remove(key.as_slice());
                    }
                }
                WriteOp::HashPut { key, field, value } => {
                    let entry = guard
                        .entry(key.as_slice().to_vec())
                        .or_insert_with(|| StoredValue::Hash(BTreeMap::new()));
                    match entry {
                        StoredValue::Hash(fields) => {
                            fields
                                .insert(field.as_slice().to_vec(), value.as_slice().to_vec());
                        }
                        _ => return Err(wrong_kind(key.as_slice())),
                    }
                }
                WriteOp::HashDelete { key, field } => {
                    let remove_key = match guard.get_mut(key.as_slice()) {
                        None => false,
                        Some(StoredValue::Hash(fields)) => {
                            fields.remove(field.as_slice());
                            fields.is_empty()
                        }
                        Some(_) => return Err(wrong_kind(key.as_slice())),
                    };
                    if remove_key {
                        guard.remove(key.as_slice());
                    }
                }
            }
        }
        Ok(())
    }
}
