//! Typed surface over the external key/value store.
//!
//! The store holds strings, sets, and hashes under reserved keys (see
//! [`KeySpace`]) and applies a [`WriteBatch`] as one atomic pipelined
//! round-trip.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::SmallVec;

pub mod keys;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use keys::KeySpace;

#[derive(Debug)]
pub enum StoreError {
    Backend(String),
    Codec(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(message) => write!(f, "{message}"),
            StoreError::Codec(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Clone, Debug)]
pub struct WriteKey(SmallVec<[u8; 80]>);

impl WriteKey {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsRef<[u8]> for WriteKey {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for WriteKey {
    fn from(value: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(value))
    }
}

impl From<&[u8]> for WriteKey {
    fn from(value: &[u8]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

impl From<String> for WriteKey {
    fn from(value: String) -> Self {
        Self(SmallVec::from_vec(value.into_bytes()))
    }
}

impl From<&str> for WriteKey {
    fn from(value: &str) -> Self {
        Self(SmallVec::from_slice(value.as_bytes()))
    }
}

#[derive(Clone, Debug)]
pub struct WriteValue(SmallVec<[u8; 64]>);

impl WriteValue {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsRef<[u8]> for WriteValue {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for WriteValue {
    fn from(value: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(value))
    }
}

impl From<&[u8]> for WriteValue {
    fn from(value: &[u8]) -> Self {
        Self(SmallVec::from_slice(value))
    }
}

impl From<String> for WriteValue {
    fn from(value: String) -> Self {
        Self(SmallVec::from_vec(value.into_bytes()))
    }
}

impl From<&str> for WriteValue {
    fn from(value: &str) -> Self {
        Self(SmallVec::from_slice(value.as_bytes()))
    }
}

#[derive(Clone, Debug)]
pub enum WriteOp {
    Put {
        key: WriteKey,
        value: WriteValue,
    },
    Delete {
        key: WriteKey,
    },
    SetAdd {
        key: WriteKey,
        member: WriteValue,
    },
    SetRemove {
        key: WriteKey,
        member: WriteValue,
    },
    HashPut {
        key: WriteKey,
        field: WriteValue,
        value: WriteValue,
    },
    HashDelete {
        key: WriteKey,
        field: WriteValue,
    },
}

#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<WriteKey>, value: impl Into<WriteValue>) {
        self.ops.push(WriteOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<WriteKey>) {
        self.ops.push(WriteOp::Delete { key: key.into() });
    }

    pub fn set_add(&mut self, key: impl Into<WriteKey>, member: impl Into<WriteValue>) {
        self.ops.push(WriteOp::SetAdd {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn set_remove(&mut self, key: impl Into<WriteKey>, member: impl Into<WriteValue>) {
        self.ops.push(WriteOp::SetRemove {
            key: key.into(),
            member: member.into(),
        });
    }

    pub fn hash_put(
        &mut self,
        key: impl Into<WriteKey>,
        field: impl Into<WriteValue>,
        value: impl Into<WriteValue>,
    ) {
        self.ops.push(WriteOp::HashPut {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
    }

    pub fn hash_delete(&mut self, key: impl Into<WriteKey>, field: impl Into<WriteValue>) {
        self.ops.push(WriteOp::HashDelete {
            key: key.into(),
            field: field.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

pub trait Datastore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn set_members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError>;
    fn hash_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn hash_entries(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Applies the whole batch atomically; either every op lands or
    /// none does.
    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(&batch)
    }

    fn set_add(&self, key: &[u8], member: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set_add(key, member);
        self.write_batch(&batch)
    }

    fn hash_put(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.hash_put(key, field, value);
        self.write_batch(&batch)
    }
}

impl<T: Datastore + ?Sized> Datastore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().get(key)
    }

    fn set_members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        self.as_ref().set_members(key)
    }

    fn hash_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().hash_get(key, field)
    }

    fn hash_entries(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.as_ref().hash_entries(key)
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.as_ref().write_batch(batch)
    }
}

/// Reads a JSON value; an absent key is the zero value of the type.
pub fn get_json<T: DeserializeOwned + Default>(
    store: &(impl Datastore + ?Sized),
    key: &[u8],
) -> Result<T, StoreError> {
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
            StoreError::Codec(format!(
                "invalid JSON under {}: {err}",
                String::from_utf8_lossy(key)
            ))
        }),
        None => Ok(T::default()),
    }
}

pub fn to_json_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|err| StoreError::Codec(err.to_string()))
}
