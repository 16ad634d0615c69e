//! Redis-backed datastore. Batches become atomic `MULTI`/`EXEC`
//! pipelines, one round-trip per consensus change.

use std::collections::HashMap;
use std::sync::Mutex;

use redis::Connection;

use crate::{Datastore, StoreError, WriteBatch, WriteOp};

pub struct RedisStore {
    connection: Mutex<Connection>,
}

impl RedisStore {
    pub fn open(addr: &str, db: i64) -> Result<Self, StoreError> {
        let url = format!("redis://{addr}/{db}");
        let client = redis::Client::open(url.as_str()).map_err(backend)?;
        let connection = client.get_connection().map_err(backend)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Backend("redis connection lock poisoned".to_string()))
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl Datastore for RedisStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.lock()?;
        redis::cmd("GET")
            .arg(key)
            .query::<Option<Vec<u8>>>(&mut *conn)
            .map_err(backend)
    }

    fn set_members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.lock()?;
        redis::cmd("SMEMBERS")
            .arg(key)
            .query::<Vec<Vec<u8>>>(&mut *conn)
            .map_err(backend)
    }

    fn hash_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.lock()?;
        redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query::<Option<Vec<u8>>>(&mut *conn)
            .map_err(backend)
    }

    fn hash_entries(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut conn = self.lock()?;
        let entries = redis::cmd("HGETALL")
            .arg(key)
            .query::<HashMap<Vec<u8>, Vec<u8>>>(&mut *conn)
            .map_err(backend)?;
        Ok(entries.into_iter().collect())
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.iter() {
            match op {
                WriteOp::Put { key, value } => {
                    pipe.cmd("SET").arg(key.as_slice()).arg(value.as_slice()).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.cmd("DEL").arg(key.as_slice()).ignore();
                }
                WriteOp::SetAdd { key, member } => {
                    pipe.cmd("SADD").arg(key.as_slice()).arg(member.as_slice()).ignore();
                }
                WriteOp::SetRemove { key, member } => {
                    pipe.cmd("SREM").arg(key.as_slice()).arg(member.as_slice()).ignore();
                }
                WriteOp::HashPut { key, field, value } => {
                    pipe.cmd("HSET")
                        .arg(key.as_slice())
                        .arg(field.as_slice())
                        .arg(value.as_slice())
                        .ignore();
                }
                WriteOp::HashDelete { key, field } => {
                    pipe.cmd("HDEL").arg(key.as_slice()).arg(field.as_slice()).ignore();
                }
            }
        }
        let mut conn = self.lock()?;
        pipe.query::<()>(&mut *conn).map_err(backend)
    }
}
