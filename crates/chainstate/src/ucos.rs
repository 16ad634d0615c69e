//! The unspent-coin-output index: the minimal per-output record needed
//! to reverse a balance mutation given only the output id.

use quartz_primitives::condition::LockKind;
use quartz_primitives::currency::Currency;
use quartz_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use quartz_primitives::Address;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutputLock {
    pub kind: LockKind,
    pub unlock_point: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnspentOutputRecord {
    pub address: Address,
    pub value: Currency,
    /// Present while the output still sits in the lock index.
    pub lock: Option<OutputLock>,
}

impl UnspentOutputRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        self.address.binary_encode(&mut encoder);
        self.value.binary_encode(&mut encoder);
        match &self.lock {
            None => encoder.write_u8(0),
            Some(lock) => {
                encoder.write_u8(1);
                encoder.write_u8(lock.kind.as_u8());
                encoder.write_u64_le(lock.unlock_point);
            }
        }
        encoder.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let address = Address::binary_decode(&mut decoder)?;
        let value = Currency::binary_decode(&mut decoder)?;
        let lock = match decoder.read_u8()? {
            0 => None,
            1 => {
                let kind = LockKind::from_u8(decoder.read_u8()?)
                    .ok_or(DecodeError::InvalidData("invalid lock kind"))?;
                let unlock_point = decoder.read_u64_le()?;
                Some(OutputLock { kind, unlock_point })
            }
            _ => return Err(DecodeError::InvalidData("invalid lock flag")),
        };
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            address,
            value,
            lock,
        })
    }
}
