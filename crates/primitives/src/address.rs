//! Payable targets, identified by a fixed-width unlock hash.

use std::fmt;

use quartz_consensus::{hash256_from_hex, hash256_to_hex, Hash256, HexError};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};

/// An opaque unlock hash. The textual form is 64 lowercase hex digits;
/// the first six digits form the bucket prefix.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address(Hash256);

impl Address {
    pub fn new(hash: Hash256) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &Hash256 {
        &self.0
    }

    pub fn hex(&self) -> String {
        hash256_to_hex(&self.0)
    }

    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        hash256_from_hex(input).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl Visitor<'_> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 64-digit hex unlock hash")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Address, E> {
                Address::from_hex(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(AddressVisitor)
    }
}

impl Encodable for Address {
    fn binary_encode(&self, encoder: &mut Encoder) {
        encoder.write_hash(&self.0);
    }
}

impl Decodable for Address {
    fn binary_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self(decoder.read_hash()?))
    }
}
