//! Serde bridge rendering `Hash256` identifiers as hex strings.

use std::fmt;

use quartz_consensus::{hash256_from_hex, hash256_to_hex, Hash256};
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

pub fn serialize<S: Serializer>(hash: &Hash256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hash256_to_hex(hash))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash256, D::Error> {
    struct HashVisitor;

    impl Visitor<'_> for HashVisitor {
        type Value = Hash256;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a 64-digit hex hash")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Hash256, E> {
            hash256_from_hex(value).map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_str(HashVisitor)
}
