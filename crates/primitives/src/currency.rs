//! Arbitrary-precision coin amounts in the smallest unit.

use std::fmt;
use std::iter::Sum;

use primitive_types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};

/// A non-negative coin amount. JSON form is a base-10 decimal string.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Currency(U256);

impl Currency {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn from_dec_str(raw: &str) -> Result<Self, CurrencyParseError> {
        U256::from_dec_str(raw.trim())
            .map(Self)
            .map_err(|_| CurrencyParseError)
    }
}

impl From<u64> for Currency {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |total, value| {
            Self(total.0.saturating_add(value.0))
        })
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.0)
    }
}

#[derive(Debug)]
pub struct CurrencyParseError;

impl fmt::Display for CurrencyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal currency string")
    }
}

impl std::error::Error for CurrencyParseError {}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CurrencyVisitor;

        impl Visitor<'_> for CurrencyVisitor {
            type Value = Currency;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal currency string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Currency, E> {
                Currency::from_dec_str(value).map_err(de::Error::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Currency, E> {
                Ok(Currency::from(value))
            }
        }

        deserializer.deserialize_any(CurrencyVisitor)
    }
}

impl Encodable for Currency {
    fn binary_encode(&self, encoder: &mut Encoder) {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        encoder.write_bytes(&bytes);
    }
}

impl Decodable for Currency {
    fn binary_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let bytes = decoder.read_fixed::<32>()?;
        Ok(Self(U256::from_big_endian(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_roundtrip() {
        let value = Currency::from_dec_str("340282366920938463463374607431768211456").expect("big");
        assert_eq!(
            value.to_string(),
            "340282366920938463463374607431768211456"
        );
        assert_eq!(Currency::from(0u64).to_string(), "0");
    }

    #[test]
    fn checked_arithmetic() {
        let ten = Currency::from(10u64);
        let three = Currency::from(3u64);
        assert_eq!(ten.checked_sub(three), Some(Currency::from(7u64)));
        assert_eq!(three.checked_sub(ten), None);
        assert_eq!(ten.checked_add(three), Some(Currency::from(13u64)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Currency::from_dec_str("").is_err());
        assert!(Currency::from_dec_str("12abc").is_err());
        assert!(Currency::from_dec_str("-4").is_err());
    }
}
