//! Per-address balance, split into locked and unlocked coins.

use quartz_primitives::Currency;
use serde::{Deserialize, Serialize};

/// Stored under `address:<addr>:balance`. An absent record is the zero
/// balance; a balance that returns to zero is deleted again.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub locked: Currency,
    #[serde(default)]
    pub unlocked: Currency,
}

impl Balance {
    pub fn is_zero(&self) -> bool {
        self.locked.is_zero() && self.unlocked.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_record_is_zero() {
        let balance: Balance = serde_json::from_str("{}").expect("decode");
        assert!(balance.is_zero());
    }

    #[test]
    fn decimal_string_fields() {
        let balance = Balance {
            locked: Currency::from(7u64),
            unlocked: Currency::from(0u64),
        };
        let json = serde_json::to_string(&balance).expect("encode");
        assert_eq!(json, r#"{"locked":"7","unlocked":"0"}"#);
    }
}
