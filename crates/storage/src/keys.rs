//! The reserved key schema. Every key lives under
//! `<chainName>:<networkName>:`; the explorer assumes exclusive
//! ownership of that prefix.

#[derive(Clone, Debug)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(chain_name: &str, network_name: &str) -> Self {
        Self {
            prefix: format!("{chain_name}:{network_name}:"),
        }
    }

    /// `state` — JSON `ExplorerState`.
    pub fn state(&self) -> String {
        format!("{}state", self.prefix)
    }

    /// `stats` — JSON `NetworkStats`.
    pub fn stats(&self) -> String {
        format!("{}stats", self.prefix)
    }

    /// `addresses` — set of all seen address hex; append-only.
    pub fn addresses(&self) -> String {
        format!("{}addresses", self.prefix)
    }

    /// `address:<addr>:balance` — JSON `Balance`.
    pub fn address_balance(&self, address_hex: &str) -> String {
        format!("{}address:{address_hex}:balance", self.prefix)
    }

    /// `address:<addr>:outputs.locked` — hash of output id hex to the
    /// JSON coin output.
    pub fn address_locked_outputs(&self, address_hex: &str) -> String {
        format!("{}address:{address_hex}:outputs.locked", self.prefix)
    }

    /// `address:<addr>:multisig.addresses` — set linking multisig
    /// wallets and their owners, both directions.
    pub fn address_multisig(&self, address_hex: &str) -> String {
        format!("{}address:{address_hex}:multisig.addresses", self.prefix)
    }

    /// `ucos` — hash of output id hex to the binary unspent-output
    /// record.
    pub fn unspent_outputs(&self) -> String {
        format!("{}ucos", self.prefix)
    }

    /// `lcos.height:<H>` — set of binary locked-output records maturing
    /// at height `H`.
    pub fn locked_at_height(&self, height: u64) -> String {
        format!("{}lcos.height:{height}", self.prefix)
    }

    /// `lcos.time:<B>` — set of binary locked-output records maturing
    /// in timestamp bucket `B`.
    pub fn locked_in_time_bucket(&self, bucket: u64) -> String {
        format!("{}lcos.time:{bucket}", self.prefix)
    }

    /// `undo:<blockId>` — binary per-block reversal record.
    pub fn block_undo(&self, block_id_hex: &str) -> String {
        format!("{}undo:{block_id_hex}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_chain_and_network_prefix() {
        let keys = KeySpace::new("quartz", "testnet");
        assert_eq!(keys.state(), "quartz:testnet:state");
        assert_eq!(keys.stats(), "quartz:testnet:stats");
        assert_eq!(keys.addresses(), "quartz:testnet:addresses");
        assert_eq!(
            keys.address_balance("ab01"),
            "quartz:testnet:address:ab01:balance"
        );
        assert_eq!(
            keys.address_locked_outputs("ab01"),
            "quartz:testnet:address:ab01:outputs.locked"
        );
        assert_eq!(
            keys.address_multisig("ab01"),
            "quartz:testnet:address:ab01:multisig.addresses"
        );
        assert_eq!(keys.unspent_outputs(), "quartz:testnet:ucos");
        assert_eq!(keys.locked_at_height(42), "quartz:testnet:lcos.height:42");
        assert_eq!(
            keys.locked_in_time_bucket(17_000),
            "quartz:testnet:lcos.time:17000"
        );
        assert_eq!(keys.block_undo("ff"), "quartz:testnet:undo:ff");
    }
}
