//! Per-network chain parameters.

use crate::constants::MATURITY_DELAY;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Standard,
    Testnet,
}

impl Network {
    pub fn name(self) -> &'static str {
        match self {
            Network::Standard => "standard",
            Network::Testnet => "testnet",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Network::Standard),
            "testnet" => Some(Network::Testnet),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    /// Chain name; first component of every reserved datastore key.
    pub chain_name: &'static str,
    /// Number of blocks a miner payout stays locked.
    pub maturity_delay: u64,
}

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Standard => ChainParams {
            network,
            chain_name: "quartz",
            maturity_delay: MATURITY_DELAY,
        },
        Network::Testnet => ChainParams {
            network,
            chain_name: "quartz",
            maturity_delay: MATURITY_DELAY,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_network() {
        assert_eq!(Network::parse("standard"), Some(Network::Standard));
        assert_eq!(Network::parse("Testnet"), Some(Network::Testnet));
        assert_eq!(Network::parse("mainnet"), None);
    }
}
