use std::collections::BTreeMap;
use std::sync::Arc;

use quartz_chainstate::Explorer;
use quartz_consensus::{ChainParams, Network};
use quartz_primitives::{
    Address, Block, CoinInput, CoinOutput, ConsensusChange, ConsensusChangeId, Currency,
    MinerPayout, Transaction, UnlockCondition,
};
use quartz_storage::memory::{MemoryStore, StoredValue};
use quartz_storage::KeySpace;

fn params() -> ChainParams {
    ChainParams {
        network: Network::Standard,
        chain_name: "quartz",
        maturity_delay: 2,
    }
}

fn keys() -> KeySpace {
    KeySpace::new("quartz", "standard")
}

fn addr(tag: u8) -> Address {
    Address::new([tag; 32])
}

fn pay(address: Address, value: u64) -> CoinOutput {
    CoinOutput {
        value: Currency::from(value),
        condition: UnlockCondition::UnlockHash(address),
    }
}

fn change(id_tag: u8, reverted: Vec<Block>, applied: Vec<Block>) -> ConsensusChange {
    ConsensusChange {
        id: ConsensusChangeId([id_tag; 32]),
        reverted_blocks: reverted,
        applied_blocks: applied,
    }
}

/// Everything except the append-only address set, the multisig links,
/// and the change-id record.
fn filtered_snapshot(store: &MemoryStore) -> BTreeMap<Vec<u8>, StoredValue> {
    let state_key = keys().state().into_bytes();
    let addresses_key = keys().addresses().into_bytes();
    store
        .snapshot()
        .into_iter()
        .filter(|(key, _)| {
            key != &state_key
                && key != &addresses_key
                && !String::from_utf8_lossy(key).contains(":multisig.addresses")
        })
        .collect()
}

#[test]
fn reverting_a_block_with_intra_block_spends_is_exact() {
    let store = Arc::new(MemoryStore::new());
    let mut explorer = Explorer::open(Arc::clone(&store), params()).expect("open");

    let genesis_tx = Transaction {
        coin_inputs: Vec::new(),
        coin_outputs: vec![pay(addr(0xa), 100)],
        block_stake_outputs: Vec::new(),
    };
    let genesis_output = genesis_tx.coin_output_id(0);
    let genesis = Block {
        parent_id: [0u8; 32],
        timestamp: 1_600_000_000,
        miner_payouts: Vec::new(),
        transactions: vec![genesis_tx],
    };
    explorer
        .process_consensus_change(&change(1, Vec::new(), vec![genesis.clone()]))
        .expect("apply genesis");

    let before = filtered_snapshot(&store);

    // tx1 pays B, tx2 immediately spends B's fresh output within the
    // same block.
    let tx1 = Transaction {
        coin_inputs: vec![CoinInput {
            parent_id: genesis_output,
        }],
        coin_outputs: vec![pay(addr(0xb), 100)],
        block_stake_outputs: Vec::new(),
    };
    let tx2 = Transaction {
        coin_inputs: vec![CoinInput {
            parent_id: tx1.coin_output_id(0),
        }],
        coin_outputs: vec![pay(addr(0xc), 30), pay(addr(0xd), 70)],
        block_stake_outputs: Vec::new(),
    };
    let block1 = Block {
        parent_id: genesis.id(),
        timestamp: 1_600_000_600,
        miner_payouts: Vec::new(),
        transactions: vec![tx1, tx2],
    };
    explorer
        .process_consensus_change(&change(2, Vec::new(), vec![block1.clone()]))
        .expect("apply block 1");

    explorer
        .process_consensus_change(&change(3, vec![block1], Vec::new()))
        .expect("revert block 1");

    assert_eq!(filtered_snapshot(&store), before);
}

#[test]
fn reverting_a_promoting_block_relocks_outputs() {
    let store = Arc::new(MemoryStore::new());
    let mut explorer = Explorer::open(Arc::clone(&store), params()).expect("open");

    let miner = addr(0x1);
    let genesis = Block {
        parent_id: [0u8; 32],
        timestamp: 1_600_000_000,
        miner_payouts: Vec::new(),
        transactions: vec![Transaction {
            coin_inputs: Vec::new(),
            coin_outputs: vec![pay(addr(0xa), 50)],
            block_stake_outputs: Vec::new(),
        }],
    };
    explorer
        .process_consensus_change(&change(1, Vec::new(), vec![genesis.clone()]))
        .expect("apply genesis");

    // Payout at height 1, delay 2: matures when height 3 is applied.
    let block1 = Block {
        parent_id: genesis.id(),
        timestamp: 1_600_000_600,
        miner_payouts: vec![MinerPayout {
            value: Currency::from(10u64),
            unlock_hash: miner,
        }],
        transactions: Vec::new(),
    };
    let block2 = Block {
        parent_id: block1.id(),
        timestamp: 1_600_001_200,
        miner_payouts: Vec::new(),
        transactions: Vec::new(),
    };
    explorer
        .process_consensus_change(&change(2, Vec::new(), vec![block1.clone(), block2.clone()]))
        .expect("apply blocks 1 and 2");

    let locked_state = filtered_snapshot(&store);

    let block3 = Block {
        parent_id: block2.id(),
        timestamp: 1_600_001_800,
        miner_payouts: Vec::new(),
        transactions: Vec::new(),
    };
    explorer
        .process_consensus_change(&change(3, Vec::new(), vec![block3.clone()]))
        .expect("apply block 3");

    let matured: quartz_chainstate::Balance = quartz_storage::get_json(
        store.as_ref(),
        keys().address_balance(&miner.hex()).as_bytes(),
    )
    .expect("balance");
    assert_eq!(matured.unlocked, Currency::from(10u64));
    assert!(matured.locked.is_zero());

    // A reorg rolls block 3 back; the payout must be locked again.
    explorer
        .process_consensus_change(&change(4, vec![block3], Vec::new()))
        .expect("revert block 3");

    assert_eq!(filtered_snapshot(&store), locked_state);

    let relocked: quartz_chainstate::Balance = quartz_storage::get_json(
        store.as_ref(),
        keys().address_balance(&miner.hex()).as_bytes(),
    )
    .expect("balance");
    assert_eq!(relocked.locked, Currency::from(10u64));
    assert!(relocked.unlocked.is_zero());
}

#[test]
fn replacing_a_fork_applies_the_new_chain() {
    let store = Arc::new(MemoryStore::new());
    let mut explorer = Explorer::open(Arc::clone(&store), params()).expect("open");

    let genesis_tx = Transaction {
        coin_inputs: Vec::new(),
        coin_outputs: vec![pay(addr(0xa), 100)],
        block_stake_outputs: Vec::new(),
    };
    let genesis_output = genesis_tx.coin_output_id(0);
    let genesis = Block {
        parent_id: [0u8; 32],
        timestamp: 1_600_000_000,
        miner_payouts: Vec::new(),
        transactions: vec![genesis_tx],
    };
    explorer
        .process_consensus_change(&change(1, Vec::new(), vec![genesis.clone()]))
        .expect("apply genesis");

    let spend_to = |target: Address, ts: u64| Block {
        parent_id: genesis.id(),
        timestamp: ts,
        miner_payouts: Vec::new(),
        transactions: vec![Transaction {
            coin_inputs: vec![CoinInput {
                parent_id: genesis_output,
            }],
            coin_outputs: vec![pay(target, 100)],
            block_stake_outputs: Vec::new(),
        }],
    };

    let fork_a = spend_to(addr(0xb), 1_600_000_600);
    explorer
        .process_consensus_change(&change(2, Vec::new(), vec![fork_a.clone()]))
        .expect("apply fork a");

    // The same output is spent again on the replacing fork.
    let fork_b = spend_to(addr(0xc), 1_600_000_601);
    explorer
        .process_consensus_change(&change(3, vec![fork_a], vec![fork_b]))
        .expect("reorg to fork b");

    let balance_b: quartz_chainstate::Balance = quartz_storage::get_json(
        store.as_ref(),
        keys().address_balance(&addr(0xb).hex()).as_bytes(),
    )
    .expect("balance");
    assert!(balance_b.is_zero());
    let balance_c: quartz_chainstate::Balance = quartz_storage::get_json(
        store.as_ref(),
        keys().address_balance(&addr(0xc).hex()).as_bytes(),
    )
    .expect("balance");
    assert_eq!(balance_c.unlocked, Currency::from(100u64));
    assert_eq!(explorer.stats().block_height, 1);
    assert_eq!(explorer.stats().coin_input_count, 1);
}
