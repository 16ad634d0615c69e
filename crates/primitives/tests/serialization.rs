use quartz_primitives::{
    Address, Block, CoinInput, CoinOutput, ConsensusChange, Currency, MinerPayout, Transaction,
    UnlockCondition,
};

fn addr(tag: u8) -> Address {
    Address::new([tag; 32])
}

#[test]
fn unlock_hash_condition_json() {
    let condition = UnlockCondition::UnlockHash(addr(0xab));
    let json = serde_json::to_value(&condition).expect("encode");
    assert_eq!(json["type"], 1);
    assert_eq!(json["data"]["unlockhash"], addr(0xab).hex());
    let back: UnlockCondition = serde_json::from_value(json).expect("decode");
    assert_eq!(back, condition);
}

#[test]
fn time_locked_multisig_json() {
    let condition = UnlockCondition::TimeLock {
        lock_time: 600_000_000,
        condition: Box::new(UnlockCondition::MultiSignature {
            unlock_hashes: vec![addr(1), addr(2)],
            minimum_signatures: 2,
        }),
    };
    let json = serde_json::to_value(&condition).expect("encode");
    assert_eq!(json["type"], 3);
    assert_eq!(json["data"]["locktime"], 600_000_000u64);
    assert_eq!(json["data"]["condition"]["type"], 4);
    assert_eq!(
        json["data"]["condition"]["data"]["minimumsignaturecount"],
        2
    );
    let back: UnlockCondition = serde_json::from_value(json).expect("decode");
    assert_eq!(back, condition);
}

#[test]
fn condition_json_rejects_unknown_type() {
    let err = serde_json::from_str::<UnlockCondition>(r#"{"type": 9, "data": {}}"#);
    assert!(err.is_err());
}

#[test]
fn condition_json_rejects_nested_time_lock() {
    let raw = r#"{
        "type": 3,
        "data": {
            "locktime": 100,
            "condition": {
                "type": 3,
                "data": {
                    "locktime": 200,
                    "condition": {"type": 1, "data": {"unlockhash": "0101010101010101010101010101010101010101010101010101010101010101"}}
                }
            }
        }
    }"#;
    assert!(serde_json::from_str::<UnlockCondition>(raw).is_err());
}

#[test]
fn coin_output_json_uses_decimal_value() {
    let output = CoinOutput {
        value: Currency::from_dec_str("123456789012345678901234567890").expect("value"),
        condition: UnlockCondition::UnlockHash(addr(3)),
    };
    let json = serde_json::to_value(&output).expect("encode");
    assert_eq!(json["value"], "123456789012345678901234567890");
    let back: CoinOutput = serde_json::from_value(json).expect("decode");
    assert_eq!(back, output);
}

#[test]
fn transaction_json_defaults_missing_lists() {
    let tx: Transaction = serde_json::from_str("{}").expect("decode");
    assert!(tx.coin_inputs.is_empty());
    assert!(tx.coin_outputs.is_empty());
    assert!(tx.block_stake_outputs.is_empty());
    assert!(!tx.is_value_transaction());
}

#[test]
fn transaction_json_ignores_unknown_fields() {
    let raw = r#"{"coininputs": [], "arbitrarydata": "aGVsbG8=", "version": 1}"#;
    let tx: Transaction = serde_json::from_str(raw).expect("decode");
    assert!(tx.coin_inputs.is_empty());
}

#[test]
fn consensus_change_roundtrip() {
    let block = Block {
        parent_id: [7u8; 32],
        timestamp: 1_700_000_000,
        miner_payouts: vec![MinerPayout {
            value: Currency::from(10u64),
            unlock_hash: addr(9),
        }],
        transactions: vec![Transaction {
            coin_inputs: vec![CoinInput {
                parent_id: [4u8; 32],
            }],
            coin_outputs: vec![CoinOutput {
                value: Currency::from(10u64),
                condition: UnlockCondition::UnlockHash(addr(5)),
            }],
            block_stake_outputs: Vec::new(),
        }],
    };
    let change = ConsensusChange {
        id: quartz_primitives::ConsensusChangeId([0x11; 32]),
        reverted_blocks: Vec::new(),
        applied_blocks: vec![block],
    };
    let json = serde_json::to_string(&change).expect("encode");
    let back: ConsensusChange = serde_json::from_str(&json).expect("decode");
    assert_eq!(back, change);
}
