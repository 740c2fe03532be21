use wallet_ledger::{Amount, SpentOutput, TransactionRecord, Utxo};

const FOREIGN_ADDRESS: &str = "bcrt1qforeign";

fn output(txid: &str, index: usize, address: &str, value: i64, height: u32) -> Utxo {
    Utxo {
        txid: txid.to_string(),
        index: index as u32,
        address: address.to_string(),
        value: Amount::from_sat(value),
        witness_script: format!("0014{}", hex::encode(address)),
        address_public_key: None,
        address_path: None,
        height,
    }
}

/// A transaction paying `outputs` from an address outside the wallet.
pub fn funding_tx(txid: &str, height: u32, outputs: &[(&str, i64)]) -> TransactionRecord {
    let total: i64 = outputs.iter().map(|(_, value)| value).sum();
    TransactionRecord {
        txid: txid.to_string(),
        height,
        fee: Amount::from_sat(200),
        inputs: vec![SpentOutput {
            prev_txid: format!("{}-parent", txid),
            prev_index: 0,
            txid: txid.to_string(),
            address: FOREIGN_ADDRESS.to_string(),
            value: Amount::from_sat(total + 200),
        }],
        outputs: outputs
            .iter()
            .enumerate()
            .map(|(i, (address, value))| output(txid, i, address, *value, height))
            .collect(),
        mempool_ts: None,
    }
}

/// A transaction spending `spent` to `outputs`, with the remainder as fee.
pub fn spending_tx(txid: &str, height: u32, spent: &[Utxo], outputs: &[(&str, i64)]) -> TransactionRecord {
    let total_in: i64 = spent.iter().map(|u| u.value.to_sat()).sum();
    let total_out: i64 = outputs.iter().map(|(_, value)| value).sum();
    TransactionRecord {
        txid: txid.to_string(),
        height,
        fee: Amount::from_sat(total_in - total_out),
        inputs: spent
            .iter()
            .map(|u| SpentOutput {
                prev_txid: u.txid.clone(),
                prev_index: u.index,
                txid: txid.to_string(),
                address: u.address.clone(),
                value: u.value,
            })
            .collect(),
        outputs: outputs
            .iter()
            .enumerate()
            .map(|(i, (address, value))| output(txid, i, address, *value, height))
            .collect(),
        mempool_ts: None,
    }
}
