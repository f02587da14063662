#![allow(dead_code)]

use chanledger::application::app::App;
use chanledger::config::AppConfig;
use chanledger::domain::address::Address;
use chanledger::domain::coin::Coin;
use chanledger::domain::msg::{Msg, SendMsg};
use chanledger::domain::paychan::{
    ClosePaymentChannelMsg, CreatePaymentChannelMsg, Payment, TransferPaymentChannelMsg,
};
use chanledger::domain::ports::StateBackendBox;
use chanledger::domain::tx::Transaction;
use chanledger::infrastructure::crypto::{KeyPair, Secp256k1Verifier};
use chanledger::infrastructure::in_memory::InMemoryStateBackend;
use chanledger::interfaces::json::tx_reader::BlockTx;
use rust_decimal::Decimal;
use std::io::{Error, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const CHAIN_ID: &str = "paychan-local";
pub const TICKER: &str = "IOV";

pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes(&[seed; 32]).unwrap()
}

pub fn iov(amount: Decimal) -> Coin {
    Coin::new(amount, TICKER)
}

/// An app with the default configuration over `backend`.
pub async fn open_app(backend: StateBackendBox) -> App {
    App::new(&AppConfig::default(), backend, Arc::new(Secp256k1Verifier))
        .await
        .unwrap()
}

/// An app on a fresh in-memory backend with the given genesis balances.
pub async fn app_with(balances: &[(Address, Coin)]) -> App {
    let app = open_app(Box::new(InMemoryStateBackend::new())).await;
    app.init_genesis(balances).await.unwrap();
    app.commit().await.unwrap();
    app
}

pub fn send(src: Address, dest: Address, amount: Coin) -> Msg {
    Msg::Send(SendMsg {
        src: Some(src),
        dest: Some(dest),
        amount: Some(amount),
        memo: String::new(),
        reference: String::new(),
    })
}

pub fn create_channel(sender: &KeyPair, recipient: Address, total: Coin, timeout: i64) -> Msg {
    Msg::CreatePaymentChannel(CreatePaymentChannelMsg {
        src: Some(sender.address()),
        sender_pubkey: Some(sender.pubkey()),
        recipient: Some(recipient),
        total: Some(total),
        timeout,
        memo: String::new(),
    })
}

/// A cumulative payment of `amount` on channel `id`, signed by `signer`.
pub fn transfer(signer: &KeyPair, id: &[u8], amount: Coin) -> Msg {
    let payment = Payment {
        chain_id: CHAIN_ID.to_string(),
        channel_id: id.to_vec(),
        amount,
        memo: String::new(),
    };
    let signature = signer.sign(&payment.sign_bytes().unwrap());
    Msg::TransferPaymentChannel(TransferPaymentChannelMsg {
        payment: Some(payment),
        signature,
    })
}

pub fn close(id: &[u8]) -> Msg {
    Msg::ClosePaymentChannel(ClosePaymentChannelMsg {
        channel_id: id.to_vec(),
        memo: String::new(),
    })
}

pub fn block_tx(height: i64, signers: Vec<Address>, msg: Msg) -> BlockTx {
    BlockTx {
        height,
        signers,
        tx: Transaction::new(msg),
    }
}

pub fn write_block_file(txs: &[BlockTx]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    for tx in txs {
        writeln!(file, "{}", serde_json::to_string(tx)?)?;
    }
    file.flush()?;
    Ok(file)
}

pub fn write_genesis_file(balances: &[(Address, Coin)]) -> Result<NamedTempFile, Error> {
    let file = NamedTempFile::new()?;
    let mut wtr = csv::Writer::from_path(file.path())?;
    wtr.write_record(["address", "ticker", "amount"])?;
    for (addr, coin) in balances {
        wtr.write_record([addr.to_hex(), coin.ticker.clone(), coin.amount.to_string()])?;
    }
    wtr.flush()?;
    Ok(file)
}

/// The CSV line the balance writer prints for `addr` holding `coin`.
pub fn balance_line(addr: &Address, coin: &Coin) -> String {
    format!("{},{},{}", addr.to_hex(), coin.ticker, coin.amount)
}
