use crate::domain::address::Address;
use crate::domain::coin::Coin;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRecord<'a> {
    address: String,
    ticker: &'a str,
    amount: String,
}

/// Writes balances as CSV with the header `address,ticker,amount`.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, balances: &[(Address, Coin)]) -> Result<()> {
        for (address, coin) in balances {
            self.writer.serialize(BalanceRecord {
                address: address.to_hex(),
                ticker: &coin.ticker,
                amount: coin.amount.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
