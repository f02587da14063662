use crate::domain::address::Address;
use crate::domain::coin::Coin;
use crate::error::{INVALID_VALUE, Result, wrap};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct GenesisRecord {
    address: Address,
    ticker: String,
    amount: String,
}

/// Reads initial balances from a CSV source with the header
/// `address, ticker, amount`.
pub struct GenesisReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> GenesisReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one validated balance per row.
    pub fn balances(self) -> impl Iterator<Item = Result<(Address, Coin)>> {
        self.reader
            .into_deserialize::<GenesisRecord>()
            .map(|record| -> Result<(Address, Coin)> {
                let record = record?;
                let amount: Decimal = record.amount.parse().map_err(|e| {
                    INVALID_VALUE.new_error(format!("amount {:?}: {e}", record.amount))
                })?;
                let coin = Coin::new(amount, record.ticker);
                coin.validate()
                    .map_err(|e| wrap(e, format!("genesis balance of {}", record.address)))?;
                Ok((record.address, coin))
            })
    }
}
