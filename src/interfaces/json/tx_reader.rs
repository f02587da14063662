use crate::domain::address::Address;
use crate::domain::tx::Transaction;
use crate::error::{Result, wrap};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};

/// One line of a block file: a transaction with the block height it is
/// included at and the addresses that signed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTx {
    pub height: i64,
    #[serde(default)]
    pub signers: Vec<Address>,
    pub tx: Transaction,
}

/// Reads [`BlockTx`]s from a JSON-lines source. Blank lines are skipped.
pub struct TxReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> TxReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Lazily parses one transaction per line, tagging failures with their
    /// line number.
    pub fn transactions(self) -> impl Iterator<Item = Result<BlockTx>> {
        self.reader
            .lines()
            .enumerate()
            .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .map(|(i, line)| -> Result<BlockTx> {
                let line = line?;
                serde_json::from_str(&line).map_err(|e| wrap(e, format!("line {}", i + 1)))
            })
    }
}
