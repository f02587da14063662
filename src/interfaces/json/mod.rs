pub mod tx_reader;
