pub mod balance_writer;
pub mod genesis_reader;
