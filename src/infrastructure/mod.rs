//! Adapters for the domain ports: durable state and cryptography.

pub mod crypto;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
