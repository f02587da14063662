//! Domain types and ports.
//!
//! Nothing here touches storage directly; collaborators are reached
//! through the traits in [`ports`].

pub mod address;
pub mod coin;
pub mod context;
pub mod hex_bytes;
pub mod msg;
pub mod paychan;
pub mod ports;
pub mod tx;
