//! Transaction processing.
//!
//! Handlers hold the business logic of one message type. Decorators wrap
//! them with cross-cutting steps such as fee collection and batch fan-out.
//! [`app::App`] ties the stack to the state and drives the
//! Check/Deliver/Commit lifecycle. The working state lives in [`kv`], with
//! typed [`orm`] buckets and [`query`] routes layered over the `KvStore` port.

pub mod app;
pub mod batch;
pub mod fees;
pub mod kv;
pub mod ledger;
pub mod orm;
pub mod paychan;
pub mod pipeline;
pub mod query;
pub mod router;
pub mod send;
