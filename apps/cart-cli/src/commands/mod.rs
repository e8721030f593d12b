//! # Commands
//!
//! ```text
//! commands/
//! └── cart.rs   add, increment, decrement, list, totals
//! ```
//!
//! Every command takes a `CartHandle`; opening and closing the store is the
//! caller's job.

pub mod cart;
