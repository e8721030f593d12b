//! # GoMarket Cart CLI Entry Point
//!
//! All logic lives in `lib.rs` so it can be tested.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    gomarket_cli::run().await
}
