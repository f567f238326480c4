//! BardSync binary entry point.
//!
//! This file stays minimal: all command handling and application logic
//! lives in the library crate.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bardsync::cli::run().await
}
