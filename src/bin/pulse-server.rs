//! pulse server entry point.

use pulse_lib::cli::{self, ServerCli};
use pulse_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse_args();
    cli::execute_server(cli).await
}
