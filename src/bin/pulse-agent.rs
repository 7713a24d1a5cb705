//! pulse agent entry point.

use pulse_lib::agent::CountingAllocator;
use pulse_lib::cli::{self, AgentCli};
use pulse_lib::core::Result;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AgentCli::parse_args();
    cli::execute_agent(cli).await
}
