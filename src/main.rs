use anyhow::Result;
use tokio::runtime::Runtime;

use photo_report_mcp::{logging, mcp_handler};

fn main() -> Result<()> {
    logging::init()?;

    let rt = Runtime::new()?;
    rt.block_on(mcp_handler::start_server())?;

    Ok(())
}
