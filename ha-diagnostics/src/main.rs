use anyhow::Result;
use ha_diagnostics::{Config, Diagnostics};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // A bad or missing options file is the only fatal error.
    let config = Config::load()?;
    Diagnostics::start(config).run().await;
    Ok(())
}
