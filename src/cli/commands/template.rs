//! Default configuration template command.

use anyhow::Result;
use trading_config::default_template;

pub async fn run() -> Result<()> {
    print!("{}", default_template()?);
    Ok(())
}
