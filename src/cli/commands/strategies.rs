//! List strategies command.

use anyhow::Result;
use trading_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ({})", info.name, info.key);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  Defaults: {}", info.default_config);
        println!();
    }

    println!("Select one with [strategy] name = \"<key>\" or run --strategy <key>.");

    Ok(())
}
