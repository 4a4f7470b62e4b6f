//! Print every workshop's status, seats and form-number prefix.

use workshop_ledger_cli::{Config, Status, execute, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    for line in execute(&config, Status).await? {
        println!("{line}");
    }
    Ok(())
}
