use anyhow::{bail, Context, Result};
use log::info;

use vexor::clock::{ClockSource, SystemClock};
use vexor::config::{metrics_config_env, Config};
use vexor::poh::PohVerifier;
use vexor::tower::persistence::{self, TowerError};
use vexor::types::DEFAULT_TICKS_PER_SLOT;

fn main() -> Result<()> {
    env_logger::init();

    let clock = SystemClock;
    let config = Config::parse_args();
    if let Some(metrics) = metrics_config_env() {
        info!("SOLANA_METRICS_CONFIG present ({} bytes), passing through", metrics.len());
    }

    std::fs::create_dir_all(&config.ledger_path)
        .with_context(|| format!("creating ledger directory {}", config.ledger_path.display()))?;
    std::fs::create_dir_all(&config.snapshot_dir)
        .with_context(|| format!("creating snapshot directory {}", config.snapshot_dir.display()))?;

    // A missing tower is a legitimate first boot; any other failure means the
    // file on disk exists but is unreadable, which must abort startup rather
    // than silently proceed as if voting state had never existed.
    match persistence::load(&config.ledger_path) {
        Ok(saved) => info!("loaded tower, last voted slot {}", saved.last_voted_slot),
        Err(TowerError::NotFound(_)) => info!("no prior tower found, starting fresh"),
        Err(e) => bail!(
            "tower file in {} is corrupt or unreadable: {e}",
            config.ledger_path.display()
        ),
    }

    let _verifier = PohVerifier::new(DEFAULT_TICKS_PER_SLOT);
    info!(
        "vexor core initialized for ledger {} at unix time {}",
        config.ledger_path.display(),
        clock.now_unix_seconds()
    );

    Ok(())
}
