use crate::config::AppConfig;
use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

const FALLBACK_DIRECTIVES: &str = "info,pulse_domain=debug,pulse_infra=debug";

/// Installs the global subscriber: JSON lines in production, compact
/// human-readable output everywhere else. A bad `log_level` falls back to
/// the crate defaults instead of failing startup.
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVES));
    let builder = fmt().with_env_filter(filter).with_target(false);

    if config.is_production() {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
