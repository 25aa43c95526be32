//! Process-wide tracing setup

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the JSON tracing subscriber for this process.
///
/// [`TracingSink`](crate::logging::TracingSink) events end up here. Calling it a
/// second time is a no-op: the first installed subscriber stays in place.
pub fn init_tracing(config: &Config) {
    let log_level = config.service.log_level.clone();

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tracing initialized for service: {}", config.service.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = Config::default();
        init_tracing(&config);
        init_tracing(&config);
    }
}
