use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter directives, e.g. `LIFEPLAN_LOG=lifeplan=debug`.
pub const LOG_ENV: &str = "LIFEPLAN_LOG";
const DEFAULT_FILTER: &str = "lifeplan=info";

static INIT: Once = Once::new();

/// Installs the global subscriber once. Logs go to stderr; stdout carries only results.
pub fn init(json: bool) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init();
        }
    });
}
