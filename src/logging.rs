use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,gridiron_elo=info";

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; only the first call installs.
pub fn init() {
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // A subscriber may already be installed by a test harness.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
