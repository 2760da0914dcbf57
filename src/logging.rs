use env_logger::Env;
use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Install the process logger once. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) {
    LOGGER_INIT.get_or_init(|| {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .try_init();
    });
}
