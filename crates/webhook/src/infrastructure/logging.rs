//! provides logging helpers

use std::env;

use utils::logging::LOG_PATH_ENV_VAR;

/// initiate the global tracing subscriber
pub fn init() {
    utils::logging::init(env::var(LOG_PATH_ENV_VAR).ok());
}

/// Log panics through tracing in addition to the default hook.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}
