//! Development helper: initialize tracing when `RUST_LOG` is set.
//!
//! Tests call [`init_tracing`] to enable structured logging for debugging.
//! No-op when `RUST_LOG` is unset or a global subscriber is already
//! installed.
pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
