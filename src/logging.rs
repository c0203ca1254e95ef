//! Logging configuration for the binding-expression engine
//!
//! The library only emits records through the `log` facade; binaries and
//! tests pick a backend here, built on `env_logger`.
//!
//! # Log Levels
//!
//! - `warn!` - tokenizer recovery in lenient mode
//! - `debug!` - parse-cache and evaluator-cache misses
//! - `trace!` - rewrite passes, overload decisions
//!
//! # Environment Variable
//!
//! ```bash
//! RUST_LOG=debug bindexpr eval "A + B" --input '{"A": 1, "B": 2}'
//! RUST_LOG=bindexpr::compiler=trace bindexpr eval "Math.Max(A, 2)"
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging at the default level (Warn).
///
/// Only the first call has an effect.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

/// Initialize logging with a specific level.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{:5}] {} - {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();
    });
}

/// Initialize logging from `RUST_LOG`, defaulting to Warn.
pub fn init_from_env() {
    INIT.call_once(|| {
        Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    });
}

/// Initialize logging for tests; safe to call from every test.
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test();
        init_test();
        log::debug!("logging ready");
    }
}
